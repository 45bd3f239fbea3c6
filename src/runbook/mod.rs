//! Runbook model and its validation pipeline.
//!
//! A runbook declares the simulator, an indexed source table, include
//! directories, global build/test arguments and the named testbenches.
mod load;
mod paths;
mod schema;
mod stage_args;
mod types;

pub use load::{load_runbook, locate_runbook, parse_runbook, DEFAULT_RUNBOOK_NAME};
pub use stage_args::{RESULTS_XML_ARG, STAGE_ARGS_REVISION};
pub use types::*;
