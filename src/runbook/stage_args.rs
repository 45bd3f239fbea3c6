//! Legal keys for user-supplied build/test arguments.
//!
//! The allow-lists mirror the keyword parameters of the simulation runner's
//! `build` and `test` operations, minus the ones the orchestrator supplies
//! itself. Bump `STAGE_ARGS_REVISION` whenever a list changes.
use super::types::StageArgs;
use crate::error::{RegmanError, ValidationStage};
use std::fmt;

pub const STAGE_ARGS_REVISION: u32 = 1;

/// Keys the orchestrator owns; users may never set them.
pub const RESERVED_ARGS: &[&str] = &[
    "verilog_sources",
    "vhdl_sources",
    "sources",
    "hdl_toplevel",
    "hdl_toplevel_lang",
    "test_module",
    "testcase",
    "always",
    "timescale",
];

const BUILD_ARGS: &[&str] = &[
    "hdl_library",
    "includes",
    "defines",
    "parameters",
    "build_args",
    "build_dir",
    "cwd",
    "clean",
    "verbose",
    "waves",
    "log_file",
];

const TEST_ARGS: &[&str] = &[
    "hdl_toplevel_library",
    "gpi_interfaces",
    "seed",
    "elab_args",
    "test_args",
    "plusargs",
    "extra_env",
    "waves",
    "gui",
    "parameters",
    "build_dir",
    "test_dir",
    "results_xml",
    "pre_cmd",
    "verbose",
    "log_file",
    "test_filter",
];

/// Test argument that overrides the default result-file location.
pub const RESULTS_XML_ARG: &str = "results_xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Test,
}

impl Stage {
    pub fn allowed(self) -> &'static [&'static str] {
        match self {
            Stage::Build => BUILD_ARGS,
            Stage::Test => TEST_ARGS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Test => "test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys of `args` that `stage` does not accept, in key order.
fn invalid_keys(args: &StageArgs, stage: Stage) -> impl Iterator<Item = String> + '_ {
    let allowed = stage.allowed();
    args.keys()
        .filter(move |key| !allowed.contains(&key.as_str()))
        .map(|key| {
            if RESERVED_ARGS.contains(&key.as_str()) {
                format!("{key} (managed by regman)")
            } else {
                key.clone()
            }
        })
}

/// Reject every illegal key across all argument maps of a runbook.
///
/// Each map comes with its scope (`global` or a testbench) and stage. All
/// offenders are reported in one error, prefixed by the map they came from.
pub fn validate_stage_args<'a, S>(
    maps: impl IntoIterator<Item = (S, Stage, &'a StageArgs)>,
) -> Result<(), RegmanError>
where
    S: fmt::Display,
{
    let mut items = Vec::new();
    for (scope, stage, args) in maps {
        items.extend(
            invalid_keys(args, stage).map(|key| format!("{scope} {stage}_args: {key}")),
        );
    }
    if items.is_empty() {
        return Ok(());
    }
    Err(RegmanError::validation(
        ValidationStage::StageArgs,
        format!(
            "invalid stage argument keys (allowed build_args: {}; allowed test_args: {})",
            Stage::Build.allowed().join(", "),
            Stage::Test.allowed().join(", ")
        ),
        items,
    ))
}
