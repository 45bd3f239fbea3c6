//! Simulation backend seam.
//!
//! A backend compiles a testbench's sources and runs its test cases for one
//! simulator product. Calls block until the simulator finishes.
use crate::runbook::{Hdl, Simulator, StageArgs};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRequest {
    pub sources: Vec<PathBuf>,
    pub hdl_toplevel: Option<String>,
    /// Force a rebuild even when outputs look current.
    pub always: bool,
    pub args: StageArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRequest {
    pub hdl_toplevel: Option<String>,
    pub hdl_toplevel_lang: Hdl,
    pub test_module: String,
    /// Test cases in execution order, repetitions included.
    pub testcase: Vec<String>,
    pub results_xml: PathBuf,
    pub search_path: Vec<PathBuf>,
    pub args: StageArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(default)]
    pub results: Vec<TestResult>,
}

/// Handle bound to a single simulator.
pub trait SimBackend {
    /// Compile sources; returns the build output directory.
    fn build(&mut self, request: &BuildRequest) -> Result<PathBuf>;
    fn test(&mut self, request: &TestRequest) -> Result<TestOutcome>;
}

pub trait BackendFactory {
    fn acquire(&self, sim: Simulator) -> Result<Box<dyn SimBackend>>;
}
