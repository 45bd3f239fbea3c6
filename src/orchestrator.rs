//! Regression planning and execution.
//!
//! A regression plan accumulates one `ExecutionPlan` per selected testbench,
//! possibly across several runbooks. The plan is then either previewed or
//! executed once.
use crate::backend::{BackendFactory, BuildRequest, SimBackend, TestRequest, TestResult};
use crate::env::TestEnv;
use crate::error::RegmanError;
use crate::filter::{FilterAttr, Filtering};
use crate::runbook::{merge_args, Runbook, RESULTS_XML_ARG};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Testbench ready to run with its selected tests.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub runbook: Arc<Runbook>,
    pub tb_name: String,
    /// Selected tests in discovery order. May be empty.
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub tb_name: String,
    pub tests: Vec<String>,
}

/// Outcome of one plan entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestbenchRun {
    pub runbook: PathBuf,
    pub tb_name: String,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_xml: Option<PathBuf>,
    pub results: Vec<TestResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub testbenches: Vec<TestbenchRun>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.results().filter(|result| result.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.results().filter(|result| !result.passed).count()
    }

    fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.testbenches.iter().flat_map(|run| run.results.iter())
    }
}

/// Repeat each test `ntimes` in place: `[a, b]` x3 is `[a, a, a, b, b, b]`.
pub fn expand_repetitions(tests: &[String], ntimes: usize) -> Vec<String> {
    tests
        .iter()
        .flat_map(|test| std::iter::repeat_n(test.clone(), ntimes))
        .collect()
}

#[derive(Debug, Default)]
pub struct Orchestrator {
    regression_plan: Vec<ExecutionPlan>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self) -> &[ExecutionPlan] {
        &self.regression_plan
    }

    /// Append plans for every testbench of `runbook` that `filtering` selects.
    ///
    /// Returns how many entries were added.
    pub fn build_plan(
        &mut self,
        env: &mut TestEnv,
        runbook: &Arc<Runbook>,
        filtering: &Filtering,
    ) -> Result<usize> {
        let candidates = candidate_names(runbook, &filtering.tb_names)?;
        env.load_includes(runbook);

        let mut added = 0;
        for name in candidates {
            let Some(tb) = runbook.testbench(&name) else {
                continue;
            };
            if !filtering.accepts_tags(&tb.tags) {
                tracing::debug!(testbench = %name, tags = ?tb.tags, "testbench filtered out by tags");
                continue;
            }
            let suite = env.discover(tb)?;
            let tests = filtering.select(FilterAttr::Tests, &suite.names());
            tracing::info!(
                testbench = %name,
                discovered = suite.cases.len(),
                selected = tests.len(),
                "testbench planned"
            );
            self.regression_plan.push(ExecutionPlan {
                runbook: Arc::clone(runbook),
                tb_name: name,
                tests,
            });
            added += 1;
        }
        Ok(added)
    }

    /// Expanded test lists per entry. Never touches a backend.
    pub fn preview(&self, ntimes: usize) -> Vec<PreviewEntry> {
        self.regression_plan
            .iter()
            .map(|entry| PreviewEntry {
                tb_name: entry.tb_name.clone(),
                tests: expand_repetitions(&entry.tests, ntimes),
            })
            .collect()
    }

    /// Build and test every entry, grouped by originating runbook.
    ///
    /// One backend handle is acquired per runbook. The first build or test
    /// failure stops the run.
    pub fn run(
        self,
        env: &mut TestEnv,
        factory: &dyn BackendFactory,
        ntimes: usize,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for (runbook, entries) in group_by_runbook(&self.regression_plan) {
            let mut backend = factory
                .acquire(runbook.sim)
                .with_context(|| format!("acquire {} backend", runbook.sim))?;
            env.load_includes(&runbook);
            for entry in entries {
                let run = run_entry(env, backend.as_mut(), &runbook, entry, ntimes)?;
                summary.testbenches.push(run);
            }
        }
        tracing::info!(
            testbenches = summary.testbenches.len(),
            passed = summary.passed(),
            failed = summary.failed(),
            "regression finished"
        );
        Ok(summary)
    }
}

/// Explicit names in request order without duplicates, or every testbench.
fn candidate_names(runbook: &Runbook, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(runbook.tbs.keys().cloned().collect());
    }
    let unknown: Vec<&str> = requested
        .iter()
        .filter(|name| !runbook.contains(name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(RegmanError::unknown_testbenches(&unknown, &runbook.testbench_names()).into());
    }
    let mut names: Vec<String> = Vec::new();
    for name in requested {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

/// Group entries by runbook identity in first-appearance order.
fn group_by_runbook(plan: &[ExecutionPlan]) -> Vec<(Arc<Runbook>, Vec<&ExecutionPlan>)> {
    let mut groups: Vec<(Arc<Runbook>, Vec<&ExecutionPlan>)> = Vec::new();
    for entry in plan {
        match groups
            .iter_mut()
            .find(|(runbook, _)| Arc::ptr_eq(runbook, &entry.runbook))
        {
            Some((_, entries)) => entries.push(entry),
            None => groups.push((Arc::clone(&entry.runbook), vec![entry])),
        }
    }
    groups
}

fn run_entry(
    env: &TestEnv,
    backend: &mut dyn SimBackend,
    runbook: &Runbook,
    entry: &ExecutionPlan,
    ntimes: usize,
) -> Result<TestbenchRun> {
    let name = &entry.tb_name;
    let tb = runbook
        .testbench(name)
        .ok_or_else(|| anyhow!("testbench '{name}' is not part of {}", runbook.origin.display()))?;
    let mut run = TestbenchRun {
        runbook: runbook.origin.clone(),
        tb_name: name.clone(),
        skipped: true,
        build_dir: None,
        results_xml: None,
        results: Vec::new(),
    };

    let testcase = expand_repetitions(&entry.tests, ntimes);
    if testcase.is_empty() {
        tracing::info!(testbench = %name, "no tests selected; skipping");
        return Ok(run);
    }

    let build = BuildRequest {
        sources: runbook.sources_for(tb),
        hdl_toplevel: tb.rtl_top.clone(),
        always: true,
        args: merge_args(&runbook.build_args, &tb.build_args),
    };
    tracing::info!(testbench = %name, sources = build.sources.len(), "building");
    let build_dir = backend
        .build(&build)
        .with_context(|| format!("build testbench '{name}'"))?;

    let mut test_args = merge_args(&runbook.test_args, &tb.test_args);
    let results_xml = match test_args.remove(RESULTS_XML_ARG) {
        Some(value) => value
            .as_str()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("{RESULTS_XML_ARG} for testbench '{name}' must be a path"))?,
        None => build_dir.join(format!("{name}_results.xml")),
    };

    let test = TestRequest {
        hdl_toplevel: tb.rtl_top.clone(),
        hdl_toplevel_lang: tb.hdl,
        test_module: tb.tb_top.clone(),
        testcase,
        results_xml: results_xml.clone(),
        search_path: env.search_path(tb),
        args: test_args,
    };
    tracing::info!(
        testbench = %name,
        tests = test.testcase.len(),
        results_xml = %results_xml.display(),
        "testing"
    );
    let outcome = backend
        .test(&test)
        .with_context(|| format!("test testbench '{name}'"))?;

    run.skipped = false;
    run.build_dir = Some(build_dir);
    run.results_xml = Some(results_xml);
    run.results = if outcome.results.is_empty() {
        tracing::warn!(
            testbench = %name,
            tests = test.testcase.len(),
            "backend reported no results; counting requested tests as failed"
        );
        test.testcase
            .into_iter()
            .map(|name| TestResult {
                name,
                passed: false,
            })
            .collect()
    } else {
        outcome.results
    };
    Ok(run)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
