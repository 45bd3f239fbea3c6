//! Test environment: include-directory registry and test discovery.
//!
//! The registry is process-scoped state owned by `TestEnv`. Directories are
//! appended idempotently and never removed; discovery receives the current
//! entries explicitly as its search path.
use crate::error::RegmanError;
use crate::runbook::{Runbook, Testbench};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location of a testbench's test module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestModule {
    pub dir: PathBuf,
    pub name: String,
}

impl TestModule {
    pub fn for_testbench(tb: &Testbench) -> Self {
        TestModule {
            dir: tb.path.clone(),
            name: tb.tb_top.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Test cases a module defines, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "tests", default)]
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn names(&self) -> Vec<String> {
        self.cases.iter().map(|case| case.name.clone()).collect()
    }
}

/// Enumerates the test cases of a test module.
///
/// Implementations report a module that cannot be located or loaded as
/// `RegmanError::Import`.
pub trait TestDiscovery {
    fn discover(&self, module: &TestModule, search_path: &[PathBuf]) -> Result<TestSuite>;
}

/// Ordered set of include directories.
#[derive(Debug, Clone, Default)]
pub struct IncludeRegistry {
    entries: Vec<PathBuf>,
}

impl IncludeRegistry {
    /// Append `dir` unless already present. Returns whether it was added.
    pub fn register(&mut self, dir: &Path) -> bool {
        if self.entries.iter().any(|entry| entry == dir) {
            return false;
        }
        self.entries.push(dir.to_path_buf());
        true
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }
}

pub struct TestEnv {
    includes: IncludeRegistry,
    discovery: Box<dyn TestDiscovery>,
}

impl TestEnv {
    pub fn new(discovery: Box<dyn TestDiscovery>) -> Self {
        TestEnv {
            includes: IncludeRegistry::default(),
            discovery,
        }
    }

    /// Register a runbook's include directories. Returns how many were new.
    pub fn load_includes(&mut self, runbook: &Runbook) -> usize {
        let added = runbook
            .include
            .iter()
            .filter(|dir| self.includes.register(dir))
            .count();
        if added > 0 {
            tracing::debug!(
                runbook = %runbook.origin.display(),
                added,
                total = self.includes.entries().len(),
                "include directories registered"
            );
        }
        added
    }

    /// Module search path for a testbench: its directory, the directory's
    /// parent, then the registered include directories.
    pub fn search_path(&self, tb: &Testbench) -> Vec<PathBuf> {
        let mut path = vec![tb.path.clone()];
        if let Some(parent) = tb.path.parent() {
            path.push(parent.to_path_buf());
        }
        for entry in self.includes.entries() {
            if !path.contains(entry) {
                path.push(entry.clone());
            }
        }
        path
    }

    pub fn discover(&self, tb: &Testbench) -> Result<TestSuite> {
        let module = TestModule::for_testbench(tb);
        let search_path = self.search_path(tb);
        let suite = self
            .discovery
            .discover(&module, &search_path)
            .map_err(|err| {
                if err.is::<RegmanError>() {
                    return err;
                }
                RegmanError::Import {
                    id: 1,
                    message: format!(
                        "cannot load test module '{}' from {}: {err:#}",
                        module.name,
                        module.dir.display()
                    ),
                }
                .into()
            })?;
        tracing::debug!(
            module = %module.name,
            tests = suite.cases.len(),
            "tests discovered"
        );
        Ok(suite)
    }
}
