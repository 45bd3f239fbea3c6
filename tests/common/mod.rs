//! Shared test infrastructure for integration tests.
//!
//! A `Project` is a temporary HDL project with a runbook, RTL sources,
//! testbench directories and a shell-script runner that answers the
//! discover/build/test protocol with canned replies.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const RUNBOOK: &str = r#"
title: Demo regression
sim: icarus
srcs:
  0: rtl/alu.v
  1: rtl/top.v
include:
  - lib
build_args:
  waves: true
tbs:
  alu:
    path: tb/alu
    tb_top: test_alu
    rtl_top: alu
    hdl: verilog
    tags: [smoke]
    srcs: [0]
  top:
    path: tb/top
    tb_top: test_top
    rtl_top: top
    hdl: vhdl
    tags: [regress]
    srcs: [0, 1]
"#;

const FAKE_RUNNER: &str = r##"#!/bin/sh
op="$1"
request=$(cat)
echo "$op" >> "$REGMAN_FAKE_LOG"
case "$op" in
  discover)
    case "$request" in
      *'"module":"test_alu"'*)
        echo '{"description": "ALU checks", "tests": [{"name": "test_add", "doc": "Add two operands."}, {"name": "test_sub"}]}' ;;
      *'"module":"test_top"'*)
        echo '{"tests": [{"name": "test_reset"}]}' ;;
      *)
        echo "No module found for request" >&2
        exit 1 ;;
    esac ;;
  build)
    echo '{"build_dir": "/tmp/regman-fake-build"}' ;;
  test)
    case "$request" in
      *test_sub*)
        echo '{"results": [{"name": "test_add", "passed": true}, {"name": "test_sub", "passed": false}]}' ;;
      *)
        echo '{"results": [{"name": "test_reset", "passed": true}]}' ;;
    esac ;;
  *)
    echo "unknown operation $op" >&2
    exit 2 ;;
esac
"##;

pub struct Project {
    _dir: TempDir,
    pub root: PathBuf,
    pub runner: PathBuf,
    pub log: PathBuf,
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent directory");
    }
    std::fs::write(path, contents.as_bytes()).expect("write file");
}

impl Project {
    pub fn new() -> Self {
        Self::with_runbook(RUNBOOK)
    }

    pub fn with_runbook(runbook: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        write_file(&root.join("rtl/alu.v"), "module alu; endmodule\n");
        write_file(&root.join("rtl/top.v"), "module top; endmodule\n");
        std::fs::create_dir_all(root.join("tb/alu")).expect("create tb/alu");
        std::fs::create_dir_all(root.join("tb/top")).expect("create tb/top");
        std::fs::create_dir_all(root.join("lib")).expect("create lib");
        write_file(&root.join(".regman"), runbook);

        let runner = root.join("bin/fake-runner");
        write_file(&runner, FAKE_RUNNER);
        make_executable(&runner);

        Project {
            log: root.join("runner.log"),
            _dir: dir,
            root,
            runner,
        }
    }

    /// Run `regman` with the fake runner configured through `REGMAN_RUNNER`.
    pub fn regman(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_regman"))
            .args(args)
            .current_dir(&self.root)
            .env("REGMAN_RUNNER", &self.runner)
            .env("REGMAN_FAKE_LOG", &self.log)
            .env_remove("REGMAN_LOG")
            .output()
            .expect("run regman")
    }

    /// Operations the fake runner received, in order.
    pub fn runner_calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path).expect("stat runner").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod runner");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
