//! Process-backed collaborators.
//!
//! Test discovery and the simulation backend are delegated to one
//! user-configured runner command. Each operation runs `<runner> <op>` with a
//! JSON request on stdin and reads a JSON reply from stdout:
//!
//! ```text
//! discover  {module_dir, module, search_path}            -> {description?, tests: [{name, doc?}]}
//! build     {sim, sources, hdl_toplevel?, always, args}  -> {build_dir}
//! test      {sim, hdl_toplevel?, hdl_toplevel_lang, test_module,
//!            testcase, results_xml, search_path, args}   -> {results: [{name, passed}]}
//! ```
//!
//! The runner command is resolved in priority order:
//! 1. `--runner` CLI flag
//! 2. `REGMAN_RUNNER` environment variable
//! 3. `regman-runner` on `PATH`
use crate::backend::{BackendFactory, BuildRequest, SimBackend, TestOutcome, TestRequest};
use crate::env::{TestDiscovery, TestModule, TestSuite};
use crate::error::RegmanError;
use crate::runbook::Simulator;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

pub const RUNNER_ENV: &str = "REGMAN_RUNNER";
pub const DEFAULT_RUNNER: &str = "regman-runner";

/// Resolve the runner command with fallback: explicit arg > env var > default.
pub fn resolve_runner_command(explicit: Option<&str>) -> String {
    explicit
        .map(|s| s.to_string())
        .or_else(|| std::env::var(RUNNER_ENV).ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_RUNNER.to_string())
}

enum InvokeError {
    /// The runner could not be started or fed its request.
    Launch(anyhow::Error),
    Exit { status: ExitStatus, stderr: String },
}

impl InvokeError {
    fn into_anyhow(self, op: &str) -> anyhow::Error {
        match self {
            InvokeError::Launch(err) => err.context(format!("launch runner for {op}")),
            InvokeError::Exit { status, stderr } => {
                anyhow!("runner {op} failed with status {status}: {stderr}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    argv: Vec<String>,
}

impl ProcessRunner {
    pub fn from_command(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse runner command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("runner command is empty"));
        }
        Ok(ProcessRunner { argv })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn program(&self) -> Result<PathBuf> {
        let name = &self.argv[0];
        which::which(name).with_context(|| format!("runner program not found: {name}"))
    }

    fn invoke<T: Serialize>(&self, op: &str, request: &T) -> Result<Vec<u8>, InvokeError> {
        let payload = serde_json::to_vec(request)
            .context("serialize runner request")
            .map_err(InvokeError::Launch)?;
        let program = self.program().map_err(InvokeError::Launch)?;

        let start = Instant::now();
        let mut child = Command::new(&program)
            .args(&self.argv[1..])
            .arg(op)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn runner: {}", program.display()))
            .map_err(InvokeError::Launch)?;

        // A runner that exits without reading its request closes the pipe early.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(&payload) {
                if err.kind() != io::ErrorKind::BrokenPipe {
                    return Err(InvokeError::Launch(
                        anyhow::Error::new(err).context("write request to runner stdin"),
                    ));
                }
            }
        }

        let output = child
            .wait_with_output()
            .context("wait for runner")
            .map_err(InvokeError::Launch)?;

        tracing::info!(
            op,
            elapsed_ms = start.elapsed().as_millis(),
            request_bytes = payload.len(),
            response_bytes = output.stdout.len(),
            "runner invoke complete"
        );

        if !output.status.success() {
            return Err(InvokeError::Exit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

fn parse_reply<T: DeserializeOwned>(op: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).with_context(|| {
        let text = String::from_utf8_lossy(bytes);
        format!(
            "parse runner {op} reply as JSON; first 200 chars: {}",
            text.chars().take(200).collect::<String>()
        )
    })
}

#[derive(Serialize)]
struct DiscoverRequest<'a> {
    module_dir: &'a Path,
    module: &'a str,
    search_path: &'a [PathBuf],
}

impl TestDiscovery for ProcessRunner {
    fn discover(&self, module: &TestModule, search_path: &[PathBuf]) -> Result<TestSuite> {
        let request = DiscoverRequest {
            module_dir: &module.dir,
            module: &module.name,
            search_path,
        };
        let bytes = self.invoke("discover", &request).map_err(|err| match err {
            InvokeError::Launch(err) => RegmanError::Import {
                id: 0,
                message: format!("cannot run test discovery for '{}': {err:#}", module.name),
            },
            InvokeError::Exit { stderr, .. } => RegmanError::Import {
                id: 1,
                message: format!(
                    "cannot load test module '{}' from {}: {stderr}",
                    module.name,
                    module.dir.display()
                ),
            },
        })?;
        parse_reply("discover", &bytes)
    }
}

impl BackendFactory for ProcessRunner {
    fn acquire(&self, sim: Simulator) -> Result<Box<dyn SimBackend>> {
        tracing::debug!(sim = %sim, runner = ?self.argv(), "backend acquired");
        Ok(Box::new(ProcessBackend {
            runner: self.clone(),
            sim,
        }))
    }
}

/// Request envelope naming the simulator the handle is bound to.
#[derive(Serialize)]
struct Envelope<'a, T> {
    sim: Simulator,
    #[serde(flatten)]
    request: &'a T,
}

#[derive(Deserialize)]
struct BuildReply {
    build_dir: PathBuf,
}

struct ProcessBackend {
    runner: ProcessRunner,
    sim: Simulator,
}

impl ProcessBackend {
    fn call<T: Serialize, R: DeserializeOwned>(&self, op: &str, request: &T) -> Result<R> {
        let envelope = Envelope {
            sim: self.sim,
            request,
        };
        let bytes = self
            .runner
            .invoke(op, &envelope)
            .map_err(|err| err.into_anyhow(op))?;
        parse_reply(op, &bytes)
    }
}

impl SimBackend for ProcessBackend {
    fn build(&mut self, request: &BuildRequest) -> Result<PathBuf> {
        let reply: BuildReply = self.call("build", request)?;
        Ok(reply.build_dir)
    }

    fn test(&mut self, request: &TestRequest) -> Result<TestOutcome> {
        self.call("test", request)
    }
}
