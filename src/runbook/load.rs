//! Runbook loading pipeline.
//!
//! read → YAML → schema → path resolution → path checks → stage arguments.
//! The first failing stage aborts the load with its batched report; no
//! partially validated runbook ever escapes.
use super::paths::{expand_args, resolve_paths, resolve_sources, verify_paths};
use super::schema::{validate_document, GENERAL_KEY};
use super::stage_args::{validate_stage_args, Stage};
use super::types::{Hdl, Runbook, Simulator, StageArgs, Testbench};
use crate::error::{RegmanError, ValidationStage};
use crate::util::resolve_path;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name looked up when a directory is given instead of a runbook.
pub const DEFAULT_RUNBOOK_NAME: &str = ".regman";

#[derive(Debug, Deserialize)]
struct RawGeneral {
    sim: Simulator,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    build_args: StageArgs,
    #[serde(default)]
    test_args: StageArgs,
}

#[derive(Debug, Deserialize)]
struct RawBody {
    #[serde(default)]
    srcs: BTreeMap<i64, String>,
    tbs: BTreeMap<String, RawTestbench>,
    #[serde(default)]
    include: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTestbench {
    path: String,
    tb_top: String,
    hdl: Hdl,
    #[serde(default)]
    rtl_top: Option<String>,
    #[serde(default)]
    srcs: Vec<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    build_args: StageArgs,
    #[serde(default)]
    test_args: StageArgs,
}

/// Resolve a CLI path to a runbook file (a file, or a directory holding
/// `.regman`).
pub fn locate_runbook(path: &Path) -> Result<PathBuf, RegmanError> {
    let candidate = if path.is_dir() {
        path.join(DEFAULT_RUNBOOK_NAME)
    } else {
        path.to_path_buf()
    };
    if !candidate.is_file() {
        return Err(RegmanError::File {
            path: candidate,
            source: io::Error::new(io::ErrorKind::NotFound, "runbook file not found"),
        });
    }
    Ok(candidate)
}

/// Load and fully validate a runbook file.
pub fn load_runbook(path: &Path) -> Result<Runbook, RegmanError> {
    let text = fs::read_to_string(path).map_err(|source| RegmanError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let origin = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    parse_runbook(&text, &origin)
}

/// Validate runbook text as if it had been read from `origin`.
pub fn parse_runbook(text: &str, origin: &Path) -> Result<Runbook, RegmanError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|source| RegmanError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    let doc = serde_json::to_value(yaml).map_err(|err| schema_error(err.to_string()))?;
    validate_document(&doc)?;

    let general_value = doc.get(GENERAL_KEY).unwrap_or(&doc);
    let general =
        RawGeneral::deserialize(general_value).map_err(|err| schema_error(err.to_string()))?;
    let body = RawBody::deserialize(&doc).map_err(|err| schema_error(err.to_string()))?;

    let base = origin.parent().unwrap_or_else(|| Path::new("."));
    let runbook = build_runbook(origin, base, general, body);

    verify_paths(&runbook)?;
    validate_all_stage_args(&runbook)?;

    tracing::info!(
        runbook = %runbook.origin.display(),
        sim = %runbook.sim,
        testbenches = runbook.tbs.len(),
        sources = runbook.srcs.len(),
        "runbook loaded"
    );
    Ok(runbook)
}

fn schema_error(detail: String) -> RegmanError {
    RegmanError::validation(
        ValidationStage::Schema,
        "runbook schema validation failed",
        vec![detail],
    )
}

fn build_runbook(origin: &Path, base: &Path, general: RawGeneral, body: RawBody) -> Runbook {
    let tbs = body
        .tbs
        .into_iter()
        .map(|(name, raw)| {
            let tb = Testbench {
                path: resolve_path(base, &raw.path),
                srcs: raw.srcs,
                tb_top: raw.tb_top,
                rtl_top: raw.rtl_top,
                hdl: raw.hdl,
                tags: raw.tags,
                build_args: expand_args(raw.build_args),
                test_args: expand_args(raw.test_args),
            };
            (name, tb)
        })
        .collect();

    Runbook {
        origin: origin.to_path_buf(),
        title: general.title,
        sim: general.sim,
        srcs: resolve_sources(body.srcs, base),
        include: resolve_paths(body.include, base),
        build_args: expand_args(general.build_args),
        test_args: expand_args(general.test_args),
        tbs,
    }
}

fn validate_all_stage_args(runbook: &Runbook) -> Result<(), RegmanError> {
    let global = [
        ("global".to_string(), Stage::Test, &runbook.test_args),
        ("global".to_string(), Stage::Build, &runbook.build_args),
    ];
    let per_tb = runbook.tbs.iter().flat_map(|(name, tb)| {
        let scope = format!("testbench '{name}'");
        [
            (scope.clone(), Stage::Test, &tb.test_args),
            (scope, Stage::Build, &tb.build_args),
        ]
    });
    validate_stage_args(global.into_iter().chain(per_tb))
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
