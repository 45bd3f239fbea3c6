//! Path resolution and filesystem checks for runbook documents.
//!
//! Resolution expands `~` and environment references, then anchors relative
//! paths at the runbook's directory. String argument values get expansion
//! only since they are not guaranteed to be paths.
use super::types::{ArgScalar, ArgValue, Runbook, StageArgs};
use crate::error::{RegmanError, ValidationStage};
use crate::util::{expand_user_vars, resolve_path};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub(super) fn resolve_sources(
    srcs: BTreeMap<i64, String>,
    base: &Path,
) -> BTreeMap<i64, PathBuf> {
    srcs.into_iter()
        .map(|(index, raw)| (index, resolve_path(base, &raw)))
        .collect()
}

pub(super) fn resolve_paths(raw: Vec<String>, base: &Path) -> Vec<PathBuf> {
    raw.iter().map(|entry| resolve_path(base, entry)).collect()
}

pub(super) fn expand_args(args: StageArgs) -> StageArgs {
    args.into_iter()
        .map(|(key, value)| {
            let value = match value {
                ArgValue::Scalar(ArgScalar::Str(text)) => {
                    ArgValue::Scalar(ArgScalar::Str(expand_user_vars(&text)))
                }
                other => other,
            };
            (key, value)
        })
        .collect()
}

/// Check existence/kind of every resolved path, then source-index references.
///
/// Missing paths are reported before unregistered indices; each report lists
/// every offender.
pub fn verify_paths(runbook: &Runbook) -> Result<(), RegmanError> {
    let mut missing = Vec::new();
    for path in runbook.srcs.values() {
        if !path.is_file() {
            missing.push(format!("{} (expected a file)", path.display()));
        }
    }
    for tb in runbook.tbs.values() {
        if !tb.path.is_dir() {
            missing.push(format!("{} (expected a directory)", tb.path.display()));
        }
    }
    for path in &runbook.include {
        if !path.exists() {
            missing.push(path.display().to_string());
        }
    }
    if !missing.is_empty() {
        return Err(RegmanError::validation(
            ValidationStage::Paths,
            "non-existent paths",
            missing,
        ));
    }

    let unregistered: Vec<String> = runbook
        .tbs
        .iter()
        .filter_map(|(name, tb)| {
            let indices: Vec<String> = tb
                .srcs
                .iter()
                .filter(|index| !runbook.srcs.contains_key(index))
                .map(|index| index.to_string())
                .collect();
            if indices.is_empty() {
                None
            } else {
                Some(format!("{name}: {}", indices.join(", ")))
            }
        })
        .collect();
    if !unregistered.is_empty() {
        return Err(RegmanError::validation(
            ValidationStage::SourceIndices,
            "unregistered source indices",
            unregistered,
        ));
    }
    Ok(())
}
