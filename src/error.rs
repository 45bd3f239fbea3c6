//! Domain error taxonomy.
//!
//! Every domain failure renders as a short code (area prefix + numeric id)
//! followed by a human-readable message. Domain errors travel inside
//! `anyhow::Error` and are recovered with `downcast_ref` at the CLI boundary.
use std::path::PathBuf;
use thiserror::Error;

/// Validation sub-stages, in the order the loader runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Schema,
    Paths,
    SourceIndices,
    StageArgs,
}

impl ValidationStage {
    pub fn id(self) -> u8 {
        match self {
            ValidationStage::Schema => 0,
            ValidationStage::Paths => 1,
            ValidationStage::SourceIndices => 2,
            ValidationStage::StageArgs => 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegmanError {
    #[error("RBF-0: cannot read runbook {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("RBY-0: malformed runbook {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Carries every offender found by one validation stage.
    #[error("RBV-{}: {}", .stage.id(), bullet_list(.summary, .items))]
    Validation {
        stage: ValidationStage,
        summary: String,
        items: Vec<String>,
    },

    #[error("CMN-0: {message}")]
    Name { message: String },

    #[error("TEI-{id}: {message}")]
    Import { id: u8, message: String },
}

impl RegmanError {
    pub fn validation(
        stage: ValidationStage,
        summary: impl Into<String>,
        items: Vec<String>,
    ) -> Self {
        RegmanError::Validation {
            stage,
            summary: summary.into(),
            items,
        }
    }

    /// Unknown explicitly requested testbench names.
    pub fn unknown_testbenches(unknown: &[&str], available: &[&str]) -> Self {
        RegmanError::Name {
            message: format!(
                "unknown testbench name(s): {} (available: {})",
                unknown.join(", "),
                available.join(", ")
            ),
        }
    }

    /// Short code such as `RBV-2`.
    pub fn code(&self) -> String {
        match self {
            RegmanError::File { .. } => "RBF-0".to_string(),
            RegmanError::Parse { .. } => "RBY-0".to_string(),
            RegmanError::Validation { stage, .. } => format!("RBV-{}", stage.id()),
            RegmanError::Name { .. } => "CMN-0".to_string(),
            RegmanError::Import { id, .. } => format!("TEI-{id}"),
        }
    }
}

fn bullet_list(summary: &str, items: &[String]) -> String {
    let mut out = summary.to_string();
    for item in items {
        out.push_str("\n  - ");
        out.push_str(item);
    }
    out
}
