//! Validated runbook model.
//!
//! A `Runbook` only exists after the whole validation pipeline passed, so
//! consumers can rely on its invariants without re-checking them.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Simulator products the runner can drive.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    Icarus,
    Verilator,
    Vcs,
    Riviera,
    Questa,
    Activehdl,
    Modelsim,
    Ius,
    Xcelium,
    Ghdl,
    Nvc,
    Cvc,
}

impl Simulator {
    pub const ALL: [Simulator; 12] = [
        Simulator::Icarus,
        Simulator::Verilator,
        Simulator::Vcs,
        Simulator::Riviera,
        Simulator::Questa,
        Simulator::Activehdl,
        Simulator::Modelsim,
        Simulator::Ius,
        Simulator::Xcelium,
        Simulator::Ghdl,
        Simulator::Nvc,
        Simulator::Cvc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Simulator::Icarus => "icarus",
            Simulator::Verilator => "verilator",
            Simulator::Vcs => "vcs",
            Simulator::Riviera => "riviera",
            Simulator::Questa => "questa",
            Simulator::Activehdl => "activehdl",
            Simulator::Modelsim => "modelsim",
            Simulator::Ius => "ius",
            Simulator::Xcelium => "xcelium",
            Simulator::Ghdl => "ghdl",
            Simulator::Nvc => "nvc",
            Simulator::Cvc => "cvc",
        }
    }
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware description language of a testbench's RTL top level.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Hdl {
    Verilog,
    Vhdl,
}

impl Hdl {
    pub const ALL: [Hdl; 2] = [Hdl::Verilog, Hdl::Vhdl];

    pub fn as_str(self) -> &'static str {
        match self {
            Hdl::Verilog => "verilog",
            Hdl::Vhdl => "vhdl",
        }
    }
}

impl fmt::Display for Hdl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar stage-argument value.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ArgScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ArgScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgScalar::Bool(value) => write!(f, "{value}"),
            ArgScalar::Int(value) => write!(f, "{value}"),
            ArgScalar::Float(value) => write!(f, "{value}"),
            ArgScalar::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Build/test argument value.
///
/// The table form carries `defines`, `parameters` and `extra_env`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ArgValue {
    Scalar(ArgScalar),
    List(Vec<String>),
    Table(BTreeMap<String, ArgScalar>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Scalar(ArgScalar::Str(value)) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Scalar(value) => write!(f, "{value}"),
            ArgValue::List(items) => write!(f, "[{}]", items.join(", ")),
            ArgValue::Table(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

pub type StageArgs = BTreeMap<String, ArgValue>;

/// Overlay `overrides` on `base`; override keys win.
pub fn merge_args(base: &StageArgs, overrides: &StageArgs) -> StageArgs {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Single verification unit.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Testbench {
    /// Absolute directory holding the test module.
    pub path: PathBuf,
    /// Source indices into the owning runbook's table.
    pub srcs: Vec<i64>,
    pub tb_top: String,
    pub rtl_top: Option<String>,
    pub hdl: Hdl,
    pub tags: Vec<String>,
    pub build_args: StageArgs,
    pub test_args: StageArgs,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Runbook {
    /// Runbook document the model was loaded from.
    pub origin: PathBuf,
    pub title: Option<String>,
    pub sim: Simulator,
    pub srcs: BTreeMap<i64, PathBuf>,
    pub include: Vec<PathBuf>,
    pub build_args: StageArgs,
    pub test_args: StageArgs,
    pub tbs: BTreeMap<String, Testbench>,
}

impl Runbook {
    pub fn contains(&self, name: &str) -> bool {
        self.tbs.contains_key(name)
    }

    pub fn testbench(&self, name: &str) -> Option<&Testbench> {
        self.tbs.get(name)
    }

    pub fn testbench_names(&self) -> Vec<&str> {
        self.tbs.keys().map(String::as_str).collect()
    }

    /// Source paths a testbench depends on, in ascending index order.
    pub fn sources_for(&self, tb: &Testbench) -> Vec<PathBuf> {
        self.srcs
            .iter()
            .filter(|(index, _)| tb.srcs.contains(index))
            .map(|(_, path)| path.clone())
            .collect()
    }

    /// Directory the runbook document lives in.
    pub fn root(&self) -> Option<&std::path::Path> {
        self.origin.parent()
    }
}
