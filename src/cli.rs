//! CLI argument parsing for the regression manager.
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "regman",
    version,
    about = "Regression manager for HDL verification testbenches",
    after_help = "Examples:\n  regman list\n  regman list path/to/project -t alu\n  regman run -d -n 3\n  regman run runbook.yml -t alu -i 'test_add.*' -E slow\n  regman run --runner 'python3 -m my_runner' --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Emit progress logs to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    List(ListArgs),
    Run(RunArgs),
}

/// Runbook location and collaborator settings shared by every command.
#[derive(Args, Debug)]
pub struct RunbookArgs {
    /// Runbook file, or a directory holding `.regman`
    #[arg(value_name = "RUNBOOK", default_value = ".")]
    pub runbook: PathBuf,

    /// Runner command for test discovery and simulation (overrides REGMAN_RUNNER)
    #[arg(long, value_name = "CMD")]
    pub runner: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show a runbook overview or one testbench in detail")]
pub struct ListArgs {
    #[command(flatten)]
    pub common: RunbookArgs,

    /// Testbench to describe, including its discovered tests
    #[arg(short = 't', long = "testbench", value_name = "NAME")]
    pub testbench: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Run, or preview, a regression")]
pub struct RunArgs {
    #[command(flatten)]
    pub common: RunbookArgs,

    /// Print the regression plan without building or testing anything
    #[arg(short = 'd', long = "dry")]
    pub dry: bool,

    /// Testbench to run; repeat the flag for several (default: all)
    #[arg(
        short = 't',
        long = "testbench",
        value_name = "NAME",
        action = ArgAction::Append
    )]
    pub testbenches: Vec<String>,

    /// Repeat every selected test N times
    #[arg(
        short = 'n',
        long = "ntimes",
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub ntimes: u32,

    /// Run tests whose name fully matches one of these patterns
    #[arg(
        short = 'i',
        long = "include-tests",
        value_name = "RE",
        action = ArgAction::Append,
        value_parser = parse_pattern
    )]
    pub include_tests: Vec<String>,

    /// Skip tests whose name fully matches one of these patterns
    #[arg(
        short = 'e',
        long = "exclude-tests",
        value_name = "RE",
        action = ArgAction::Append,
        value_parser = parse_pattern
    )]
    pub exclude_tests: Vec<String>,

    /// Run testbenches carrying a tag that fully matches one of these patterns
    #[arg(
        short = 'I',
        long = "include-tags",
        value_name = "RE",
        action = ArgAction::Append,
        value_parser = parse_pattern
    )]
    pub include_tags: Vec<String>,

    /// Skip testbenches whose tags all fully match these patterns
    #[arg(
        short = 'E',
        long = "exclude-tags",
        value_name = "RE",
        action = ArgAction::Append,
        value_parser = parse_pattern
    )]
    pub exclude_tags: Vec<String>,
}

fn parse_pattern(raw: &str) -> Result<String, String> {
    crate::filter::compile_full_match(raw)
        .map(|_| raw.to_string())
        .map_err(|err| format!("{err:#}"))
}
