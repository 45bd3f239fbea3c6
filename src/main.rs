//! Regression manager for HDL verification testbenches.
//!
//! `regman` loads a runbook, selects testbenches and test cases, and drives an
//! external runner that discovers tests and talks to the simulator.
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod backend;
mod cli;
mod env;
mod error;
mod filter;
mod orchestrator;
mod report;
mod runbook;
mod runner;
mod util;

use cli::{Command, ListArgs, RootArgs, RunArgs, RunbookArgs};
use env::TestEnv;
use error::RegmanError;
use filter::Filtering;
use orchestrator::Orchestrator;
use runbook::{load_runbook, locate_runbook, Runbook};
use runner::{resolve_runner_command, ProcessRunner};

const LOG_ENV: &str = "REGMAN_LOG";

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match dispatch(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", error_message(&err));
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr subscriber. `REGMAN_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<RegmanError>() {
        Some(domain) => {
            tracing::debug!(code = %domain.code(), chain = %format!("{err:#}"), "domain error");
            format!("[regman error] {domain}")
        }
        None => format!("[regman error] {err:#}"),
    }
}

fn dispatch(args: RootArgs) -> Result<ExitCode> {
    match args.command {
        Command::List(args) => cmd_list(&args).map(|()| ExitCode::SUCCESS),
        Command::Run(args) => cmd_run(&args),
    }
}

fn load(common: &RunbookArgs) -> Result<Runbook> {
    let path = locate_runbook(&common.runbook)?;
    Ok(load_runbook(&path)?)
}

fn process_runner(common: &RunbookArgs) -> Result<ProcessRunner> {
    ProcessRunner::from_command(&resolve_runner_command(common.runner.as_deref()))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_list(args: &ListArgs) -> Result<()> {
    let runbook = load(&args.common)?;
    let Some(name) = args.testbench.as_deref() else {
        if args.common.json {
            return print_json(&report::runbook_json(&runbook));
        }
        print!("{}", report::render_runbook_overview(&runbook));
        return Ok(());
    };

    let tb = runbook
        .testbench(name)
        .ok_or_else(|| RegmanError::unknown_testbenches(&[name], &runbook.testbench_names()))?;
    let mut env = TestEnv::new(Box::new(process_runner(&args.common)?));
    env.load_includes(&runbook);
    let suite = env.discover(tb)?;

    if args.common.json {
        let sources = runbook.sources_for(tb);
        return print_json(&report::testbench_json(name, tb, &sources, &suite));
    }
    print!(
        "{}",
        report::render_testbench_detail(&runbook, name, tb, &suite)
    );
    Ok(())
}

/// Exit status is a failure when any test failed.
fn cmd_run(args: &RunArgs) -> Result<ExitCode> {
    let runbook = Arc::new(load(&args.common)?);
    let filtering = Filtering::new(
        args.testbenches.clone(),
        &args.include_tests,
        &args.exclude_tests,
        &args.include_tags,
        &args.exclude_tags,
    )?;
    let runner = process_runner(&args.common)?;
    let mut env = TestEnv::new(Box::new(runner.clone()));

    let mut orchestrator = Orchestrator::new();
    orchestrator.build_plan(&mut env, &runbook, &filtering)?;
    let ntimes = args.ntimes as usize;
    tracing::info!(
        entries = orchestrator.plan().len(),
        ntimes,
        dry = args.dry,
        "regression plan built"
    );

    if args.dry {
        let preview = orchestrator.preview(ntimes);
        if args.common.json {
            print_json(&report::preview_json(&preview, ntimes))?;
        } else {
            print!("{}", report::render_preview(&preview));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let summary = orchestrator.run(&mut env, &runner, ntimes)?;
    if args.common.json {
        print_json(&report::run_summary_json(&summary, ntimes))?;
    } else {
        print!("{}", report::render_run_summary(&summary));
    }
    if summary.failed() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
