//! Console and JSON rendering for listings, previews and run summaries.
//!
//! Rendering is presentational only; nothing here feeds back into planning.
use crate::env::TestSuite;
use crate::orchestrator::{PreviewEntry, RunSummary};
use crate::runbook::{Runbook, StageArgs, Testbench, STAGE_ARGS_REVISION};
use crate::util::display_path;
use serde_json::{json, Value};
use std::path::PathBuf;

pub const DRY_RUN_BANNER: &str = "DRY RUN";
pub const NO_TESTS: &str = "No tests to run";
pub const NO_TESTBENCHES: &str = "No testbenches to run";

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Left-aligned columns padded to the widest cell.
fn render_table(out: &mut String, headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let format_row = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("  {}", padded.join("  ").trim_end())
    };
    push_line(out, &format_row(headers.to_vec()));
    for row in rows {
        push_line(out, &format_row(row.iter().map(String::as_str).collect()));
    }
}

fn render_args(out: &mut String, label: &str, args: &StageArgs) {
    if args.is_empty() {
        return;
    }
    push_line(out, &format!("{label}:"));
    for (key, value) in args {
        push_line(out, &format!("  {key} = {value}"));
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn source_indices(tb: &Testbench) -> Vec<String> {
    tb.srcs.iter().map(|index| index.to_string()).collect()
}

pub fn render_runbook_overview(runbook: &Runbook) -> String {
    let root = runbook.root();
    let mut out = String::new();
    let title = runbook
        .title
        .clone()
        .unwrap_or_else(|| runbook.origin.display().to_string());
    push_line(&mut out, &title);
    push_line(&mut out, &format!("  runbook: {}", runbook.origin.display()));
    push_line(&mut out, &format!("  simulator: {}", runbook.sim));

    if !runbook.srcs.is_empty() {
        push_line(&mut out, "Sources:");
        for (index, path) in &runbook.srcs {
            push_line(&mut out, &format!("  {index:>3}  {}", display_path(path, root)));
        }
    }
    if !runbook.include.is_empty() {
        push_line(&mut out, "Include directories:");
        for path in &runbook.include {
            push_line(&mut out, &format!("  {}", display_path(path, root)));
        }
    }
    render_args(&mut out, "Build arguments", &runbook.build_args);
    render_args(&mut out, "Test arguments", &runbook.test_args);

    push_line(&mut out, "Testbenches:");
    if runbook.tbs.is_empty() {
        push_line(&mut out, "  None.");
        return out;
    }
    let rows: Vec<Vec<String>> = runbook
        .tbs
        .iter()
        .map(|(name, tb)| {
            vec![
                name.clone(),
                tb.rtl_top.clone().unwrap_or_else(|| "-".to_string()),
                tb.tb_top.clone(),
                tb.hdl.to_string(),
                join_or_dash(&tb.tags),
                join_or_dash(&source_indices(tb)),
            ]
        })
        .collect();
    render_table(
        &mut out,
        &["NAME", "RTL TOP", "TB TOP", "HDL", "TAGS", "SOURCES"],
        &rows,
    );
    out
}

pub fn render_testbench_detail(
    runbook: &Runbook,
    name: &str,
    tb: &Testbench,
    suite: &TestSuite,
) -> String {
    let root = runbook.root();
    let mut out = String::new();
    push_line(&mut out, &format!("Testbench: {name}"));
    push_line(
        &mut out,
        &format!("  module: {} ({})", tb.tb_top, display_path(&tb.path, root)),
    );
    if let Some(rtl_top) = &tb.rtl_top {
        push_line(&mut out, &format!("  rtl top: {rtl_top}"));
    }
    push_line(&mut out, &format!("  hdl: {}", tb.hdl));
    push_line(&mut out, &format!("  tags: {}", join_or_dash(&tb.tags)));
    for path in runbook.sources_for(tb) {
        push_line(&mut out, &format!("  source: {}", display_path(&path, root)));
    }
    render_args(&mut out, "Build arguments", &tb.build_args);
    render_args(&mut out, "Test arguments", &tb.test_args);

    if let Some(description) = suite.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            push_line(&mut out, "");
            for line in description.lines() {
                push_line(&mut out, &format!("  {line}"));
            }
        }
    }

    push_line(&mut out, "Tests:");
    if suite.cases.is_empty() {
        push_line(&mut out, "  None.");
    }
    for case in &suite.cases {
        match case.doc.as_deref().map(first_line).filter(|doc| !doc.is_empty()) {
            Some(doc) => push_line(&mut out, &format!("  {}  {doc}", case.name)),
            None => push_line(&mut out, &format!("  {}", case.name)),
        }
    }
    out
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}

pub fn render_preview(entries: &[PreviewEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        push_line(&mut out, NO_TESTBENCHES);
        return out;
    }
    push_line(&mut out, DRY_RUN_BANNER);
    for entry in entries {
        push_line(&mut out, &entry.tb_name);
        if entry.tests.is_empty() {
            push_line(&mut out, &format!("  {NO_TESTS}"));
            continue;
        }
        for test in &entry.tests {
            push_line(&mut out, &format!("  {test}"));
        }
    }
    out
}

pub fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    if summary.testbenches.is_empty() {
        push_line(&mut out, NO_TESTBENCHES);
        return out;
    }
    for run in &summary.testbenches {
        if run.skipped {
            push_line(&mut out, &format!("{}: {NO_TESTS}", run.tb_name));
            continue;
        }
        let passed = run.results.iter().filter(|result| result.passed).count();
        push_line(
            &mut out,
            &format!(
                "{}: {passed} passed, {} failed",
                run.tb_name,
                run.results.len() - passed
            ),
        );
        for result in &run.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            push_line(&mut out, &format!("  {status}  {}", result.name));
        }
        if let Some(results_xml) = &run.results_xml {
            push_line(&mut out, &format!("  results: {}", results_xml.display()));
        }
    }
    push_line(
        &mut out,
        &format!(
            "Total: {} passed, {} failed",
            summary.passed(),
            summary.failed()
        ),
    );
    out
}

pub fn runbook_json(runbook: &Runbook) -> Value {
    json!({
        "stage_args_revision": STAGE_ARGS_REVISION,
        "runbook": runbook,
    })
}

pub fn testbench_json(name: &str, tb: &Testbench, sources: &[PathBuf], suite: &TestSuite) -> Value {
    json!({
        "name": name,
        "testbench": tb,
        "sources": sources,
        "description": suite.description,
        "tests": suite.cases,
    })
}

pub fn preview_json(entries: &[PreviewEntry], ntimes: usize) -> Value {
    json!({
        "dry_run": true,
        "ntimes": ntimes,
        "plan": entries,
    })
}

pub fn run_summary_json(summary: &RunSummary, ntimes: usize) -> Value {
    json!({
        "dry_run": false,
        "ntimes": ntimes,
        "passed": summary.passed(),
        "failed": summary.failed(),
        "testbenches": summary.testbenches,
    })
}
