//! CLI output formatting for pipelines, plans and watch reactions.
//!
//! # Output Format
//!
//! ## Plan
//!
//! ```text
//! Pipeline build
//! Stage 1: clean
//! Stage 2: copy
//! Stage 3: optimize-images
//! Stage 4: styles, markup, scripts, svg, sprite, next-gen-images
//! ```
//!
//! ## Run
//!
//! Tasks are listed in graph order, each with a positional index and its
//! duration. Written files and notes follow as indented context lines.
//!
//! ```text
//! 001 clean (3 ms)
//!     nothing to remove
//! 002 copy (1 ms)
//!     fonts/site.woff2
//! 005 styles FAILED (40 ms)
//!     src/sass/style.scss: expected "}".
//! 006 sprite skipped
//!
//! 8 of 10 tasks completed, 1 failed, 1 skipped
//! ```
//!
//! ## Watch
//!
//! ```text
//! [watch] styles (38 ms) → css/style.min.css
//! [watch] scripts FAILED: src/js/script.js: ...
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::graph::{TaskGraph, TaskState};
use crate::pipeline::{PipelineRun, Task};
use crate::tasks::{TaskError, TaskReport, url_path};
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable duration: milliseconds below ten seconds, else seconds.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 10_000 {
        format!("{ms} ms")
    } else {
        format!("{:.1} s", duration.as_secs_f64())
    }
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

fn report_lines(report: &TaskReport, depth: usize) -> Vec<String> {
    let pad = indent(depth);
    report
        .written
        .iter()
        .map(|path| format!("{pad}{}", url_path(path)))
        .chain(report.notes.iter().map(|note| format!("{pad}{note}")))
        .collect()
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_plan(name: &str, graph: &TaskGraph<Task>) -> Vec<String> {
    let mut lines = vec![format!("Pipeline {name}")];
    for (i, level) in graph.levels().iter().enumerate() {
        let names: Vec<&str> = level.iter().map(|&id| graph.name(id)).collect();
        lines.push(format!("Stage {}: {}", i + 1, names.join(", ")));
    }
    lines
}

pub fn print_plan(name: &str, graph: &TaskGraph<Task>) {
    for line in format_plan(name, graph) {
        println!("{}", line);
    }
}

// ============================================================================
// Pipeline run
// ============================================================================

pub fn format_run(run: &PipelineRun) -> Vec<String> {
    let mut lines = Vec::new();
    let (mut completed, mut failed, mut skipped) = (0, 0, 0);

    for (i, outcome) in run.outcomes.iter().enumerate() {
        let header = format!("{} {}", format_index(i + 1), outcome.name);
        let took = format_duration(outcome.duration);
        match (&outcome.state, &outcome.result) {
            (TaskState::Completed, Some(Ok(report))) => {
                completed += 1;
                lines.push(format!("{header} ({took})"));
                lines.extend(report_lines(report, 1));
            }
            (TaskState::Failed, Some(Err(e))) => {
                failed += 1;
                lines.push(format!("{header} FAILED ({took})"));
                lines.push(format!("{}{e}", indent(1)));
            }
            (TaskState::Skipped, _) => {
                skipped += 1;
                lines.push(format!("{header} skipped"));
            }
            (state, _) => lines.push(format!("{header} {state:?}")),
        }
    }

    lines.push(String::new());
    let total = run.outcomes.len();
    if failed == 0 && skipped == 0 {
        lines.push(format!("{completed} of {total} tasks completed"));
    } else {
        lines.push(format!(
            "{completed} of {total} tasks completed, {failed} failed, {skipped} skipped"
        ));
    }
    lines
}

pub fn print_run(run: &PipelineRun) {
    for line in format_run(run) {
        println!("{}", line);
    }
}

// ============================================================================
// Watch reactions
// ============================================================================

pub fn format_reaction(
    task: &str,
    result: &Result<TaskReport, TaskError>,
    took: Duration,
) -> String {
    match result {
        Ok(report) => {
            let written: Vec<String> = report.written.iter().map(|p| url_path(p)).collect();
            if written.is_empty() {
                format!("[watch] {task} ({})", format_duration(took))
            } else {
                format!(
                    "[watch] {task} ({}) → {}",
                    format_duration(took),
                    written.join(", ")
                )
            }
        }
        Err(e) => format!("[watch] {task} FAILED: {e}"),
    }
}

pub fn print_reaction(task: &str, result: &Result<TaskReport, TaskError>, took: Duration) {
    let line = format_reaction(task, result, took);
    if result.is_ok() {
        println!("{}", line);
    } else {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
