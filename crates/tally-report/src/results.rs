//! Scenario result listing and batch summary.

use std::fmt::Write as _;

use tally_driver::DriveOutcome;
use tally_scenario::{ScenarioResult, Summary};

use crate::RenderOptions;
use crate::table::{colorize_status, render_table};

/// Render each result (verdict, termination, assertion outcomes, output tail
/// on failure) followed by a summary table.
#[must_use]
pub fn render_results(results: &[ScenarioResult], options: &RenderOptions) -> String {
    let mut out = String::new();

    for result in results {
        render_result(&mut out, result, options);
    }

    let summary_rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.verdict.to_string(),
                r.drive.as_ref().map_or_else(
                    || "not run".to_string(),
                    |d| d.termination.to_string(),
                ),
                format!(
                    "{}/{}",
                    r.assertions.len() - r.failed_assertions(),
                    r.assertions.len()
                ),
                format_elapsed(r),
            ]
        })
        .collect();
    if !summary_rows.is_empty() {
        out.push_str(&render_table(
            &["scenario", "verdict", "termination", "passed", "elapsed"],
            &summary_rows,
            options.table,
        ));
        out.push('\n');
    }

    let summary = Summary::of(results);
    let _ = write!(
        out,
        "Summary: {} passed, {} failed, {} total",
        summary.passed, summary.failed, summary.total
    );
    out
}

fn render_result(out: &mut String, result: &ScenarioResult, options: &RenderOptions) {
    let verdict = result.verdict.to_string();
    let verdict = if options.table.color {
        colorize_status(&verdict)
    } else {
        verdict
    };
    let _ = writeln!(out, "[{verdict}] {} ({})", result.name, format_elapsed(result));
    if !result.description.is_empty() {
        let _ = writeln!(out, "   {}", result.description);
    }

    match &result.drive {
        Some(drive) => {
            let _ = writeln!(
                out,
                "   termination: {} | expected: {} | lines sent: {}{}",
                drive.termination,
                result.expect_exit.as_str(),
                drive.lines_sent,
                if drive.truncated {
                    " | output truncated"
                } else {
                    ""
                }
            );
        }
        None => {
            let _ = writeln!(out, "   termination: not run");
        }
    }

    if let Some(inspection) = &result.inspection
        && let Some(reason) = &inspection.unavailable
    {
        let _ = writeln!(out, "   store: unavailable ({reason})");
    }

    for outcome in &result.assertions {
        if outcome.passed {
            let _ = writeln!(out, "   ✓ {}", outcome.description);
        } else {
            let _ = writeln!(
                out,
                "   ✗ {} (expected {}, observed {})",
                outcome.description, outcome.expected, outcome.observed
            );
        }
    }

    if let Some(reason) = result.verdict.reason() {
        let _ = writeln!(out, "   reason: {reason}");
        if let Some(drive) = &result.drive {
            let tail = drive.tail(options.tail_lines);
            if !tail.is_empty() {
                let _ = writeln!(out, "   output (last {} lines):", options.tail_lines);
                for line in tail.lines() {
                    let _ = writeln!(out, "     | {line}");
                }
            }
        }
    }
    out.push('\n');
}

/// Render a bare drive: the captured output, then one status line.
#[must_use]
pub fn render_drive(outcome: &DriveOutcome, crash_marker: Option<&str>) -> String {
    let mut out = outcome.output.clone();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    let _ = write!(
        out,
        "-- {} | lines sent: {} | elapsed: {:.1}s",
        outcome.termination,
        outcome.lines_sent,
        outcome.elapsed.as_secs_f64()
    );
    if outcome.truncated {
        out.push_str(" | output truncated");
    }
    if let Some(marker) = crash_marker {
        let _ = write!(out, "\n-- crash marker found: {marker}");
    }
    out
}

fn format_elapsed(result: &ScenarioResult) -> String {
    let millis = (result.finished_at - result.started_at)
        .num_milliseconds()
        .max(0);
    format!("{}.{:01}s", millis / 1000, (millis % 1000) / 100)
}
