use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use tally_config::TallyConfig;
use tally_report::render_results;
use tally_scenario::{Scenario, ScenarioResult, ScenarioRunner, Summary, collect_scenario_files};

use crate::cli::{GlobalFlags, RunArgs};
use crate::output::{output, render_options};
use crate::progress::Progress;

#[derive(Debug, Serialize)]
struct RunReport {
    summary: Summary,
    results: Vec<ScenarioResult>,
}

/// Handle `tally run`. Succeeds only when every scenario passes.
pub async fn handle(
    args: &RunArgs,
    config: TallyConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<bool> {
    let files = collect_scenario_files(&args.paths).context("failed to list scenario files")?;
    if files.is_empty() {
        anyhow::bail!("no scenario files (*.toml) found");
    }

    // Parse everything up front so a broken file fails before anything is driven.
    let scenarios = files
        .iter()
        .map(PathBuf::as_path)
        .map(Scenario::load)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(count = scenarios.len(), "scenarios loaded");

    let options = render_options(&config);
    let runner = ScenarioRunner::new(config);
    let total = scenarios.len();
    let mut results = Vec::with_capacity(total);

    for (index, scenario) in scenarios.iter().enumerate() {
        let progress = Progress::spinner(&format!("[{}/{total}] {}", index + 1, scenario.name));
        let result = runner.run(scenario).await;
        if result.passed() {
            progress.finish_ok(&format!("[{}/{total}] {} PASS", index + 1, scenario.name));
        } else {
            progress.finish_err(&format!("[{}/{total}] {} FAIL", index + 1, scenario.name));
        }
        results.push(result);
    }

    let report = RunReport {
        summary: Summary::of(&results),
        results,
    };
    output(&report, flags.format, || render_results(&report.results, &options))?;
    Ok(report.summary.all_passed())
}
