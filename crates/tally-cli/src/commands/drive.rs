use anyhow::Context;
use serde::Serialize;
use tally_config::TallyConfig;
use tally_core::CommandScript;
use tally_driver::{DriveOutcome, DriveRequest, Driver};
use tally_report::render_drive;

use crate::cli::{DriveArgs, GlobalFlags};
use crate::output::output;
use crate::progress::Progress;

#[derive(Debug, Serialize)]
struct DriveReport<'a> {
    program: &'a str,
    #[serde(flatten)]
    outcome: DriveOutcome,
    crash_marker: Option<String>,
}

/// Handle `tally drive`. Succeeds only when the program exits with code 0.
pub async fn handle(
    args: &DriveArgs,
    config: &TallyConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<bool> {
    let text = tokio::fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("failed to read script '{}'", args.script.display()))?;
    let script = CommandScript::parse(&text);

    let Some((program, program_args)) = args.command.split_first() else {
        anyhow::bail!("no program given after `--`");
    };
    let mut driver_config = config.driver.clone();
    driver_config.program.clone_from(program);
    driver_config.args = program_args.to_vec();
    let request = DriveRequest::from_config(&driver_config, script);

    let progress = Progress::spinner(&format!("driving {program}"));
    let outcome = Driver::new().run(&request).await;
    progress.finish_clear();
    let outcome = outcome?;

    let report = DriveReport {
        program,
        crash_marker: outcome
            .find_marker(&config.driver.crash_markers)
            .map(str::to_string),
        outcome,
    };
    output(&report, flags.format, || {
        render_drive(&report.outcome, report.crash_marker.as_deref())
    })?;
    Ok(report.outcome.termination.exit_code() == Some(0))
}
