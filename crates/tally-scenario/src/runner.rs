//! Sequential scenario execution: pre-step, drive, inspect, evaluate.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tally_config::TallyConfig;
use tally_core::{LogicalTable, SchemaMap};
use tally_driver::{DriveOutcome, DriveRequest, Driver, Termination};
use tally_store::error::StoreError;
use tally_store::prestep::{REFERENCE_WALLET_DDL, reset_store, seed_store};
use tally_store::{Inspection, IntegrityReport, StoreInspector};
use tracing::Instrument;

use crate::assertion::{AssertionOutcome, evaluate};
use crate::model::{ExitExpectation, Scenario, Setup};
use crate::result::{ScenarioResult, Verdict};

pub struct ScenarioRunner {
    config: TallyConfig,
    driver: Driver,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(config: TallyConfig) -> Self {
        Self {
            config,
            driver: Driver::new(),
        }
    }

    #[must_use]
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &TallyConfig {
        &self.config
    }

    /// Run every scenario, one after another. Failures never stop the batch.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run(scenario).await);
        }
        results
    }

    /// Run one scenario. Every failure mode ends up in the verdict.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioResult {
        let span = tracing::info_span!("scenario", name = %scenario.name);
        self.run_inner(scenario).instrument(span).await
    }

    async fn run_inner(&self, scenario: &Scenario) -> ScenarioResult {
        let mut result = ScenarioResult {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            expect_exit: scenario.expect_exit,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            drive: None,
            crash_marker: None,
            inspection: None,
            integrity: None,
            assertions: Vec::new(),
            verdict: Verdict::Pass,
        };

        if let Err(e) = scenario.validate() {
            return finish(result, Some(e.to_string()));
        }

        let driver_config = scenario.driver_config(&self.config.driver);
        if !driver_config.is_configured() {
            return finish(result, Some("no program configured to drive".into()));
        }

        let store_path = self.config.store_path();
        if let Err(e) = apply_setup(&scenario.setup, &store_path).await {
            return finish(result, Some(format!("setup failed: {e}")));
        }

        let mut request = DriveRequest::from_config(&driver_config, scenario.script.clone());
        request.env = scenario
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let outcome = match self.driver.run(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "launch failed");
                return finish(result, Some(e.to_string()));
            }
        };
        result.crash_marker = outcome
            .find_marker(&driver_config.crash_markers)
            .map(str::to_string);

        let (inspection, integrity) = inspect_all(&store_path, &self.config.store.schema).await;
        result.assertions = scenario
            .assertions
            .iter()
            .map(|a| evaluate(a, &inspection, integrity.as_ref()))
            .collect();
        result.inspection = Some(inspection);
        result.integrity = integrity;
        let failure = first_failure(
            scenario.expect_exit,
            &outcome,
            result.crash_marker.as_deref(),
            &result.assertions,
        );

        result.drive = Some(outcome);
        finish(result, failure)
    }
}

fn finish(mut result: ScenarioResult, failure: Option<String>) -> ScenarioResult {
    result.finished_at = Utc::now();
    result.verdict = match failure {
        None => Verdict::Pass,
        Some(reason) => Verdict::Fail { reason },
    };
    tracing::info!(
        verdict = %result.verdict,
        reason = result.verdict.reason().unwrap_or_default(),
        failed_assertions = result.failed_assertions(),
        "scenario finished"
    );
    result
}

async fn apply_setup(setup: &Setup, store_path: &Path) -> Result<(), StoreError> {
    if setup.reset_store {
        reset_store(store_path)?;
    }
    if setup.reference_schema {
        seed_store(store_path, REFERENCE_WALLET_DDL).await?;
    }
    if let Some(sql) = &setup.seed_sql {
        seed_store(store_path, sql).await?;
    }
    Ok(())
}

/// Inspect every logical table with all rows loaded, plus integrity when
/// the store could be opened. Failures end up in the inspection itself.
async fn inspect_all(path: &Path, schema: &SchemaMap) -> (Inspection, Option<IntegrityReport>) {
    let inspector = match StoreInspector::open(path, schema.clone()).await {
        Ok(inspector) => inspector,
        Err(e) => {
            let reason = match e {
                StoreError::Unavailable { reason, .. } => reason,
                other => other.to_string(),
            };
            tracing::warn!(path = %path.display(), %reason, "store unavailable after run");
            return (
                Inspection::unavailable(path, schema, &LogicalTable::ALL, reason),
                None,
            );
        }
    };

    let inspection = match inspector.inspect(&LogicalTable::ALL, None).await {
        Ok(inspection) => inspection,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "store inspection failed");
            Inspection::unavailable(path, schema, &LogicalTable::ALL, e.to_string())
        }
    };
    let integrity = inspector.integrity().await;
    (inspection, Some(integrity))
}

/// Termination against expectation, then crash markers, then the first
/// failing assertion.
fn first_failure(
    expect: ExitExpectation,
    outcome: &DriveOutcome,
    crash_marker: Option<&str>,
    assertions: &[AssertionOutcome],
) -> Option<String> {
    if let Some(reason) = termination_failure(expect, outcome) {
        return Some(reason);
    }
    if let Some(marker) = crash_marker {
        return Some(format!("crash marker '{marker}' found in output"));
    }
    assertions
        .iter()
        .find(|a| !a.passed)
        .map(AssertionOutcome::failure_reason)
}

fn termination_failure(expect: ExitExpectation, outcome: &DriveOutcome) -> Option<String> {
    let termination = outcome.termination;
    let timed_out = || {
        format!(
            "timed out after {:.1}s ({} lines sent)",
            outcome.elapsed.as_secs_f64(),
            outcome.lines_sent
        )
    };
    match (expect, termination) {
        (ExitExpectation::Clean, Termination::Exited { code: Some(0) })
        | (ExitExpectation::AnyExit, Termination::Exited { .. })
        | (ExitExpectation::Interrupted, Termination::TimedOut)
        | (ExitExpectation::Interrupted, Termination::Exited { code: Some(0) }) => None,
        (ExitExpectation::Clean | ExitExpectation::AnyExit, Termination::TimedOut) => {
            Some(timed_out())
        }
        (_, Termination::Exited { .. }) => Some(format!("unexpected exit: {termination}")),
    }
}

/// Resolve scenario paths given on the command line; directories expand to
/// their `*.toml` files in name order.
///
/// # Errors
///
/// Returns the I/O error of an unreadable directory.
pub fn collect_scenario_files(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}
