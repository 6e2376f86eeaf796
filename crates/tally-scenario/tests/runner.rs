//! Scenario runner integration tests
//!
//! Targets are POSIX `sh` snippets; the store is prepared through the
//! scenario's own setup step.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tally_config::TallyConfig;
use tally_core::{CommandScript, LogicalTable};
use tally_scenario::{
    Assertion, Check, ExitExpectation, MatchValue, Scenario, ScenarioRunner, Setup, Summary,
    Verdict,
};

const SEED: &str = "
INSERT INTO usuarios (id, nombre, apellido, email, documento, tipo_documento, activo, created_at)
VALUES ('u-1', 'Juan', 'Perez', 'juan@test.com', '12345678', 'DNI', 1, '2025-01-01T10:00:00');
INSERT INTO cuentas (id, numero_cuenta, saldo, moneda, activa, usuario_id, created_at)
VALUES ('c-1', '7158900319', 5000000.00, 'PEN', 1, 'u-1', '2025-01-01T10:05:00');
";

fn config(dir: &Path, program: &str, args: &[&str]) -> TallyConfig {
    let mut config = TallyConfig::default();
    config.store.path = dir.join("wallet.db").to_string_lossy().into_owned();
    config.driver.program = program.to_string();
    config.driver.args = args.iter().map(|a| (*a).to_string()).collect();
    config.driver.step_delay_secs = 0.0;
    config.driver.timeout_secs = 10.0;
    config
}

fn seeded(name: &str) -> Scenario {
    Scenario::new(name, CommandScript::new(["0"])).with_setup(Setup {
        reset_store: true,
        reference_schema: true,
        seed_sql: Some(SEED.to_string()),
    })
}

fn balance_is(amount: &str) -> Assertion {
    Assertion::new(
        LogicalTable::Accounts,
        Check::RowExists {
            matches: BTreeMap::from([
                ("numero_cuenta".to_string(), MatchValue::Text("7158900319".into())),
                ("saldo".to_string(), MatchValue::Text(amount.into())),
            ]),
        },
    )
}

#[tokio::test]
async fn seeded_store_passes_store_assertions() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "cat", &[]));
    let scenario = seeded("seeded")
        .assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 1 }))
        .assert(balance_is("5000000.00"))
        .assert(Assertion::new(LogicalTable::Transactions, Check::RowCount { equals: 0 }))
        .assert(Assertion::new(LogicalTable::Accounts, Check::NoOrphans))
        .assert(Assertion::new(LogicalTable::Transactions, Check::BalancesConsistent));

    let result = runner.run(&scenario).await;

    assert_eq!(result.verdict, Verdict::Pass, "{result:#?}");
    assert_eq!(result.assertions.len(), 5);
    assert!(result.assertions.iter().all(|a| a.passed));
    assert_eq!(result.drive.as_ref().unwrap().lines_sent, 1);
    assert!(result.inspection.as_ref().unwrap().is_available());
}

#[tokio::test]
async fn every_assertion_is_evaluated_and_first_failure_wins() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "cat", &[]));
    let scenario = seeded("failing")
        .assert(
            Assertion::new(LogicalTable::Users, Check::RowCount { equals: 2 })
                .describe("two users"),
        )
        .assert(balance_is("4500000.00").describe("balance after withdrawal"))
        .assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 1 }));

    let result = runner.run(&scenario).await;

    assert_eq!(
        result.verdict,
        Verdict::Fail {
            reason: "two users: expected 2 rows, observed 1 rows".into()
        }
    );
    let passed: Vec<bool> = result.assertions.iter().map(|a| a.passed).collect();
    assert_eq!(passed, vec![false, false, true]);
}

#[tokio::test]
async fn launch_failure_fails_without_inspection() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "/nonexistent/wallet-app", &[]));
    let scenario = seeded("no binary")
        .assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 1 }));

    let result = runner.run(&scenario).await;

    assert!(!result.passed());
    assert!(
        result.verdict.reason().unwrap().contains("failed to launch"),
        "{:?}",
        result.verdict
    );
    assert!(result.drive.is_none());
    assert!(result.inspection.is_none());
    assert!(result.assertions.is_empty());
}

#[tokio::test]
async fn crash_marker_fails_an_otherwise_clean_run() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(
        dir.path(),
        "sh",
        &["-c", "echo 'Exception in thread \"main\" java.lang.IllegalStateException'"],
    ));

    let result = runner.run(&seeded("crash")).await;

    assert_eq!(
        result.verdict.reason(),
        Some("crash marker 'Exception in thread' found in output")
    );
    assert_eq!(result.crash_marker.as_deref(), Some("Exception in thread"));
}

#[tokio::test]
async fn timeout_fails_unless_interruption_is_expected() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path(), "sh", &["-c", "while true; do sleep 0.05; done"]);
    config.driver.timeout_secs = 0.5;
    let runner = ScenarioRunner::new(config);

    let strict = runner.run(&seeded("hangs")).await;
    assert!(strict.verdict.reason().unwrap().starts_with("timed out"));

    let lenient = runner
        .run(&seeded("hangs, interrupted").expect(ExitExpectation::Interrupted))
        .await;
    assert_eq!(lenient.verdict, Verdict::Pass, "{lenient:#?}");
}

#[tokio::test]
async fn missing_store_satisfies_only_zero_counts() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "cat", &[]));
    let scenario = Scenario::new("empty", CommandScript::default())
        .with_setup(Setup {
            reset_store: true,
            ..Setup::default()
        })
        .assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 0 }))
        .assert(Assertion::new(LogicalTable::Accounts, Check::NoOrphans));

    let result = runner.run(&scenario).await;

    assert!(!result.inspection.as_ref().unwrap().is_available());
    assert!(result.assertions[0].passed);
    assert!(!result.assertions[1].passed);
    assert!(!result.passed());
}

#[tokio::test]
async fn scenario_env_reaches_the_target() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "sh", &["-c", "echo \"$GREETING\""]));
    let mut scenario = seeded("env");
    scenario.env.insert("GREETING".into(), "hola".into());

    let result = runner.run(&scenario).await;

    assert_eq!(result.drive.unwrap().output, "hola\n");
}

#[tokio::test]
async fn run_all_is_sequential_and_summarised() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "cat", &[]));
    let scenarios = vec![
        seeded("one").assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 1 })),
        seeded("two").assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 9 })),
    ];

    let results = runner.run_all(&scenarios).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "one");
    assert!(results[0].finished_at <= results[1].started_at);
    let summary = Summary::of(&results);
    assert_eq!((summary.passed, summary.failed), (1, 1));
    assert!(!summary.all_passed());
}

#[tokio::test]
async fn schema_drift_keeps_the_inspection_and_evaluates_every_assertion() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "cat", &[]));
    let scenario = Scenario::new("drifted schema", CommandScript::new(["0"]))
        .with_setup(Setup {
            reset_store: true,
            reference_schema: false,
            seed_sql: Some(
                "CREATE TABLE usuarios (id TEXT PRIMARY KEY, nombre TEXT);
                 CREATE TABLE cuentas (id TEXT, numero_cuenta TEXT, saldo NUMERIC, usuario_id TEXT);
                 CREATE TABLE transacciones (id TEXT, type TEXT, monto NUMERIC,
                     saldo_anterior NUMERIC, saldo_nuevo NUMERIC, cuenta_id TEXT);
                 INSERT INTO usuarios VALUES ('u-1', 'Juan');
                 INSERT INTO cuentas VALUES ('c-1', '7158900319', 999, 'u-1');
                 INSERT INTO transacciones VALUES ('t-1', 'DEPOSITO', 100, 0, 999, 'c-1');"
                    .into(),
            ),
        })
        .assert(Assertion::new(LogicalTable::Users, Check::RowCount { equals: 1 }))
        .assert(Assertion::new(LogicalTable::Accounts, Check::NoOrphans))
        .assert(Assertion::new(LogicalTable::Users, Check::NoOrphans))
        .assert(Assertion::new(LogicalTable::Transactions, Check::BalancesConsistent));

    let result = runner.run(&scenario).await;

    let inspection = result.inspection.as_ref().unwrap();
    assert_eq!(inspection.table(LogicalTable::Users).unwrap().count(), Some(1));
    let passed: Vec<bool> = result.assertions.iter().map(|a| a.passed).collect();
    assert_eq!(passed, vec![true, true, false, false]);
    assert!(result.assertions[3].observed.contains("'tipo'"), "{:?}", result.assertions[3]);
    assert!(
        result
            .verdict
            .reason()
            .unwrap()
            .starts_with("users no_orphans: expected every user with an account, observed account_links check failed"),
        "{:?}",
        result.verdict
    );
    assert!(!result.integrity.unwrap().failed_checks.is_empty());
}

#[tokio::test]
async fn unrepresentable_timeout_fails_the_scenario_instead_of_panicking() {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(config(dir.path(), "cat", &[]));
    let mut scenario = seeded("huge timeout");
    scenario.overrides.timeout_secs = Some(1e20);

    let result = runner.run(&scenario).await;

    assert!(!result.passed());
    assert!(result.verdict.reason().unwrap().contains("overrides.timeout_secs"));
    assert!(result.drive.is_none());
}
