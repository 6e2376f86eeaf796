//! End-to-end runs of the bundled scenarios against the `wallet-stub` binary.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tally_config::TallyConfig;
use tally_core::{CellValue, LogicalTable};
use tally_scenario::{Scenario, ScenarioResult, ScenarioRunner, Verdict, collect_scenario_files};

fn scenarios_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

fn stub_config(dir: &Path) -> TallyConfig {
    let store = dir.join("wallet.db").to_string_lossy().into_owned();
    let mut config = TallyConfig::default();
    config.store.path.clone_from(&store);
    config.driver.program = env!("CARGO_BIN_EXE_wallet-stub").to_string();
    config.driver.args = vec![store];
    config.driver.step_delay_secs = 0.0;
    config.driver.timeout_secs = 20.0;
    config
}

fn load(file: &str) -> Scenario {
    Scenario::load(&scenarios_dir().join(file)).expect("bundled scenario should load")
}

async fn run(file: &str) -> ScenarioResult {
    let dir = TempDir::new().unwrap();
    let runner = ScenarioRunner::new(stub_config(dir.path()));
    runner.run(&load(file)).await
}

fn text(cell: Option<&CellValue>) -> String {
    cell.map(ToString::to_string).unwrap_or_default()
}

#[tokio::test]
async fn create_user_without_account() {
    let result = run("01_create_user.toml").await;

    assert_eq!(result.verdict, Verdict::Pass, "{result:#?}");
    let inspection = result.inspection.as_ref().unwrap();
    let users = inspection.table(LogicalTable::Users).unwrap();
    assert_eq!(users.count(), Some(1));
    let user = &users.rows()[0];
    assert_eq!(text(user.get("nombre")), "Juan");
    assert_eq!(text(user.get("email")), "juan@test.com");
    assert_eq!(
        inspection.table(LogicalTable::Accounts).unwrap().count(),
        Some(0)
    );
    assert!(result.drive.as_ref().unwrap().output.contains("Juan Perez"));
}

#[tokio::test]
async fn deposit_records_prior_and_new_balance() {
    let result = run("02_deposit.toml").await;

    assert_eq!(result.verdict, Verdict::Pass, "{result:#?}");
    let integrity = result.integrity.as_ref().unwrap();
    assert!(integrity.is_clean(), "{integrity:#?}");
    let output = &result.drive.as_ref().unwrap().output;
    assert!(output.contains("1,000,000.00 PEN"), "{output}");
}

#[tokio::test]
async fn withdrawal_lowers_the_balance() {
    let result = run("03_withdraw.toml").await;

    assert_eq!(result.verdict, Verdict::Pass, "{result:#?}");
    let transactions = result
        .inspection
        .as_ref()
        .unwrap()
        .table(LogicalTable::Transactions)
        .unwrap();
    assert_eq!(transactions.count(), Some(1));
    assert_eq!(text(transactions.rows()[0].get("tipo")), "RETIRO");
}

#[tokio::test]
async fn overdraft_is_refused_and_detected() {
    let mut scenario = load("03_withdraw.toml");
    scenario.script = tally_core::CommandScript::new([
        "2", "3", "7158900319", "9000000", "demasiado", "s", "0", "0",
    ]);

    let dir = TempDir::new().unwrap();
    let result = ScenarioRunner::new(stub_config(dir.path()))
        .run(&scenario)
        .await;

    assert!(!result.passed());
    assert!(result.verdict.reason().unwrap().starts_with("balance is 4,500,000.00"));
    assert!(result.drive.unwrap().output.contains("saldo insuficiente"));
}

#[tokio::test]
async fn end_of_input_exits_cleanly_mid_menu() {
    let mut scenario = load("01_create_user.toml");
    scenario.script = tally_core::CommandScript::new(["1", "1", "Juan"]);
    scenario.assertions.clear();

    let dir = TempDir::new().unwrap();
    let result = ScenarioRunner::new(stub_config(dir.path()))
        .run(&scenario)
        .await;

    assert_eq!(result.verdict, Verdict::Pass, "{result:#?}");
    assert_eq!(result.drive.unwrap().lines_sent, 3);
}

#[tokio::test]
async fn bundled_directory_runs_in_name_order() {
    let files = collect_scenario_files(&[scenarios_dir()]).unwrap();
    let scenarios: Vec<Scenario> = files.iter().map(|f| Scenario::load(f).unwrap()).collect();

    let dir = TempDir::new().unwrap();
    let results = ScenarioRunner::new(stub_config(dir.path()))
        .run_all(&scenarios)
        .await;

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["create user", "deposit", "withdraw"]);
    assert!(results.iter().all(ScenarioResult::passed), "{results:#?}");
}
