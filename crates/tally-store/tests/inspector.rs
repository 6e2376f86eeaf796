//! Store inspector integration tests
//!
//! Covers:
//! - Inspection of empty stores, empty tables and seeded wallets
//! - Unavailable stores folded into the inspection result
//! - Integrity checks: account links, owner and account lookups, orphans,
//!   balance consistency, mapped columns missing from the store

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

use tally_core::{CellValue, LogicalTable, SchemaMap};
use tally_store::inspection::inspect_path;
use tally_store::prestep::{REFERENCE_WALLET_DDL, reset_store, seed_store};
use tally_store::{IntegrityCheck, StoreInspector, TableState};

const WALLET_ROWS: &str = "
INSERT INTO usuarios (id, nombre, apellido, email, documento, tipo_documento, activo, created_at)
VALUES ('u-1', 'Juan', 'Perez', 'juan@test.com', '12345678', 'DNI', 1, '2025-01-01T10:00:00'),
       ('u-2', 'Ana', 'Diaz', 'ana@test.com', '87654321', 'DNI', 1, '2025-01-02T10:00:00');
INSERT INTO cuentas (id, numero_cuenta, saldo, moneda, activa, usuario_id, created_at)
VALUES ('c-1', '7158900319', 4500000, 'PEN', 1, 'u-1', '2025-01-01T10:05:00');
INSERT INTO transacciones (id, tipo, monto, descripcion, saldo_anterior, saldo_nuevo, fecha_transaccion, cuenta_id, created_at)
VALUES ('t-1', 'DEPOSITO', 5000000, 'inicial', 0, 5000000, '2025-01-01T10:06:00', 'c-1', '2025-01-01T10:06:00'),
       ('t-2', 'RETIRO', 500000, 'retiro', 5000000, 4500000, '2025-01-01T10:07:00', 'c-1', '2025-01-01T10:07:00');
";

async fn wallet_store(extra_sql: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(&path, REFERENCE_WALLET_DDL).await.unwrap();
    seed_store(&path, WALLET_ROWS).await.unwrap();
    if !extra_sql.is_empty() {
        seed_store(&path, extra_sql).await.unwrap();
    }
    (dir, path)
}

async fn open(path: &Path) -> StoreInspector {
    StoreInspector::open(path, SchemaMap::default()).await.unwrap()
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_without_tables_reports_every_table_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(&path, "PRAGMA user_version = 1;").await.unwrap();

    let inspection = open(&path)
        .await
        .inspect(&LogicalTable::ALL, Some(5))
        .await
        .unwrap();

    assert!(inspection.is_available());
    assert!(inspection.tables_present.is_empty());
    assert_eq!(inspection.tables.len(), 3);
    for snapshot in &inspection.tables {
        assert_eq!(snapshot.state, TableState::NotFound);
        assert_eq!(snapshot.count(), None);
        assert!(snapshot.rows().is_empty());
    }
}

#[tokio::test]
async fn empty_tables_report_zero_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(&path, REFERENCE_WALLET_DDL).await.unwrap();

    let inspection = open(&path)
        .await
        .inspect(&LogicalTable::ALL, Some(5))
        .await
        .unwrap();

    assert_eq!(
        inspection.tables_present,
        vec!["cuentas", "transacciones", "usuarios"]
    );
    for snapshot in &inspection.tables {
        assert!(snapshot.is_found());
        assert_eq!(snapshot.count(), Some(0));
        assert!(snapshot.rows().is_empty());
        assert!(!snapshot.columns().is_empty());
    }
}

#[tokio::test]
async fn sample_limit_bounds_rows_but_not_count() {
    let (_dir, path) = wallet_store("").await;
    let inspection = open(&path)
        .await
        .inspect(&[LogicalTable::Transactions], Some(1))
        .await
        .unwrap();

    let snapshot = inspection.table(LogicalTable::Transactions).unwrap();
    assert_eq!(snapshot.count(), Some(2));
    assert_eq!(snapshot.rows().len(), 1);
    // newest first
    assert_eq!(
        snapshot.rows()[0].get("id"),
        Some(&CellValue::Text("t-2".into()))
    );
}

#[tokio::test]
async fn inspection_is_idempotent() {
    let (_dir, path) = wallet_store("").await;
    let inspector = open(&path).await;
    let first = inspector.inspect(&LogicalTable::ALL, None).await.unwrap();
    let second = inspector.inspect(&LogicalTable::ALL, None).await.unwrap();
    assert_eq!(first, second);

    let reopened = open(&path).await.inspect(&LogicalTable::ALL, None).await.unwrap();
    assert_eq!(first, reopened);
}

#[tokio::test]
async fn raw_values_are_not_rounded() {
    let (_dir, path) = wallet_store(
        "INSERT INTO cuentas (id, numero_cuenta, saldo, moneda, activa, usuario_id, created_at)
         VALUES ('c-2', '7159002131', 1234.567, 'PEN', 1, 'u-2', '2025-01-03T10:00:00');",
    )
    .await;

    let inspection = open(&path)
        .await
        .inspect(&[LogicalTable::Accounts], None)
        .await
        .unwrap();
    let rows = inspection.table(LogicalTable::Accounts).unwrap().rows();
    assert_eq!(rows[0].get("saldo"), Some(&CellValue::Real(1234.567)));
}

#[tokio::test]
async fn table_names_match_case_insensitively() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(&path, "CREATE TABLE USUARIOS (id TEXT, nombre TEXT);")
        .await
        .unwrap();

    let inspection = open(&path)
        .await
        .inspect(&[LogicalTable::Users], Some(5))
        .await
        .unwrap();
    assert!(inspection.table(LogicalTable::Users).unwrap().is_found());
}

#[tokio::test]
async fn missing_store_folds_into_unavailable_inspection() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");

    let inspection = inspect_path(&path, &SchemaMap::default(), &LogicalTable::ALL, Some(5))
        .await
        .unwrap();

    assert!(!inspection.is_available());
    assert!(inspection.unavailable.is_some());
    assert_eq!(inspection.tables.len(), 3);
    assert!(inspection.tables.iter().all(|t| !t.is_found()));
}

#[tokio::test]
async fn reset_then_inspect_sees_no_store() {
    let (_dir, path) = wallet_store("").await;
    reset_store(&path).unwrap();
    let inspection = inspect_path(&path, &SchemaMap::default(), &LogicalTable::ALL, None)
        .await
        .unwrap();
    assert!(!inspection.is_available());
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consistent_wallet_is_clean() {
    let (_dir, path) = wallet_store("").await;
    let report = open(&path).await.integrity().await;

    assert!(report.is_clean(), "unexpected findings: {report:?}");
    let links = report.account_links.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].user_name, "Juan Perez");
    assert_eq!(links[0].accounts, 1);
    assert_eq!(links[1].user_name, "Ana Diaz");
    assert_eq!(links[1].accounts, 0);
}

#[tokio::test]
async fn orphans_are_reported() {
    let (_dir, path) = wallet_store(
        "INSERT INTO cuentas (id, numero_cuenta, saldo, moneda, activa, usuario_id, created_at)
         VALUES ('c-9', '7150000000', 0, 'PEN', 1, 'u-missing', '2025-01-05T10:00:00');
         INSERT INTO transacciones (id, tipo, monto, descripcion, saldo_anterior, saldo_nuevo, fecha_transaccion, cuenta_id, created_at)
         VALUES ('t-9', 'DEPOSITO', 10, NULL, 0, 10, '2025-01-05T10:00:00', 'c-missing', '2025-01-05T10:00:00');",
    )
    .await;
    let report = open(&path).await.integrity().await;

    assert!(!report.is_clean());
    assert_eq!(report.orphaned_accounts.len(), 1);
    assert_eq!(
        report.orphaned_accounts[0].owner_id,
        CellValue::Text("u-missing".into())
    );
    assert_eq!(report.orphaned_transactions.len(), 1);
    assert_eq!(
        report.orphaned_transactions[0].transaction_id,
        CellValue::Text("t-9".into())
    );
}

#[tokio::test]
async fn accounts_without_users_table_are_all_orphans() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(
        &path,
        "CREATE TABLE cuentas (id TEXT, numero_cuenta TEXT, saldo NUMERIC, usuario_id TEXT);
         INSERT INTO cuentas VALUES ('c-1', '1', 0, 'u-1');",
    )
    .await
    .unwrap();

    let report = open(&path).await.integrity().await;
    assert_eq!(report.account_links, None);
    assert_eq!(report.orphaned_accounts.len(), 1);
}

#[tokio::test]
async fn balance_mismatch_is_detected() {
    let (_dir, path) = wallet_store(
        "INSERT INTO transacciones (id, tipo, monto, descripcion, saldo_anterior, saldo_nuevo, fecha_transaccion, cuenta_id, created_at)
         VALUES ('t-3', 'RETIRO', 100, NULL, 4500000, 4500100, '2025-01-06T10:00:00', 'c-1', '2025-01-06T10:00:00'),
                ('t-4', 'CONVERSION', 1, NULL, 0, 99, '2025-01-06T10:01:00', 'c-1', '2025-01-06T10:01:00');",
    )
    .await;

    let mismatches = open(&path).await.balance_mismatches().await.unwrap();
    assert_eq!(mismatches.len(), 1, "unknown tags are skipped");
    assert_eq!(mismatches[0].transaction_id, CellValue::Text("t-3".into()));
    assert_eq!(
        mismatches[0].expected_new_balance,
        Some(rust_decimal::Decimal::from(4_499_900))
    );
}

#[tokio::test]
async fn owners_and_account_numbers_are_resolved() {
    let (_dir, path) = wallet_store(
        "INSERT INTO cuentas (id, numero_cuenta, saldo, moneda, activa, usuario_id, created_at)
         VALUES ('c-9', '7150000000', 0, 'PEN', 1, 'u-missing', '2025-01-05T10:00:00');
         INSERT INTO transacciones (id, tipo, monto, descripcion, saldo_anterior, saldo_nuevo, fecha_transaccion, cuenta_id, created_at)
         VALUES ('t-9', 'DEPOSITO', 10, NULL, 0, 10, '2025-01-05T10:00:00', 'c-missing', '2025-01-05T10:00:00');",
    )
    .await;
    let report = open(&path).await.integrity().await;

    assert_eq!(
        report.owner_of(&CellValue::Text("c-1".into())),
        Some(Some("Juan Perez"))
    );
    assert_eq!(report.owner_of(&CellValue::Text("c-9".into())), Some(None));
    assert_eq!(
        report.account_of(&CellValue::Text("t-1".into())),
        Some(Some(&CellValue::Text("7158900319".into())))
    );
    assert_eq!(report.account_of(&CellValue::Text("t-9".into())), Some(None));
    assert_eq!(report.owner_of(&CellValue::Text("c-unknown".into())), None);
}

#[tokio::test]
async fn owners_without_users_table_are_unresolved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(
        &path,
        "CREATE TABLE cuentas (id TEXT, numero_cuenta TEXT, saldo NUMERIC, usuario_id TEXT);
         INSERT INTO cuentas VALUES ('c-1', '1', 0, 'u-1');",
    )
    .await
    .unwrap();

    let report = open(&path).await.integrity().await;
    let owners = report.account_owners.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].owner_name, None);
    assert_eq!(report.transaction_accounts, None);
    assert!(report.failed_checks.is_empty(), "{:?}", report.failed_checks);
}

/// Transactions table with one column renamed away from the mapped name and
/// a row whose balances do not add up.
fn renamed_transactions_ddl(renamed: &str) -> String {
    let columns = ["id", "tipo", "monto", "saldo_anterior", "saldo_nuevo", "cuenta_id"];
    let ddl: Vec<String> = columns
        .iter()
        .map(|c| if *c == renamed { format!("{c}_renamed") } else { (*c).to_string() })
        .collect();
    format!(
        "CREATE TABLE transacciones ({cols});
         INSERT INTO transacciones VALUES ('t-1', 'DEPOSITO', 100, 0, 999, 'c-1');",
        cols = ddl.join(", ")
    )
}

#[rstest]
#[case("tipo")]
#[case("monto")]
#[case("saldo_anterior")]
#[case("saldo_nuevo")]
#[tokio::test]
async fn balance_check_fails_when_a_mapped_column_is_missing(#[case] renamed: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(&path, &renamed_transactions_ddl(renamed)).await.unwrap();
    let inspector = open(&path).await;

    let error = inspector.balance_mismatches().await.unwrap_err();
    assert!(error.to_string().contains(renamed), "{error}");

    let report = inspector.integrity().await;
    assert!(!report.is_clean());
    let failure = report.failure(IntegrityCheck::BalanceMismatches).unwrap();
    assert!(failure.reason.contains(renamed), "{}", failure.reason);
}

#[tokio::test]
async fn mismatch_is_found_with_every_column_present() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(&path, &renamed_transactions_ddl("")).await.unwrap();

    let mismatches = open(&path).await.balance_mismatches().await.unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(
        mismatches[0].expected_new_balance,
        Some(rust_decimal::Decimal::from(100))
    );
}

#[tokio::test]
async fn missing_user_column_fails_only_the_checks_that_need_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.db");
    seed_store(
        &path,
        "CREATE TABLE usuarios (id TEXT PRIMARY KEY, nombre TEXT);
         CREATE TABLE cuentas (id TEXT, numero_cuenta TEXT, saldo NUMERIC, usuario_id TEXT);
         INSERT INTO usuarios VALUES ('u-1', 'Juan');
         INSERT INTO cuentas VALUES ('c-1', '1', 0, 'u-1'), ('c-2', '2', 0, 'u-gone');",
    )
    .await
    .unwrap();
    let inspector = open(&path).await;

    let inspection = inspector.inspect(&LogicalTable::ALL, None).await.unwrap();
    assert_eq!(inspection.table(LogicalTable::Users).unwrap().count(), Some(1));

    let report = inspector.integrity().await;
    let failed: Vec<IntegrityCheck> = report.failed_checks.iter().map(|f| f.check).collect();
    assert_eq!(
        failed,
        vec![IntegrityCheck::AccountLinks, IntegrityCheck::AccountOwners]
    );
    assert!(report.failed_checks[0].reason.contains("apellido"));
    assert_eq!(report.account_links, None);
    assert_eq!(report.orphaned_accounts.len(), 1);
    assert_eq!(
        report.orphaned_accounts[0].owner_id,
        CellValue::Text("u-gone".into())
    );
}

#[tokio::test]
async fn inspection_serializes_to_json() {
    let (_dir, path) = wallet_store("").await;
    let inspection = open(&path)
        .await
        .inspect(&[LogicalTable::Users], Some(1))
        .await
        .unwrap();
    let json = serde_json::to_value(&inspection).unwrap();
    assert_eq!(json["tables"][0]["status"], "found");
    assert_eq!(json["tables"][0]["count"], 2);
    assert_eq!(json["tables"][0]["rows"][0]["nombre"], "Ana");
}
