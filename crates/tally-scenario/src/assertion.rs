//! Assertions over the post-run store and their evaluation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use tally_core::{CellValue, LogicalTable, Row};
use tally_store::{Inspection, IntegrityCheck, IntegrityReport, TableSnapshot, TableState};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One check against one logical table.
#[derive(Debug, Clone, Deserialize)]
pub struct Assertion {
    pub table: LogicalTable,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub check: Check,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    RowCount {
        equals: u64,
    },
    /// At least one row matches every column/value pair.
    RowExists {
        matches: BTreeMap<String, MatchValue>,
    },
    /// No row matches every column/value pair.
    NoRowMatches {
        matches: BTreeMap<String, MatchValue>,
    },
    NoOrphans,
    BalancesConsistent,
    #[serde(skip)]
    Custom(CustomCheck),
}

/// Expected value for a column in a row match.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MatchValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

type Predicate = dyn Fn(&TableSnapshot) -> Result<(), String> + Send + Sync;

/// A predicate supplied from Rust code. `Err` carries the observed value.
#[derive(Clone)]
pub struct CustomCheck {
    name: String,
    predicate: Arc<Predicate>,
}

impl CustomCheck {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&TableSnapshot) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Assertion {
    #[must_use]
    pub const fn new(table: LogicalTable, check: Check) -> Self {
        Self {
            table,
            description: None,
            check,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The description, or one derived from the check.
    #[must_use]
    pub fn label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.table, self.check))
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowCount { equals } => write!(f, "row_count == {equals}"),
            Self::RowExists { matches } => write!(f, "row_exists {}", format_matches(matches)),
            Self::NoRowMatches { matches } => {
                write!(f, "no_row_matches {}", format_matches(matches))
            }
            Self::NoOrphans => f.write_str("no_orphans"),
            Self::BalancesConsistent => f.write_str("balances_consistent"),
            Self::Custom(custom) => write!(f, "custom '{}'", custom.name),
        }
    }
}

impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

fn format_matches(matches: &BTreeMap<String, MatchValue>) -> String {
    let pairs: Vec<String> = matches.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", pairs.join(", "))
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

impl MatchValue {
    /// Text compares exactly against text cells, falling back to an exact
    /// decimal comparison when both sides are numbers. Anything numeric
    /// compares as an exact decimal, so `0` matches `0.00`. Booleans match
    /// `1`/`0`.
    #[must_use]
    pub fn matches(&self, cell: &CellValue) -> bool {
        match self {
            Self::Bool(expected) => cell.as_bool() == Some(*expected),
            Self::Integer(expected) => cell.as_decimal() == Some(Decimal::from(*expected)),
            Self::Float(expected) => {
                Decimal::from_f64(*expected).is_some_and(|d| cell.as_decimal() == Some(d))
            }
            Self::Text(expected) => match cell {
                CellValue::Text(actual) => {
                    actual == expected
                        || Decimal::from_str(expected.trim())
                            .is_ok_and(|d| cell.as_decimal() == Some(d))
                }
                CellValue::Integer(_) | CellValue::Real(_) => Decimal::from_str(expected.trim())
                    .is_ok_and(|d| cell.as_decimal() == Some(d)),
                CellValue::Null | CellValue::Blob(_) => false,
            },
        }
    }
}

fn row_matches(row: &Row, matches: &BTreeMap<String, MatchValue>) -> bool {
    matches
        .iter()
        .all(|(column, expected)| row.get(column).is_some_and(|cell| expected.matches(cell)))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionOutcome {
    pub table: LogicalTable,
    pub description: String,
    pub passed: bool,
    pub expected: String,
    pub observed: String,
}

impl AssertionOutcome {
    /// One-line failure summary: description, expected vs observed.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        format!(
            "{}: expected {}, observed {}",
            self.description, self.expected, self.observed
        )
    }
}

/// Evaluate `assertion` against a post-run inspection (all rows loaded) and
/// the integrity report, when the store was available.
#[must_use]
pub fn evaluate(
    assertion: &Assertion,
    inspection: &Inspection,
    integrity: Option<&IntegrityReport>,
) -> AssertionOutcome {
    let description = assertion.label();
    let (passed, expected, observed) = match inspection.table(assertion.table) {
        Some(snapshot) if snapshot.is_found() => {
            check_snapshot(assertion.table, &assertion.check, snapshot, integrity)
        }
        snapshot => check_missing_table(&assertion.check, inspection, snapshot),
    };

    if !passed {
        tracing::debug!(%description, %expected, %observed, "assertion failed");
    }
    AssertionOutcome {
        table: assertion.table,
        description,
        passed,
        expected,
        observed,
    }
}

/// A missing table (or store) satisfies only `row_count == 0`. An unreadable
/// table satisfies nothing.
fn check_missing_table(
    check: &Check,
    inspection: &Inspection,
    snapshot: Option<&TableSnapshot>,
) -> (bool, String, String) {
    if let Some(TableSnapshot {
        state: TableState::Unreadable { reason },
        ..
    }) = snapshot
    {
        return (false, check.to_string(), format!("table unreadable ({reason})"));
    }
    let observed = inspection.unavailable.as_ref().map_or_else(
        || "table not found".to_string(),
        |reason| format!("store unavailable ({reason})"),
    );
    match check {
        Check::RowCount { equals: 0 } => (true, "0 rows".into(), observed),
        Check::RowCount { equals } => (false, format!("{equals} rows"), observed),
        other => (false, other.to_string(), observed),
    }
}

fn check_snapshot(
    table: LogicalTable,
    check: &Check,
    snapshot: &TableSnapshot,
    integrity: Option<&IntegrityReport>,
) -> (bool, String, String) {
    let count = snapshot.count().unwrap_or_default();
    match check {
        Check::RowCount { equals } => (
            count == *equals,
            format!("{equals} rows"),
            format!("{count} rows"),
        ),
        Check::RowExists { matches } => {
            let found = snapshot.rows().iter().filter(|r| row_matches(r, matches)).count();
            (
                found > 0,
                format!("a row with {}", format_matches(matches)),
                format!("{found} matching of {count} rows"),
            )
        }
        Check::NoRowMatches { matches } => {
            let found = snapshot.rows().iter().filter(|r| row_matches(r, matches)).count();
            (
                found == 0,
                format!("no row with {}", format_matches(matches)),
                format!("{found} matching of {count} rows"),
            )
        }
        Check::NoOrphans => check_orphans(table, integrity),
        Check::BalancesConsistent => check_balances(table, integrity),
        Check::Custom(custom) => match (custom.predicate)(snapshot) {
            Ok(()) => (true, custom.name.clone(), "satisfied".into()),
            Err(observed) => (false, custom.name.clone(), observed),
        },
    }
}

/// The observed value when `check` could not run.
fn check_failure(report: &IntegrityReport, check: IntegrityCheck) -> Option<String> {
    report
        .failure(check)
        .map(|f| format!("{check} check failed ({})", f.reason))
}

/// Accounts and transactions: no row references a missing parent. Users:
/// every user owns at least one account.
fn check_orphans(
    table: LogicalTable,
    integrity: Option<&IntegrityReport>,
) -> (bool, String, String) {
    let Some(report) = integrity else {
        return (false, "no orphans".into(), "integrity report unavailable".into());
    };
    match table {
        LogicalTable::Accounts => {
            let expected = "no orphaned accounts".to_string();
            if let Some(observed) = check_failure(report, IntegrityCheck::OrphanedAccounts) {
                return (false, expected, observed);
            }
            let n = report.orphaned_accounts.len();
            (n == 0, expected, format!("{n} orphaned"))
        }
        LogicalTable::Transactions => {
            let expected = "no orphaned transactions".to_string();
            if let Some(observed) = check_failure(report, IntegrityCheck::OrphanedTransactions) {
                return (false, expected, observed);
            }
            let n = report.orphaned_transactions.len();
            (n == 0, expected, format!("{n} orphaned"))
        }
        LogicalTable::Users => {
            let expected = "every user with an account".to_string();
            if let Some(observed) = check_failure(report, IntegrityCheck::AccountLinks) {
                return (false, expected, observed);
            }
            match &report.account_links {
                Some(links) => {
                    let without: Vec<String> = links
                        .iter()
                        .filter(|link| link.accounts == 0)
                        .map(|link| link.user_id.to_string())
                        .collect();
                    let observed = if without.is_empty() {
                        "0 users without accounts".to_string()
                    } else {
                        format!(
                            "{} users without accounts ({})",
                            without.len(),
                            without.join(", ")
                        )
                    };
                    (without.is_empty(), expected, observed)
                }
                None => (false, expected, "accounts table not found".into()),
            }
        }
    }
}

fn check_balances(
    table: LogicalTable,
    integrity: Option<&IntegrityReport>,
) -> (bool, String, String) {
    if table != LogicalTable::Transactions {
        return (
            false,
            "balances_consistent on transactions".into(),
            format!("applied to {table}"),
        );
    }
    let Some(report) = integrity else {
        return (
            false,
            "consistent balances".into(),
            "integrity report unavailable".into(),
        );
    };
    if let Some(observed) = check_failure(report, IntegrityCheck::BalanceMismatches) {
        return (false, "0 mismatches".into(), observed);
    }
    let mismatches = &report.balance_mismatches;
    let observed = mismatches.first().map_or_else(
        || "0 mismatches".to_string(),
        |first| {
            format!(
                "{} mismatches, first {} ({})",
                mismatches.len(),
                first.transaction_id,
                first.reason
            )
        },
    );
    (mismatches.is_empty(), "0 mismatches".into(), observed)
}
