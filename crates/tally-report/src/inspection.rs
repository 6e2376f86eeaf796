//! Tree-style store inspection report.

use std::fmt::Write as _;

use tally_core::money::format_cell_amount;
use tally_core::{CellValue, LogicalTable, Row, SchemaMap};
use tally_store::{Inspection, IntegrityCheck, IntegrityReport, TableSnapshot, TableState};

use crate::table::render_table;
use crate::{MISSING_PLACEHOLDER, NULL_PLACEHOLDER, RenderOptions};

const RULE_WIDTH: usize = 80;

/// Format one cell for display. `None` means the row has no such column.
#[must_use]
pub fn format_cell(
    schema: &SchemaMap,
    table: LogicalTable,
    column: &str,
    cell: Option<&CellValue>,
) -> String {
    let Some(cell) = cell else {
        return MISSING_PLACEHOLDER.to_string();
    };
    if cell.is_null() {
        return NULL_PLACEHOLDER.to_string();
    }
    let is_money = schema
        .money_columns(table)
        .iter()
        .any(|c| c.eq_ignore_ascii_case(column));
    if is_money && let Some(formatted) = format_cell_amount(cell) {
        return formatted;
    }
    cell.to_string()
}

const fn table_title(table: LogicalTable) -> &'static str {
    match table {
        LogicalTable::Users => "USERS",
        LogicalTable::Accounts => "ACCOUNTS",
        LogicalTable::Transactions => "TRANSACTIONS",
    }
}

/// Render an inspection, and the integrity report when one is given.
#[must_use]
pub fn render_inspection(
    inspection: &Inspection,
    integrity: Option<&IntegrityReport>,
    options: &RenderOptions,
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "STORE INSPECTION  {}", inspection.store_path.display());
    let _ = writeln!(out, "{rule}");

    match &inspection.unavailable {
        Some(reason) => {
            let _ = writeln!(out, "Store unavailable: {reason}\n");
        }
        None if inspection.tables_present.is_empty() => {
            let _ = writeln!(out, "Tables found: (none)\n");
        }
        None => {
            let _ = writeln!(out, "Tables found: {}\n", inspection.tables_present.join(", "));
        }
    }

    for snapshot in &inspection.tables {
        render_snapshot(&mut out, snapshot, integrity, options);
    }

    if let Some(report) = integrity {
        render_integrity(&mut out, report, options);
    }

    let _ = write!(out, "{rule}");
    out
}

fn render_snapshot(
    out: &mut String,
    snapshot: &TableSnapshot,
    integrity: Option<&IntegrityReport>,
    options: &RenderOptions,
) {
    let title = table_title(snapshot.table);
    let (count, columns, rows) = match &snapshot.state {
        TableState::Found {
            count,
            columns,
            rows,
        } => (count, columns, rows),
        TableState::NotFound => {
            let _ = writeln!(out, "✗ {title} ({}) not found\n", snapshot.physical_name);
            return;
        }
        TableState::Unreadable { reason } => {
            let _ = writeln!(
                out,
                "✗ {title} ({}) unreadable: {reason}\n",
                snapshot.physical_name
            );
            return;
        }
    };

    let _ = writeln!(out, "{title} ({})", snapshot.physical_name);
    let _ = writeln!(out, "   Total: {count}");
    if rows.is_empty() {
        let _ = writeln!(out, "   (no rows)\n");
        return;
    }

    let shown = rows.len().min(options.row_limit);
    for row in &rows[..shown] {
        render_row(out, snapshot.table, columns, row, &options.schema);
        if let Some(report) = integrity {
            render_linked(out, snapshot.table, row, report, &options.schema);
        }
        out.push('\n');
    }
    if u64::try_from(shown).unwrap_or(u64::MAX) < *count {
        let _ = writeln!(out, "   (showing {shown} of {count})\n");
    }
}

fn render_row(
    out: &mut String,
    table: LogicalTable,
    columns: &[String],
    row: &Row,
    schema: &SchemaMap,
) {
    let names: Vec<&str> = if columns.is_empty() {
        row.columns().collect()
    } else {
        columns.iter().map(String::as_str).collect()
    };
    for (idx, column) in names.iter().enumerate() {
        let value = format_cell(schema, table, column, row.get(column));
        let branch = if idx == 0 { "├─" } else { "│ " };
        let _ = writeln!(out, "   {branch} {column}: {value}");
    }
}

/// Owner of an account row, or account number of a transaction row, when
/// the integrity pass resolved the relation.
fn render_linked(
    out: &mut String,
    table: LogicalTable,
    row: &Row,
    report: &IntegrityReport,
    schema: &SchemaMap,
) {
    match table {
        LogicalTable::Users => {}
        LogicalTable::Accounts => {
            let owner = row
                .get(&schema.accounts.id)
                .and_then(|id| report.owner_of(id));
            if let Some(owner) = owner {
                let name = owner.filter(|n| !n.is_empty()).unwrap_or(NULL_PLACEHOLDER);
                let _ = writeln!(out, "   │  owner: {name}");
            }
        }
        LogicalTable::Transactions => {
            let account = row
                .get(&schema.transactions.id)
                .and_then(|id| report.account_of(id));
            if let Some(number) = account {
                let number = number.map_or_else(|| NULL_PLACEHOLDER.to_string(), display_or_na);
                let _ = writeln!(out, "   │  account number: {number}");
            }
        }
    }
}

fn render_integrity(out: &mut String, report: &IntegrityReport, options: &RenderOptions) {
    let _ = writeln!(out, "INTEGRITY");

    for failed in &report.failed_checks {
        let _ = writeln!(out, "   Check failed: {} ({})", failed.check, failed.reason);
    }

    match &report.account_links {
        Some(links) if links.is_empty() => {
            let _ = writeln!(out, "   Accounts per user: (no users)");
        }
        Some(links) => {
            let rows: Vec<Vec<String>> = links
                .iter()
                .map(|link| {
                    vec![
                        display_or_na(&link.user_id),
                        if link.user_name.is_empty() {
                            NULL_PLACEHOLDER.to_string()
                        } else {
                            link.user_name.clone()
                        },
                        link.accounts.to_string(),
                    ]
                })
                .collect();
            let _ = writeln!(out, "   Accounts per user:");
            let table = render_table(&["user_id", "user", "accounts"], &rows, options.table);
            for line in table.lines() {
                let _ = writeln!(out, "   {line}");
            }
        }
        None if report.failure(IntegrityCheck::AccountLinks).is_some() => {
            let _ = writeln!(out, "   Accounts per user: N/A (check failed)");
        }
        None => {
            let _ = writeln!(out, "   Accounts per user: N/A (users or accounts table missing)");
        }
    }

    if report.failure(IntegrityCheck::OrphanedAccounts).is_some() {
        let _ = writeln!(out, "   Orphaned accounts: N/A (check failed)");
    } else if report.orphaned_accounts.is_empty() {
        let _ = writeln!(out, "   Orphaned accounts: none");
    } else {
        let _ = writeln!(out, "   Orphaned accounts: {}", report.orphaned_accounts.len());
        for orphan in &report.orphaned_accounts {
            let _ = writeln!(
                out,
                "   ├─ {} (number {}) -> missing user {}",
                display_or_na(&orphan.account_id),
                display_or_na(&orphan.account_number),
                display_or_na(&orphan.owner_id)
            );
        }
    }

    if report.failure(IntegrityCheck::OrphanedTransactions).is_some() {
        let _ = writeln!(out, "   Orphaned transactions: N/A (check failed)");
    } else if report.orphaned_transactions.is_empty() {
        let _ = writeln!(out, "   Orphaned transactions: none");
    } else {
        let _ = writeln!(
            out,
            "   Orphaned transactions: {}",
            report.orphaned_transactions.len()
        );
        for orphan in &report.orphaned_transactions {
            let _ = writeln!(
                out,
                "   ├─ {} -> missing account {}",
                display_or_na(&orphan.transaction_id),
                display_or_na(&orphan.account_id)
            );
        }
    }

    if report.failure(IntegrityCheck::BalanceMismatches).is_some() {
        let _ = writeln!(out, "   Balance mismatches: N/A (check failed)");
    } else if report.balance_mismatches.is_empty() {
        let _ = writeln!(out, "   Balance mismatches: none");
    } else {
        let _ = writeln!(
            out,
            "   Balance mismatches: {}",
            report.balance_mismatches.len()
        );
        for mismatch in &report.balance_mismatches {
            let _ = writeln!(
                out,
                "   ├─ {} {}: {}",
                display_or_na(&mismatch.transaction_id),
                mismatch.kind,
                mismatch.reason
            );
        }
    }
    out.push('\n');
}

fn display_or_na(cell: &CellValue) -> String {
    if cell.is_null() {
        NULL_PLACEHOLDER.to_string()
    } else {
        cell.to_string()
    }
}
