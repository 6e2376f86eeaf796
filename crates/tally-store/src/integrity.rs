//! Derived integrity checks over the inspected store.
//!
//! These verify relations the driven application is supposed to maintain;
//! they never repair anything. A check that cannot run (a mapped column is
//! missing, a query fails) is recorded in the report and the others still run.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::{BalanceEffect, CellValue, LogicalTable, TransactionKind};

use crate::error::StoreError;
use crate::helpers::{cell_from_value, ident};
use crate::StoreInspector;

/// Number of accounts linked to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountLink {
    pub user_id: CellValue,
    pub user_name: String,
    pub accounts: u64,
}

/// The owner of one account, resolved through the users table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountOwner {
    pub account_id: CellValue,
    pub owner_id: CellValue,
    /// `None` when no user matches `owner_id`.
    pub owner_name: Option<String>,
}

/// The account number behind one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionAccount {
    pub transaction_id: CellValue,
    pub account_id: CellValue,
    /// `None` when no account matches `account_id`.
    pub account_number: Option<CellValue>,
}

/// An account whose owner reference matches no user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanAccount {
    pub account_id: CellValue,
    pub account_number: CellValue,
    pub owner_id: CellValue,
}

/// A transaction whose account reference matches no account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanTransaction {
    pub transaction_id: CellValue,
    pub account_id: CellValue,
}

/// A transaction whose balances do not follow `new = prior ± amount`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceMismatch {
    pub transaction_id: CellValue,
    pub kind: String,
    pub amount: CellValue,
    pub prior_balance: CellValue,
    pub new_balance: CellValue,
    pub expected_new_balance: Option<Decimal>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityCheck {
    AccountLinks,
    AccountOwners,
    TransactionAccounts,
    OrphanedAccounts,
    OrphanedTransactions,
    BalanceMismatches,
}

impl IntegrityCheck {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountLinks => "account_links",
            Self::AccountOwners => "account_owners",
            Self::TransactionAccounts => "transaction_accounts",
            Self::OrphanedAccounts => "orphaned_accounts",
            Self::OrphanedTransactions => "orphaned_transactions",
            Self::BalanceMismatches => "balance_mismatches",
        }
    }
}

impl fmt::Display for IntegrityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check that could not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCheck {
    pub check: IntegrityCheck,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    /// `None` when the users or accounts table does not exist.
    pub account_links: Option<Vec<AccountLink>>,
    /// `None` when the accounts table does not exist.
    pub account_owners: Option<Vec<AccountOwner>>,
    /// `None` when the transactions table does not exist.
    pub transaction_accounts: Option<Vec<TransactionAccount>>,
    pub orphaned_accounts: Vec<OrphanAccount>,
    pub orphaned_transactions: Vec<OrphanTransaction>,
    pub balance_mismatches: Vec<BalanceMismatch>,
    pub failed_checks: Vec<FailedCheck>,
}

impl IntegrityReport {
    /// No findings, and every check ran.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.orphaned_accounts.is_empty()
            && self.orphaned_transactions.is_empty()
            && self.balance_mismatches.is_empty()
            && self.failed_checks.is_empty()
    }

    #[must_use]
    pub fn failure(&self, check: IntegrityCheck) -> Option<&FailedCheck> {
        self.failed_checks.iter().find(|f| f.check == check)
    }

    /// Owner name of the account with id `account_id`. The outer `None`
    /// means the owner lookup did not run or the account is unknown.
    #[must_use]
    pub fn owner_of(&self, account_id: &CellValue) -> Option<Option<&str>> {
        self.account_owners
            .as_ref()?
            .iter()
            .find(|o| &o.account_id == account_id)
            .map(|o| o.owner_name.as_deref())
    }

    /// Account number behind the transaction with id `transaction_id`.
    #[must_use]
    pub fn account_of(&self, transaction_id: &CellValue) -> Option<Option<&CellValue>> {
        self.transaction_accounts
            .as_ref()?
            .iter()
            .find(|t| &t.transaction_id == transaction_id)
            .map(|t| t.account_number.as_ref())
    }
}

/// Keep the value of a successful check; record a failed one.
fn settle<T>(
    failed: &mut Vec<FailedCheck>,
    check: IntegrityCheck,
    result: Result<T, StoreError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(%check, error = %e, "integrity check failed");
            failed.push(FailedCheck {
                check,
                reason: e.to_string(),
            });
            None
        }
    }
}

fn user_name(given: Option<String>, family: Option<String>) -> String {
    format!(
        "{} {}",
        given.unwrap_or_default(),
        family.unwrap_or_default()
    )
    .trim()
    .to_string()
}

impl StoreInspector {
    /// Run every integrity check. Checks that fail are listed in
    /// [`IntegrityReport::failed_checks`] instead of aborting the report.
    pub async fn integrity(&self) -> IntegrityReport {
        let mut failed = Vec::new();
        let account_links = settle(
            &mut failed,
            IntegrityCheck::AccountLinks,
            self.account_links().await,
        );
        let account_owners = settle(
            &mut failed,
            IntegrityCheck::AccountOwners,
            self.account_owners().await,
        );
        let transaction_accounts = settle(
            &mut failed,
            IntegrityCheck::TransactionAccounts,
            self.transaction_accounts().await,
        );
        let orphaned_accounts = settle(
            &mut failed,
            IntegrityCheck::OrphanedAccounts,
            self.orphaned_accounts().await,
        );
        let orphaned_transactions = settle(
            &mut failed,
            IntegrityCheck::OrphanedTransactions,
            self.orphaned_transactions().await,
        );
        let balance_mismatches = settle(
            &mut failed,
            IntegrityCheck::BalanceMismatches,
            self.balance_mismatches().await,
        );

        IntegrityReport {
            account_links: account_links.flatten(),
            account_owners: account_owners.flatten(),
            transaction_accounts: transaction_accounts.flatten(),
            orphaned_accounts: orphaned_accounts.unwrap_or_default(),
            orphaned_transactions: orphaned_transactions.unwrap_or_default(),
            balance_mismatches: balance_mismatches.unwrap_or_default(),
            failed_checks: failed,
        }
    }

    /// Fail unless every mapped column exists in `table`.
    async fn require_columns(
        &self,
        table: LogicalTable,
        columns: &[(&str, &String)],
    ) -> Result<(), StoreError> {
        let physical = self.schema().table_name(table);
        let present = self.table_columns(&ident("table", physical)?).await?;
        if let Some((field, column)) = columns
            .iter()
            .find(|(_, column)| !present.iter().any(|p| p.eq_ignore_ascii_case(column)))
        {
            return Err(StoreError::MissingColumn {
                table: physical.to_string(),
                field: (*field).to_string(),
                column: (*column).to_string(),
            });
        }
        Ok(())
    }

    /// Accounts per user (outer join, so users without accounts count 0).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingColumn` if a mapped column is absent, or
    /// the query error.
    pub async fn account_links(&self) -> Result<Option<Vec<AccountLink>>, StoreError> {
        if !self.has_table(LogicalTable::Users).await?
            || !self.has_table(LogicalTable::Accounts).await?
        {
            return Ok(None);
        }

        let u = &self.schema().users;
        let a = &self.schema().accounts;
        self.require_columns(
            LogicalTable::Users,
            &[
                ("users.id", &u.id),
                ("users.given_name", &u.given_name),
                ("users.family_name", &u.family_name),
            ],
        )
        .await?;
        self.require_columns(
            LogicalTable::Accounts,
            &[("accounts.id", &a.id), ("accounts.owner", &a.owner)],
        )
        .await?;

        let sql = format!(
            "SELECT u.{uid}, u.{given}, u.{family}, COUNT(a.{aid}) \
             FROM {users} u LEFT JOIN {accounts} a ON a.{owner} = u.{uid} \
             GROUP BY u.{uid} ORDER BY u.rowid",
            uid = ident("users.id", &u.id)?,
            given = ident("users.given_name", &u.given_name)?,
            family = ident("users.family_name", &u.family_name)?,
            aid = ident("accounts.id", &a.id)?,
            users = ident("users.table", &u.table)?,
            accounts = ident("accounts.table", &a.table)?,
            owner = ident("accounts.owner", &a.owner)?,
        );

        let mut rows = self.conn().query(&sql, ()).await?;
        let mut links = Vec::new();
        while let Some(row) = rows.next().await? {
            let accounts = row.get::<i64>(3)?;
            links.push(AccountLink {
                user_id: cell_from_value(row.get_value(0)?),
                user_name: user_name(row.get::<Option<String>>(1)?, row.get::<Option<String>>(2)?),
                accounts: u64::try_from(accounts).unwrap_or_default(),
            });
        }
        Ok(Some(links))
    }

    /// Owner name per account, newest account last. Without a users table
    /// no owner resolves.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingColumn` if a mapped column is absent, or
    /// the query error.
    pub async fn account_owners(&self) -> Result<Option<Vec<AccountOwner>>, StoreError> {
        if !self.has_table(LogicalTable::Accounts).await? {
            return Ok(None);
        }

        let u = &self.schema().users;
        let a = &self.schema().accounts;
        self.require_columns(
            LogicalTable::Accounts,
            &[("accounts.id", &a.id), ("accounts.owner", &a.owner)],
        )
        .await?;
        let aid = ident("accounts.id", &a.id)?;
        let owner = ident("accounts.owner", &a.owner)?;
        let accounts = ident("accounts.table", &a.table)?;

        let sql = if self.has_table(LogicalTable::Users).await? {
            self.require_columns(
                LogicalTable::Users,
                &[
                    ("users.id", &u.id),
                    ("users.given_name", &u.given_name),
                    ("users.family_name", &u.family_name),
                ],
            )
            .await?;
            format!(
                "SELECT a.{aid}, a.{owner}, u.{uid} IS NOT NULL, u.{given}, u.{family} \
                 FROM {accounts} a LEFT JOIN {users} u ON u.{uid} = a.{owner} \
                 ORDER BY a.rowid",
                users = ident("users.table", &u.table)?,
                uid = ident("users.id", &u.id)?,
                given = ident("users.given_name", &u.given_name)?,
                family = ident("users.family_name", &u.family_name)?,
            )
        } else {
            format!("SELECT a.{aid}, a.{owner}, 0, NULL, NULL FROM {accounts} a ORDER BY a.rowid")
        };

        let mut rows = self.conn().query(&sql, ()).await?;
        let mut owners = Vec::new();
        while let Some(row) = rows.next().await? {
            let matched = row.get::<i64>(2)? != 0;
            owners.push(AccountOwner {
                account_id: cell_from_value(row.get_value(0)?),
                owner_id: cell_from_value(row.get_value(1)?),
                owner_name: if matched {
                    Some(user_name(
                        row.get::<Option<String>>(3)?,
                        row.get::<Option<String>>(4)?,
                    ))
                } else {
                    None
                },
            });
        }
        Ok(Some(owners))
    }

    /// Account number per transaction. Without an accounts table no number
    /// resolves.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingColumn` if a mapped column is absent, or
    /// the query error.
    pub async fn transaction_accounts(
        &self,
    ) -> Result<Option<Vec<TransactionAccount>>, StoreError> {
        if !self.has_table(LogicalTable::Transactions).await? {
            return Ok(None);
        }

        let a = &self.schema().accounts;
        let t = &self.schema().transactions;
        self.require_columns(
            LogicalTable::Transactions,
            &[("transactions.id", &t.id), ("transactions.account", &t.account)],
        )
        .await?;
        let tid = ident("transactions.id", &t.id)?;
        let account = ident("transactions.account", &t.account)?;
        let transactions = ident("transactions.table", &t.table)?;

        let sql = if self.has_table(LogicalTable::Accounts).await? {
            self.require_columns(
                LogicalTable::Accounts,
                &[("accounts.id", &a.id), ("accounts.number", &a.number)],
            )
            .await?;
            format!(
                "SELECT t.{tid}, t.{account}, a.{aid} IS NOT NULL, a.{number} \
                 FROM {transactions} t LEFT JOIN {accounts} a ON a.{aid} = t.{account} \
                 ORDER BY t.rowid",
                accounts = ident("accounts.table", &a.table)?,
                aid = ident("accounts.id", &a.id)?,
                number = ident("accounts.number", &a.number)?,
            )
        } else {
            format!("SELECT t.{tid}, t.{account}, 0, NULL FROM {transactions} t ORDER BY t.rowid")
        };

        let mut rows = self.conn().query(&sql, ()).await?;
        let mut links = Vec::new();
        while let Some(row) = rows.next().await? {
            let matched = row.get::<i64>(2)? != 0;
            links.push(TransactionAccount {
                transaction_id: cell_from_value(row.get_value(0)?),
                account_id: cell_from_value(row.get_value(1)?),
                account_number: if matched {
                    Some(cell_from_value(row.get_value(3)?))
                } else {
                    None
                },
            });
        }
        Ok(Some(links))
    }

    /// Accounts whose owner does not exist. With no users table every
    /// account is an orphan.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingColumn` if a mapped column is absent, or
    /// the query error.
    pub async fn orphaned_accounts(&self) -> Result<Vec<OrphanAccount>, StoreError> {
        if !self.has_table(LogicalTable::Accounts).await? {
            return Ok(Vec::new());
        }

        let u = &self.schema().users;
        let a = &self.schema().accounts;
        self.require_columns(
            LogicalTable::Accounts,
            &[
                ("accounts.id", &a.id),
                ("accounts.number", &a.number),
                ("accounts.owner", &a.owner),
            ],
        )
        .await?;
        let aid = ident("accounts.id", &a.id)?;
        let number = ident("accounts.number", &a.number)?;
        let owner = ident("accounts.owner", &a.owner)?;
        let accounts = ident("accounts.table", &a.table)?;

        let sql = if self.has_table(LogicalTable::Users).await? {
            self.require_columns(LogicalTable::Users, &[("users.id", &u.id)])
                .await?;
            format!(
                "SELECT a.{aid}, a.{number}, a.{owner} FROM {accounts} a \
                 LEFT JOIN {users} u ON u.{uid} = a.{owner} \
                 WHERE u.{uid} IS NULL ORDER BY a.rowid",
                users = ident("users.table", &u.table)?,
                uid = ident("users.id", &u.id)?,
            )
        } else {
            format!("SELECT a.{aid}, a.{number}, a.{owner} FROM {accounts} a ORDER BY a.rowid")
        };

        let mut rows = self.conn().query(&sql, ()).await?;
        let mut orphans = Vec::new();
        while let Some(row) = rows.next().await? {
            orphans.push(OrphanAccount {
                account_id: cell_from_value(row.get_value(0)?),
                account_number: cell_from_value(row.get_value(1)?),
                owner_id: cell_from_value(row.get_value(2)?),
            });
        }
        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "orphaned accounts found");
        }
        Ok(orphans)
    }

    /// Transactions whose account does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingColumn` if a mapped column is absent, or
    /// the query error.
    pub async fn orphaned_transactions(&self) -> Result<Vec<OrphanTransaction>, StoreError> {
        if !self.has_table(LogicalTable::Transactions).await? {
            return Ok(Vec::new());
        }

        let a = &self.schema().accounts;
        let t = &self.schema().transactions;
        self.require_columns(
            LogicalTable::Transactions,
            &[("transactions.id", &t.id), ("transactions.account", &t.account)],
        )
        .await?;
        let tid = ident("transactions.id", &t.id)?;
        let account = ident("transactions.account", &t.account)?;
        let transactions = ident("transactions.table", &t.table)?;

        let sql = if self.has_table(LogicalTable::Accounts).await? {
            self.require_columns(LogicalTable::Accounts, &[("accounts.id", &a.id)])
                .await?;
            format!(
                "SELECT t.{tid}, t.{account} FROM {transactions} t \
                 LEFT JOIN {accounts} a ON a.{aid} = t.{account} \
                 WHERE a.{aid} IS NULL ORDER BY t.rowid",
                accounts = ident("accounts.table", &a.table)?,
                aid = ident("accounts.id", &a.id)?,
            )
        } else {
            format!("SELECT t.{tid}, t.{account} FROM {transactions} t ORDER BY t.rowid")
        };

        let mut rows = self.conn().query(&sql, ()).await?;
        let mut orphans = Vec::new();
        while let Some(row) = rows.next().await? {
            orphans.push(OrphanTransaction {
                transaction_id: cell_from_value(row.get_value(0)?),
                account_id: cell_from_value(row.get_value(1)?),
            });
        }
        Ok(orphans)
    }

    /// Transactions violating `new = prior + amount` (credits) or
    /// `new = prior - amount` (debits). Unknown type tags are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingColumn` if a mapped column is absent, or
    /// the query error.
    pub async fn balance_mismatches(&self) -> Result<Vec<BalanceMismatch>, StoreError> {
        if !self.has_table(LogicalTable::Transactions).await? {
            return Ok(Vec::new());
        }

        let t = &self.schema().transactions;
        self.require_columns(
            LogicalTable::Transactions,
            &[
                ("transactions.id", &t.id),
                ("transactions.kind", &t.kind),
                ("transactions.amount", &t.amount),
                ("transactions.prior_balance", &t.prior_balance),
                ("transactions.new_balance", &t.new_balance),
            ],
        )
        .await?;
        // Qualified names: an unqualified quoted name that matches no column
        // is read by SQLite as a string literal.
        let sql = format!(
            "SELECT t.{tid}, t.{kind}, t.{amount}, t.{prior}, t.{new} \
             FROM {table} t ORDER BY t.rowid",
            tid = ident("transactions.id", &t.id)?,
            kind = ident("transactions.kind", &t.kind)?,
            amount = ident("transactions.amount", &t.amount)?,
            prior = ident("transactions.prior_balance", &t.prior_balance)?,
            new = ident("transactions.new_balance", &t.new_balance)?,
            table = ident("transactions.table", &t.table)?,
        );

        let mut rows = self.conn().query(&sql, ()).await?;
        let mut mismatches = Vec::new();
        while let Some(row) = rows.next().await? {
            let kind_cell = cell_from_value(row.get_value(1)?);
            let kind_tag = kind_cell.as_text().unwrap_or_default().to_string();
            let Some(kind) = TransactionKind::from_tag(&kind_tag) else {
                continue;
            };

            let amount = cell_from_value(row.get_value(2)?);
            let prior = cell_from_value(row.get_value(3)?);
            let new = cell_from_value(row.get_value(4)?);

            if let Some(mismatch) = check_balance(kind, &amount, &prior, &new) {
                mismatches.push(BalanceMismatch {
                    transaction_id: cell_from_value(row.get_value(0)?),
                    kind: kind_tag,
                    amount,
                    prior_balance: prior,
                    new_balance: new,
                    expected_new_balance: mismatch.0,
                    reason: mismatch.1,
                });
            }
        }
        Ok(mismatches)
    }
}

/// `None` when the row is consistent, otherwise the expected new balance (if
/// computable) and a reason.
fn check_balance(
    kind: TransactionKind,
    amount: &CellValue,
    prior: &CellValue,
    new: &CellValue,
) -> Option<(Option<Decimal>, String)> {
    let (Some(amount), Some(prior), Some(new)) =
        (amount.as_decimal(), prior.as_decimal(), new.as_decimal())
    else {
        return Some((None, "non-numeric amount or balance".to_string()));
    };

    let expected = match kind.effect() {
        BalanceEffect::Credit => prior + amount,
        BalanceEffect::Debit => prior - amount,
    };

    if expected == new {
        None
    } else {
        Some((
            Some(expected),
            format!("{kind}: expected {expected}, found {new}"),
        ))
    }
}
