//! Logical tables and transaction type tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// LogicalTable
// ---------------------------------------------------------------------------

/// The closed set of tables the harness is allowed to query.
///
/// Physical names are resolved through [`crate::SchemaMap`]; nothing outside
/// this enum ever reaches a SQL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalTable {
    Users,
    Accounts,
    Transactions,
}

impl LogicalTable {
    pub const ALL: [Self; 3] = [Self::Users, Self::Accounts, Self::Transactions];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Accounts => "accounts",
            Self::Transactions => "transactions",
        }
    }
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalTable {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "users" => Ok(Self::Users),
            "accounts" => Ok(Self::Accounts),
            "transactions" => Ok(Self::Transactions),
            other => Err(CoreError::UnknownTable(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// Direction in which a transaction moves an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceEffect {
    Credit,
    Debit,
}

/// Transaction type tags written by the wallet application.
///
/// ```text
/// DEPOSITO               credit
/// RETIRO                 debit
/// TRANSFERENCIA_ENTRADA  credit
/// TRANSFERENCIA_SALIDA   debit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    /// Parse a stored type tag. Unknown tags return `None` and are left out of
    /// balance checks.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "DEPOSITO" => Some(Self::Deposit),
            "RETIRO" => Some(Self::Withdrawal),
            "TRANSFERENCIA_ENTRADA" => Some(Self::TransferIn),
            "TRANSFERENCIA_SALIDA" => Some(Self::TransferOut),
            _ => None,
        }
    }

    /// The tag as stored in the `tipo` column.
    #[must_use]
    pub const fn as_tag(self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSITO",
            Self::Withdrawal => "RETIRO",
            Self::TransferIn => "TRANSFERENCIA_ENTRADA",
            Self::TransferOut => "TRANSFERENCIA_SALIDA",
        }
    }

    #[must_use]
    pub const fn effect(self) -> BalanceEffect {
        match self {
            Self::Deposit | Self::TransferIn => BalanceEffect::Credit,
            Self::Withdrawal | Self::TransferOut => BalanceEffect::Debit,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
