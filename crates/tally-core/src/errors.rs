//! Cross-cutting error types for tally.
//!
//! Crate-specific errors (`StoreError`, `DriverError`, `ScenarioError`) live in
//! their own crates and converge into `anyhow` at the CLI boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A table or column name is not a plain SQL identifier.
    #[error("Invalid SQL identifier '{name}' for {field}")]
    InvalidIdentifier { field: String, name: String },

    /// A logical table name outside the allow-list.
    #[error("Unknown table '{0}' (expected one of: users, accounts, transactions)")]
    UnknownTable(String),
}
