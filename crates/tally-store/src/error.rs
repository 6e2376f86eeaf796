//! Store error types for tally-store.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file is missing, unreadable, or not a database.
    #[error("Store unavailable at {}: {reason}", .path.display())]
    Unavailable { path: PathBuf, reason: String },

    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// A column named by the schema map is not in the store's table.
    #[error("Column '{column}' ({field}) not found in table '{table}'")]
    MissingColumn {
        table: String,
        field: String,
        column: String,
    },

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// A pre-step (reset or seed) failed.
    #[error("Store setup failed: {0}")]
    Setup(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// The schema map holds an identifier that cannot be queried safely.
    #[error(transparent)]
    Schema(#[from] tally_core::CoreError),
}
