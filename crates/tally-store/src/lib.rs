//! # tally-store
//!
//! Read-only inspection of the single-file `SQLite` store written by the
//! driven application.
//!
//! The inspector never mutates the store: connections are opened with
//! `SQLITE_OPEN_READ_ONLY` and `PRAGMA query_only`. Only logical tables from
//! the allow-list are queried, through validated, quoted identifiers taken
//! from the [`SchemaMap`]. A missing store or missing table is a reportable
//! state, not a failure of the whole inspection.
//!
//! Write-capable helpers for scenario pre-steps (reset, seed) live in
//! [`prestep`] and never share a connection with the inspector.

pub mod error;
pub mod helpers;
pub mod inspection;
pub mod integrity;
pub mod prestep;

use std::path::{Path, PathBuf};

use libsql::{Builder, OpenFlags};
use tally_core::SchemaMap;

use error::StoreError;

pub use inspection::{Inspection, TableSnapshot, TableState};
pub use integrity::{
    AccountLink, AccountOwner, BalanceMismatch, FailedCheck, IntegrityCheck, IntegrityReport,
    OrphanAccount, OrphanTransaction, TransactionAccount,
};

/// Read-only handle on an inspected store.
pub struct StoreInspector {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    path: PathBuf,
    schema: SchemaMap,
}

impl StoreInspector {
    /// Open the store at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the file is missing, unreadable or
    /// not a database, and `StoreError::Schema` if the schema map holds an
    /// invalid identifier.
    pub async fn open(path: impl AsRef<Path>, schema: SchemaMap) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        schema.validate()?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(unavailable(&path, "not a regular file")),
            Err(e) => return Err(unavailable(&path, e)),
        }

        let db = Builder::new_local(&path)
            .flags(OpenFlags::SQLITE_OPEN_READ_ONLY)
            .build()
            .await
            .map_err(|e| unavailable(&path, e))?;
        let conn = db.connect().map_err(|e| unavailable(&path, e))?;
        conn.execute("PRAGMA query_only = ON", ())
            .await
            .map_err(|e| unavailable(&path, format!("PRAGMA query_only: {e}")))?;

        let inspector = Self {
            db,
            conn,
            path,
            schema,
        };

        // SQLite opens lazily; query the catalog so a non-database file is
        // reported as unavailable here rather than as a query failure later.
        if let Err(e) = inspector.list_tables().await {
            return Err(unavailable(&inspector.path, e));
        }

        tracing::debug!(path = %inspector.path.display(), "opened store read-only");
        Ok(inspector)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    pub(crate) const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Names of all user tables in the store, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the catalog query fails.
    pub async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                (),
            )
            .await?;
        let mut tables = Vec::new();
        while let Some(row) = rows.next().await? {
            tables.push(row.get::<String>(0)?);
        }
        Ok(tables)
    }
}

fn unavailable(path: &Path, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
