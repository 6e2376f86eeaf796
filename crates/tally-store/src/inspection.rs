//! Table inspection: existence, counts, sampled rows.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_core::{LogicalTable, Row, SchemaMap};

use crate::error::StoreError;
use crate::helpers::{ident, query_count, read_row};
use crate::StoreInspector;

/// Result of one inspection pass over a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub store_path: PathBuf,
    /// Why the store could not be opened, if it could not.
    pub unavailable: Option<String>,
    /// Every user table found in the store, sorted.
    pub tables_present: Vec<String>,
    /// One entry per requested logical table, in request order.
    pub tables: Vec<TableSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub table: LogicalTable,
    pub physical_name: String,
    #[serde(flatten)]
    pub state: TableState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableState {
    Found {
        count: u64,
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    NotFound,
    /// The table exists but reading it failed.
    Unreadable {
        reason: String,
    },
}

impl Inspection {
    /// An inspection of a store that could not be opened. Every requested
    /// table is reported as not found.
    #[must_use]
    pub fn unavailable(
        path: &Path,
        schema: &SchemaMap,
        tables: &[LogicalTable],
        reason: impl Into<String>,
    ) -> Self {
        Self {
            store_path: path.to_path_buf(),
            unavailable: Some(reason.into()),
            tables_present: Vec::new(),
            tables: tables
                .iter()
                .map(|&table| TableSnapshot {
                    table,
                    physical_name: schema.table_name(table).to_string(),
                    state: TableState::NotFound,
                })
                .collect(),
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }

    #[must_use]
    pub fn table(&self, table: LogicalTable) -> Option<&TableSnapshot> {
        self.tables.iter().find(|t| t.table == table)
    }
}

impl TableSnapshot {
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self.state, TableState::Found { .. })
    }

    /// Total row count, `None` when the table does not exist.
    #[must_use]
    pub const fn count(&self) -> Option<u64> {
        match &self.state {
            TableState::Found { count, .. } => Some(*count),
            TableState::NotFound | TableState::Unreadable { .. } => None,
        }
    }

    /// Sampled rows; empty for a missing table.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match &self.state {
            TableState::Found { rows, .. } => rows,
            TableState::NotFound | TableState::Unreadable { .. } => &[],
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        match &self.state {
            TableState::Found { columns, .. } => columns,
            TableState::NotFound | TableState::Unreadable { .. } => &[],
        }
    }
}

impl StoreInspector {
    /// Inspect the requested logical tables.
    ///
    /// `sample_limit` bounds the rows returned per table (`None` returns all
    /// rows). Rows come newest first by `rowid`. A table that exists but
    /// cannot be read is reported as [`TableState::Unreadable`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the table catalog cannot be listed.
    pub async fn inspect(
        &self,
        tables: &[LogicalTable],
        sample_limit: Option<u32>,
    ) -> Result<Inspection, StoreError> {
        let present = self.list_tables().await?;
        let mut snapshots = Vec::with_capacity(tables.len());

        for &table in tables {
            let configured = self.schema().table_name(table);
            let state = match present.iter().find(|t| t.eq_ignore_ascii_case(configured)) {
                Some(actual) => match self.snapshot_table(actual, sample_limit).await {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::warn!(%table, physical = actual.as_str(), error = %e, "table unreadable");
                        TableState::Unreadable {
                            reason: e.to_string(),
                        }
                    }
                },
                None => {
                    tracing::debug!(%table, physical = configured, "table not found");
                    TableState::NotFound
                }
            };
            snapshots.push(TableSnapshot {
                table,
                physical_name: configured.to_string(),
                state,
            });
        }

        tracing::debug!(
            path = %self.path().display(),
            tables_present = present.len(),
            "inspection complete"
        );

        Ok(Inspection {
            store_path: self.path().to_path_buf(),
            unavailable: None,
            tables_present: present,
            tables: snapshots,
        })
    }

    /// Whether a logical table exists in the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the catalog query fails.
    pub async fn has_table(&self, table: LogicalTable) -> Result<bool, StoreError> {
        let configured = self.schema().table_name(table);
        Ok(self
            .list_tables()
            .await?
            .iter()
            .any(|t| t.eq_ignore_ascii_case(configured)))
    }

    async fn snapshot_table(
        &self,
        physical: &str,
        sample_limit: Option<u32>,
    ) -> Result<TableState, StoreError> {
        let quoted = ident("table", physical)?;

        let count = query_count(self.conn(), &format!("SELECT COUNT(*) FROM {quoted}")).await?;
        let columns = self.table_columns(&quoted).await?;

        let sql = format!("SELECT * FROM {quoted} ORDER BY rowid DESC");
        let mut result = match sample_limit {
            Some(limit) => {
                self.conn()
                    .query(&format!("{sql} LIMIT ?1"), [i64::from(limit)])
                    .await?
            }
            None => self.conn().query(&sql, ()).await?,
        };

        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(read_row(&row)?);
        }

        Ok(TableState::Found {
            count,
            columns,
            rows,
        })
    }

    pub(crate) async fn table_columns(&self, quoted: &str) -> Result<Vec<String>, StoreError> {
        let mut rows = self
            .conn()
            .query(&format!("PRAGMA table_info({quoted})"), ())
            .await?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next().await? {
            columns.push(row.get::<String>(1)?);
        }
        Ok(columns)
    }
}

/// Open `path` and inspect it, folding an unavailable store into the result.
///
/// # Errors
///
/// Returns `StoreError` for failures other than an unavailable store (invalid
/// schema map, failing queries).
pub async fn inspect_path(
    path: &Path,
    schema: &SchemaMap,
    tables: &[LogicalTable],
    sample_limit: Option<u32>,
) -> Result<Inspection, StoreError> {
    match StoreInspector::open(path, schema.clone()).await {
        Ok(inspector) => inspector.inspect(tables, sample_limit).await,
        Err(StoreError::Unavailable { reason, .. }) => {
            tracing::warn!(path = %path.display(), %reason, "store unavailable");
            Ok(Inspection::unavailable(path, schema, tables, reason))
        }
        Err(e) => Err(e),
    }
}
