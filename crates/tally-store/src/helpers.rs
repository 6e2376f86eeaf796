//! Row conversion helpers.
//!
//! `libsql::Row` is column-indexed and typed per cell; the inspector keeps
//! every cell as a raw [`CellValue`] so nothing is rounded or coerced before
//! it reaches a caller.

use tally_core::schema::{quote_identifier, validate_identifier};
use tally_core::{CellValue, Row};

use crate::error::StoreError;

#[must_use]
pub fn cell_from_value(value: libsql::Value) -> CellValue {
    match value {
        libsql::Value::Null => CellValue::Null,
        libsql::Value::Integer(i) => CellValue::Integer(i),
        libsql::Value::Real(r) => CellValue::Real(r),
        libsql::Value::Text(s) => CellValue::Text(s),
        libsql::Value::Blob(b) => CellValue::Blob(b),
    }
}

/// Read every column of a result row, with names attached.
///
/// # Errors
///
/// Returns `StoreError` if a column cannot be read.
pub fn read_row(row: &libsql::Row) -> Result<Row, StoreError> {
    let count = row.column_count();
    let mut cells = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
    for idx in 0..count {
        let name = row
            .column_name(idx)
            .map_or_else(|| format!("column_{idx}"), str::to_string);
        cells.push((name, cell_from_value(row.get_value(idx)?)));
    }
    Ok(Row::new(cells))
}

/// Validate and quote an identifier in one step.
///
/// # Errors
///
/// Returns `StoreError::Schema` if the identifier is not plain.
pub fn ident(field: &str, name: &str) -> Result<String, StoreError> {
    validate_identifier(field, name)?;
    Ok(quote_identifier(name))
}

/// Read a `COUNT(*)`-style scalar from the first column of the first row.
///
/// # Errors
///
/// Returns `StoreError::NoResult` if no row comes back.
pub async fn query_count(conn: &libsql::Connection, sql: &str) -> Result<u64, StoreError> {
    let mut rows = conn.query(sql, ()).await?;
    let row = rows.next().await?.ok_or(StoreError::NoResult)?;
    let count = row.get::<i64>(0)?;
    u64::try_from(count).map_err(|_| StoreError::Query(format!("negative count {count}")))
}
