//! # tally-report
//!
//! Pure rendering of inspections and scenario results. Nothing here touches
//! the store, the process, or stdout; callers print the returned strings.
//!
//! Raw values are formatted only at this boundary: money columns get two
//! decimals and thousands separators, nulls become `N/A`, and a column absent
//! from a row becomes `<missing>`.

pub mod inspection;
pub mod results;
pub mod table;

use serde::Serialize;
use tally_core::SchemaMap;

pub use inspection::{format_cell, render_inspection};
pub use results::{render_drive, render_results};
pub use table::{TableOptions, render_table};

/// Placeholder for a NULL cell.
pub const NULL_PLACEHOLDER: &str = "N/A";

/// Placeholder for a column the row does not carry.
pub const MISSING_PLACEHOLDER: &str = "<missing>";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Sampled rows shown per table.
    pub row_limit: usize,
    /// Output lines shown for failed scenarios.
    pub tail_lines: usize,
    /// Physical names, used to find money columns.
    pub schema: SchemaMap,
    pub table: TableOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            row_limit: 5,
            tail_lines: 20,
            schema: SchemaMap::default(),
            table: TableOptions::default(),
        }
    }
}

/// Serialize for machine consumption: pretty JSON, or one line when
/// `compact`.
///
/// # Errors
///
/// Returns the `serde_json` error if `value` cannot be serialized.
pub fn render_json<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}
