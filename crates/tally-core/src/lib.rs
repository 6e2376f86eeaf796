//! # tally-core
//!
//! Core types shared across all tally crates:
//! - Logical table allow-list and the schema map binding it to physical names
//! - Raw cell values and rows as read from the inspected store
//! - Command scripts fed to the driven process
//! - Transaction type tags and their balance effect
//! - Money formatting for reports
//! - Cross-cutting error types

pub mod enums;
pub mod errors;
pub mod money;
pub mod schema;
pub mod script;
pub mod value;

pub use enums::{BalanceEffect, LogicalTable, TransactionKind};
pub use errors::CoreError;
pub use schema::SchemaMap;
pub use script::CommandScript;
pub use value::{CellValue, Row};
