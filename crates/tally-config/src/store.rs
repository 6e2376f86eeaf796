//! Persistent store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tally_core::SchemaMap;

/// Default store file written by the wallet application.
fn default_path() -> String {
    "wallet.db".to_string()
}

/// Default number of sampled rows shown per table.
const fn default_row_limit() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Path to the `SQLite` file, relative paths resolve against the driver's
    /// working directory when one is set.
    #[serde(default = "default_path")]
    pub path: String,

    /// Rows sampled per table in reports.
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,

    /// Physical table and column names.
    #[serde(default)]
    pub schema: SchemaMap,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            row_limit: default_row_limit(),
            schema: SchemaMap::default(),
        }
    }
}

impl StoreConfig {
    /// Resolve the store path against an optional base directory.
    #[must_use]
    pub fn resolve_path(&self, base: Option<&std::path::Path>) -> PathBuf {
        let path = PathBuf::from(&self.path);
        match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}
