//! Configuration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A TOML layer or `TALLY_*` variable could not be read into the config.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A value is out of range (negative delay, zero timeout, empty path).
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The schema map names a table or column that is not a plain identifier.
    #[error(transparent)]
    Schema(#[from] tally_core::CoreError),
}
