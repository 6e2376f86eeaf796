//! # tally-config
//!
//! Layered configuration loading for tally using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Command-line flags (applied by the CLI through [`ConfigOverrides`])
//! 2. Environment variables (`TALLY_*` prefix, `__` as separator)
//! 3. An explicit `--config` file, or project-level `.tally/config.toml`
//! 4. User-level `~/.config/tally/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `TALLY_STORE__PATH` -> `store.path`,
//! `TALLY_DRIVER__TIMEOUT_SECS` -> `driver.timeout_secs`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use tally_config::TallyConfig;
//!
//! let config = TallyConfig::load().expect("config");
//! if config.driver.is_configured() {
//!     println!("driving {}", config.driver.program);
//! }
//! ```

mod driver;
mod error;
mod store;

pub use driver::DriverConfig;
pub use error::ConfigError;
pub use store::StoreConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Values given on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_path: Option<String>,
    pub row_limit: Option<u32>,
    pub step_delay_secs: Option<f64>,
    pub startup_delay_secs: Option<f64>,
    pub timeout_secs: Option<f64>,
    pub working_dir: Option<String>,
}

impl TallyConfig {
    /// Load configuration from TOML files and environment variables, then
    /// validate it.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration with an explicit config file in place of the
    /// project-local one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction or validation fails.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(explicit).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction or validation fails.
    pub fn load_with_dotenv(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load_from(explicit)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer extra providers.
    #[must_use]
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        // Layer 2: Explicit file, else project-local config
        match explicit {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                let local_path = PathBuf::from(".tally/config.toml");
                if local_path.exists() {
                    figment = figment.merge(Toml::file(local_path));
                }
            }
        }

        // Layer 3: Environment variables
        figment.merge(Env::prefixed("TALLY_").split("__"))
    }

    /// Apply command-line overrides (highest priority) and re-validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an override is out of range.
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(path) = overrides.store_path {
            self.store.path = path;
        }
        if let Some(limit) = overrides.row_limit {
            self.store.row_limit = limit;
        }
        if let Some(secs) = overrides.step_delay_secs {
            self.driver.step_delay_secs = secs;
        }
        if let Some(secs) = overrides.startup_delay_secs {
            self.driver.startup_delay_secs = secs;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.driver.timeout_secs = secs;
        }
        if let Some(dir) = overrides.working_dir {
            self.driver.working_dir = dir;
        }
        self.validate()
    }

    /// Check value ranges and schema identifiers.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        seconds("driver.step_delay_secs", self.driver.step_delay_secs)?;
        seconds("driver.startup_delay_secs", self.driver.startup_delay_secs)?;
        if seconds("driver.timeout_secs", self.driver.timeout_secs)?.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "driver.timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.store.path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.path".into(),
                reason: "must not be empty".into(),
            });
        }
        self.store.schema.validate()?;
        Ok(())
    }

    /// Store path resolved against the driver's working directory.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.store.resolve_path(self.driver.working_dir())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tally").join("config.toml"))
    }
}

/// Convert a seconds value to a `Duration`, rejecting anything negative,
/// non-finite or too large to represent.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` naming `field`.
pub fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("must be a representable number of seconds >= 0, got {value} ({e})"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TallyConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.driver.is_configured());
        assert_eq!(config.store.path, "wallet.db");
    }

    #[test]
    fn figment_builds_without_files() {
        let config: TallyConfig = TallyConfig::figment(None)
            .extract()
            .expect("should extract defaults");
        assert_eq!(config.store.row_limit, 5);
        assert!((config.driver.timeout_secs - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let mut config = TallyConfig::default();
        config
            .apply(ConfigOverrides {
                store_path: Some("other.db".into()),
                row_limit: Some(10),
                step_delay_secs: Some(0.0),
                timeout_secs: Some(5.0),
                working_dir: Some("/srv/wallet".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.store.row_limit, 10);
        assert_eq!(config.driver.step_delay_secs, 0.0);
        assert_eq!(config.store_path(), PathBuf::from("/srv/wallet/other.db"));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut config = TallyConfig::default();
        let err = config
            .apply(ConfigOverrides {
                step_delay_secs: Some(-1.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "driver.step_delay_secs"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = TallyConfig::default();
        config.driver.timeout_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unrepresentable_timeout_is_rejected() {
        let mut config = TallyConfig::default();
        let err = config
            .apply(ConfigOverrides {
                timeout_secs: Some(1e20),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "driver.timeout_secs"));

        config.driver.timeout_secs = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn seconds_accepts_large_but_representable_values() {
        assert_eq!(seconds("t", 1e9).unwrap(), Duration::from_secs(1_000_000_000));
        assert!(seconds("t", -0.5).is_err());
    }

    #[test]
    fn nan_is_rejected() {
        let mut config = TallyConfig::default();
        config.driver.startup_delay_secs = f64::NAN;
        assert!(config.validate().is_err());
    }
}
