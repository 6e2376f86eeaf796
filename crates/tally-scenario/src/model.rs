//! Scenario definitions, loadable from TOML.
//!
//! ```toml
//! name = "deposit"
//! expect_exit = "clean"
//! script = ["", "2", "2", "7159002131", "1000000", "prueba deposito", "s", "0", "0"]
//!
//! [setup]
//! reset_store = true
//! reference_schema = true
//! seed_sql = "INSERT INTO usuarios ..."
//!
//! [[assertions]]
//! table = "transactions"
//! check = "row_count"
//! equals = 1
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_config::DriverConfig;
use tally_core::{CommandScript, LogicalTable};

use crate::assertion::{Assertion, Check};
use crate::error::ScenarioError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitExpectation {
    /// The process exits on its own with status 0.
    #[default]
    Clean,
    /// Any natural exit is fine; only a timeout fails.
    AnyExit,
    /// The session is expected to end by timeout kill. A clean exit is also
    /// accepted.
    Interrupted,
}

impl ExitExpectation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::AnyExit => "any_exit",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Store pre-steps, run in order: reset, reference schema, seed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Setup {
    /// Delete the store (and sidecars) before anything else.
    pub reset_store: bool,
    /// Create the reference wallet tables if missing.
    pub reference_schema: bool,
    /// SQL batch applied after the schema.
    pub seed_sql: Option<String>,
}

/// Per-scenario replacements for the configured driver settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverOverrides {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub startup_delay_secs: Option<f64>,
    pub step_delay_secs: Option<f64>,
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub setup: Setup,
    pub script: CommandScript,
    #[serde(default)]
    pub expect_exit: ExitExpectation,
    /// Replaces the configured crash markers when set.
    #[serde(default)]
    pub crash_markers: Option<Vec<String>>,
    /// Extra environment for the driven process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub overrides: DriverOverrides,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, script: CommandScript) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            setup: Setup::default(),
            script,
            expect_exit: ExitExpectation::default(),
            crash_markers: None,
            env: BTreeMap::new(),
            overrides: DriverOverrides::default(),
            assertions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_setup(mut self, setup: Setup) -> Self {
        self.setup = setup;
        self
    }

    #[must_use]
    pub const fn expect(mut self, expectation: ExitExpectation) -> Self {
        self.expect_exit = expectation;
        self
    }

    #[must_use]
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Parse a scenario from TOML text. `origin` only labels errors.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::Parse` on malformed TOML and
    /// `ScenarioError::Invalid` if the scenario fails validation.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(text).map_err(|source| ScenarioError::Parse {
            path: origin.to_path_buf(),
            source: Box::new(source),
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load and validate a scenario file.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::Read` if the file cannot be read, otherwise as
    /// [`Scenario::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_toml_str(&text, path)?;
        tracing::debug!(
            path = %path.display(),
            name = %scenario.name,
            assertions = scenario.assertions.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }

    /// # Errors
    ///
    /// Returns `ScenarioError::Invalid` for an empty name, out-of-range
    /// delay or timeout overrides, or `balances_consistent` on a table other
    /// than transactions.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |reason: String| ScenarioError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".into()));
        }

        let o = &self.overrides;
        for (field, value) in [
            ("overrides.startup_delay_secs", o.startup_delay_secs),
            ("overrides.step_delay_secs", o.step_delay_secs),
            ("overrides.timeout_secs", o.timeout_secs),
        ] {
            if let Some(v) = value {
                tally_config::seconds(field, v).map_err(|e| invalid(e.to_string()))?;
            }
        }
        if o.timeout_secs.is_some_and(|t| t == 0.0) {
            return Err(invalid("timeout_secs must be positive".into()));
        }

        for assertion in &self.assertions {
            if matches!(assertion.check, Check::BalancesConsistent)
                && assertion.table != LogicalTable::Transactions
            {
                return Err(invalid(format!(
                    "balances_consistent applies to transactions, not {}",
                    assertion.table
                )));
            }
        }
        Ok(())
    }

    /// The configured driver settings with this scenario's overrides applied.
    #[must_use]
    pub fn driver_config(&self, base: &DriverConfig) -> DriverConfig {
        let o = &self.overrides;
        let mut config = base.clone();
        if let Some(program) = &o.program {
            config.program.clone_from(program);
        }
        if let Some(args) = &o.args {
            config.args.clone_from(args);
        }
        if let Some(v) = o.startup_delay_secs {
            config.startup_delay_secs = v;
        }
        if let Some(v) = o.step_delay_secs {
            config.step_delay_secs = v;
        }
        if let Some(v) = o.timeout_secs {
            config.timeout_secs = v;
        }
        if let Some(markers) = &self.crash_markers {
            config.crash_markers.clone_from(markers);
        }
        config
    }
}
