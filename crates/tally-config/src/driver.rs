//! Process driver configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_step_delay_secs() -> f64 {
    0.5
}

const fn default_timeout_secs() -> f64 {
    30.0
}

/// Default cap on captured output (1 MiB).
const fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_crash_markers() -> Vec<String> {
    vec!["Exception in thread".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    /// Executable to launch (e.g., `java`).
    #[serde(default)]
    pub program: String,

    /// Arguments passed to the executable (e.g., `["-jar", "target/app.jar"]`).
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the driven process. Empty means the current one.
    #[serde(default)]
    pub working_dir: String,

    /// Wait before the first scripted line, for slow-booting targets.
    #[serde(default)]
    pub startup_delay_secs: f64,

    /// Pause between scripted lines.
    #[serde(default = "default_step_delay_secs")]
    pub step_delay_secs: f64,

    /// Bound on the whole interaction.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Captured output beyond this many bytes is discarded.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Output substrings that mark an unhandled crash of the driven process.
    #[serde(default = "default_crash_markers")]
    pub crash_markers: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            working_dir: String::new(),
            startup_delay_secs: 0.0,
            step_delay_secs: default_step_delay_secs(),
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            crash_markers: default_crash_markers(),
        }
    }
}

impl DriverConfig {
    /// Check if a program to drive has been configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.program.is_empty()
    }

    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        if self.working_dir.is_empty() {
            None
        } else {
            Some(Path::new(&self.working_dir))
        }
    }

    /// Startup delay as a `Duration`. Call after [`crate::TallyConfig::validate`].
    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        saturating_secs(self.startup_delay_secs)
    }

    #[must_use]
    pub fn step_delay(&self) -> Duration {
        saturating_secs(self.step_delay_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        saturating_secs(self.timeout_secs)
    }
}

/// Out-of-range values clamp instead of panicking; validation rejects them
/// before they get here.
fn saturating_secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
