//! What to launch and how to feed it.

use std::path::PathBuf;
use std::time::Duration;

use tally_config::DriverConfig;
use tally_core::CommandScript;

/// One scripted interaction with an external program.
#[derive(Debug, Clone)]
pub struct DriveRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub script: CommandScript,
    /// Wait before the first line is written.
    pub startup_delay: Duration,
    /// Wait after each line is written.
    pub step_delay: Duration,
    /// Bound on the whole interaction, startup delay included.
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl DriveRequest {
    /// A request with the configuration defaults for delays, timeout and
    /// output cap.
    pub fn new(program: impl Into<String>, script: CommandScript) -> Self {
        let defaults = DriverConfig::default();
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            script,
            startup_delay: defaults.startup_delay(),
            step_delay: defaults.step_delay(),
            timeout: defaults.timeout(),
            max_output_bytes: defaults.max_output_bytes,
        }
    }

    /// Build a request from validated driver configuration.
    #[must_use]
    pub fn from_config(config: &DriverConfig, script: CommandScript) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir().map(PathBuf::from),
            env: Vec::new(),
            script,
            startup_delay: config.startup_delay(),
            step_delay: config.step_delay(),
            timeout: config.timeout(),
            max_output_bytes: config.max_output_bytes,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    #[must_use]
    pub const fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_output_bytes(mut self, cap: usize) -> Self {
        self.max_output_bytes = cap;
        self
    }
}
