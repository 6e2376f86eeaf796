use std::path::PathBuf;

use clap::ValueEnum;
use tally_config::ConfigOverrides;

/// Shared output mode across all commands.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
    Raw,
}

/// Global flags available before or after subcommands.
#[derive(Clone, Debug, Default)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub config: Option<PathBuf>,
    pub store: Option<String>,
    pub limit: Option<u32>,
    pub step_delay: Option<f64>,
    pub startup_delay: Option<f64>,
    pub timeout: Option<f64>,
    pub workdir: Option<String>,
    pub quiet: bool,
}

impl GlobalFlags {
    /// Flags that override loaded configuration values.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            store_path: self.store.clone(),
            row_limit: self.limit,
            step_delay_secs: self.step_delay,
            startup_delay_secs: self.startup_delay,
            timeout_secs: self.timeout,
            working_dir: self.workdir.clone(),
        }
    }
}
