use std::path::PathBuf;

use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::{Commands, DriveArgs, InspectArgs, RunArgs};

/// Top-level CLI parser for the `tally` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tally",
    version,
    about = "tally - drive an interactive CLI app and verify what it persisted"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Config file (used instead of .tally/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store file to inspect [default: wallet.db]
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Sampled rows shown per table [default: 5]
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Seconds between script lines [default: 0.5]
    #[arg(long, global = true, value_name = "SECS")]
    pub step_delay: Option<f64>,

    /// Seconds to wait before the first script line [default: 0]
    #[arg(long, global = true, value_name = "SECS")]
    pub startup_delay: Option<f64>,

    /// Seconds before the driven process is killed [default: 30]
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Working directory of the driven process; relative store paths resolve against it
    #[arg(long, global = true, value_name = "DIR")]
    pub workdir: Option<String>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            config: self.config.clone(),
            store: self.store.clone(),
            limit: self.limit,
            step_delay: self.step_delay,
            startup_delay: self.startup_delay,
            timeout: self.timeout,
            workdir: self.workdir.clone(),
            quiet: self.quiet,
        }
    }
}
