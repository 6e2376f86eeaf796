use std::path::PathBuf;

use clap::{Args, Subcommand};
use tally_core::LogicalTable;

/// Top-level commands.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Inspect the store: row counts, sampled rows, integrity checks.
    Inspect(InspectArgs),
    /// Run scenario files (or directories of them) in order.
    Run(RunArgs),
    /// Drive a program with a script and print what it wrote.
    Drive(DriveArgs),
}

#[derive(Clone, Debug, Args)]
pub struct InspectArgs {
    /// Table to inspect: users, accounts, transactions (repeatable; default all)
    #[arg(short, long = "table", value_name = "TABLE")]
    pub tables: Vec<LogicalTable>,

    /// Skip the integrity checks
    #[arg(long)]
    pub no_integrity: bool,
}

#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    /// Scenario TOML files or directories containing them
    #[arg(required = true, value_name = "SCENARIO")]
    pub paths: Vec<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct DriveArgs {
    /// Input script, one line per stdin line (`#` starts a comment)
    #[arg(short, long)]
    pub script: PathBuf,

    /// Program and arguments, after `--`
    #[arg(required = true, last = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}
