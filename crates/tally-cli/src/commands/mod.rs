use tally_config::TallyConfig;

use crate::cli::{Commands, GlobalFlags};

pub mod drive;
pub mod inspect;
pub mod run;

/// Route a parsed command to its handler. The returned flag becomes the
/// process exit status.
pub async fn dispatch(
    command: &Commands,
    config: TallyConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<bool> {
    match command {
        Commands::Inspect(args) => inspect::handle(args, &config, flags).await,
        Commands::Run(args) => run::handle(args, config, flags).await,
        Commands::Drive(args) => drive::handle(args, &config, flags).await,
    }
}
