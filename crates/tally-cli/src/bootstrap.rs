use anyhow::Context;
use tally_config::TallyConfig;

use crate::cli::GlobalFlags;

/// Load layered configuration (`.env` included) and apply command-line flags.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<TallyConfig> {
    if let Some(path) = &flags.config
        && !path.is_file()
    {
        anyhow::bail!("config file '{}' does not exist", path.display());
    }

    let mut config = TallyConfig::load_with_dotenv(flags.config.as_deref())
        .context("failed to load tally configuration")?;
    config
        .apply(flags.overrides())
        .context("invalid command-line option")?;

    tracing::debug!(
        store = %config.store_path().display(),
        program = %config.driver.program,
        "configuration loaded"
    );
    Ok(config)
}
