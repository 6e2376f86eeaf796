use serde::Serialize;
use tally_config::TallyConfig;
use tally_report::{RenderOptions, TableOptions, render_json};

use crate::cli::OutputFormat;
use crate::ui;

/// Render a response in the requested format. `table` produces the
/// human-readable text and is only called for [`OutputFormat::Table`].
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    table: impl FnOnce() -> String,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(render_json(value, false)?),
        OutputFormat::Table => Ok(table()),
        OutputFormat::Raw => Ok(render_json(value, true)?),
    }
}

/// Print a response in the requested format.
pub fn output<T: Serialize>(
    value: &T,
    format: OutputFormat,
    table: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    let rendered = render(value, format, table)?;
    println!("{rendered}");
    Ok(())
}

/// Report options from configuration and terminal preferences.
pub fn render_options(config: &TallyConfig) -> RenderOptions {
    let prefs = ui::prefs();
    RenderOptions {
        row_limit: usize::try_from(config.store.row_limit).unwrap_or(usize::MAX),
        schema: config.store.schema.clone(),
        table: TableOptions {
            max_width: prefs.term_width,
            color: prefs.table_color,
        },
        ..RenderOptions::default()
    }
}
