use serde::Serialize;
use tally_config::TallyConfig;
use tally_core::LogicalTable;
use tally_report::render_inspection;
use tally_store::error::StoreError;
use tally_store::{Inspection, IntegrityReport, StoreInspector};

use crate::cli::{GlobalFlags, InspectArgs};
use crate::output::{output, render_options};

#[derive(Debug, Serialize)]
struct InspectReport {
    #[serde(flatten)]
    inspection: Inspection,
    integrity: Option<IntegrityReport>,
}

/// Handle `tally inspect`. An unavailable store is reported, not fatal.
pub async fn handle(
    args: &InspectArgs,
    config: &TallyConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<bool> {
    let tables = requested_tables(&args.tables);
    let path = config.store_path();
    let schema = &config.store.schema;

    let report = match StoreInspector::open(&path, schema.clone()).await {
        Ok(inspector) => {
            let inspection = match inspector
                .inspect(&tables, Some(config.store.row_limit))
                .await
            {
                Ok(inspection) => inspection,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "store inspection failed");
                    Inspection::unavailable(&path, schema, &tables, error.to_string())
                }
            };
            let integrity = if args.no_integrity {
                None
            } else {
                Some(inspector.integrity().await)
            };
            InspectReport {
                inspection,
                integrity,
            }
        }
        Err(StoreError::Unavailable { reason, .. }) => {
            tracing::warn!(path = %path.display(), %reason, "store unavailable");
            InspectReport {
                inspection: Inspection::unavailable(&path, schema, &tables, reason),
                integrity: None,
            }
        }
        Err(error) => return Err(error.into()),
    };

    let options = render_options(config);
    output(&report, flags.format, || {
        render_inspection(&report.inspection, report.integrity.as_ref(), &options)
    })?;
    Ok(true)
}

/// Requested tables in canonical order without repeats; all of them when
/// none were named.
fn requested_tables(named: &[LogicalTable]) -> Vec<LogicalTable> {
    if named.is_empty() {
        return LogicalTable::ALL.to_vec();
    }
    LogicalTable::ALL
        .into_iter()
        .filter(|table| named.contains(table))
        .collect()
}
