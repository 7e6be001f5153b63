//! `chartwatch history`: entry and exit events per snapshot date.

use anyhow::Result;
use chartwatch_core::dimension::DimensionQuery;
use chartwatch_core::history::{history, HistoryReport, HistoryRequest};
use chartwatch_core::ChartError;

use crate::config::Config;
use crate::export::{self, OutputFormat};
use crate::sqlite_store::SqliteSnapshotStore;

pub async fn history_report(
    store: &SqliteSnapshotStore,
    config: &Config,
    query: &DimensionQuery,
    request: &HistoryRequest,
) -> Result<HistoryReport, ChartError> {
    let key = config.resolve_key(query)?;
    history(store, &key, request).await
}

pub async fn run_history(
    config: &Config,
    query: &DimensionQuery,
    request: &HistoryRequest,
    format: OutputFormat,
) -> Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let report = history_report(&store, config, query, request).await?;

    if format == OutputFormat::Table && report.rows.is_empty() {
        println!(
            "No events ({} snapshot dates available).",
            report.available_dates.len()
        );
    } else {
        print!("{}", export::render(&report, format)?);
    }

    store.close().await;
    Ok(())
}
