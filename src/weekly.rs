//! `chartwatch insights` and `chartwatch trending`.

use anyhow::Result;
use chartwatch_core::classify::RankAveraging;
use chartwatch_core::dimension::DimensionQuery;
use chartwatch_core::models::{format_date, LifecycleStatus};
use chartwatch_core::weekly::{weekly_insights, weekly_trending, WeeklyInsights, WeeklyTrending};
use chartwatch_core::ChartError;

use crate::config::Config;
use crate::export::{self, OutputFormat};
use crate::sqlite_store::SqliteSnapshotStore;

pub async fn insights_report(
    store: &SqliteSnapshotStore,
    config: &Config,
    query: &DimensionQuery,
    lookback_days: Option<usize>,
    status: Option<LifecycleStatus>,
) -> Result<WeeklyInsights, ChartError> {
    let key = config.resolve_key(query)?;
    let days = lookback_days.unwrap_or(config.classifier.lookback_days);
    weekly_insights(store, &key, days, status).await
}

pub async fn trending_report(
    store: &SqliteSnapshotStore,
    config: &Config,
    query: &DimensionQuery,
    lookback_days: Option<usize>,
    averaging: Option<RankAveraging>,
    limit: Option<usize>,
) -> Result<WeeklyTrending, ChartError> {
    let key = config.resolve_key(query)?;
    let days = lookback_days.unwrap_or(config.classifier.lookback_days);
    let averaging = averaging.unwrap_or(config.classifier.averaging);
    weekly_trending(store, &key, days, averaging, limit).await
}

pub async fn run_insights(
    config: &Config,
    query: &DimensionQuery,
    lookback_days: Option<usize>,
    status: Option<LifecycleStatus>,
    format: OutputFormat,
) -> Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let report = insights_report(&store, config, query, lookback_days, status).await?;

    if format == OutputFormat::Table {
        match (report.week_start, report.week_end) {
            (Some(start), Some(end)) => println!(
                "Week {} .. {}: {} new, {} re-entries\n",
                format_date(start),
                format_date(end),
                report.counts.new,
                report.counts.re_entry
            ),
            _ => println!("No snapshots for the selected filters.\n"),
        }
    }
    print!("{}", export::render(&report, format)?);

    store.close().await;
    Ok(())
}

pub async fn run_trending(
    config: &Config,
    query: &DimensionQuery,
    lookback_days: Option<usize>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let report = trending_report(&store, config, query, lookback_days, None, limit).await?;

    if format == OutputFormat::Table {
        match report.latest_snapshot {
            Some(date) if !report.previous_week.is_empty() => println!(
                "Latest {} against {} dates of the previous week\n",
                format_date(date),
                report.previous_week.len()
            ),
            _ => println!("Not enough history for a week-over-week comparison.\n"),
        }
    }
    print!("{}", export::render(&report, format)?);

    store.close().await;
    Ok(())
}
