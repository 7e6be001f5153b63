//! `chartwatch compare`: classify the latest snapshot against its window.

use anyhow::Result;
use chartwatch_core::classify::{
    classify, ClassifierPolicy, CompareMode, EntryRule, LifecycleReport, RankAveraging,
    ReentryScope,
};
use chartwatch_core::dimension::DimensionQuery;
use chartwatch_core::models::{format_date, LifecycleStatus};
use chartwatch_core::ChartError;

use crate::config::Config;
use crate::export::{self, OutputFormat};
use crate::sqlite_store::SqliteSnapshotStore;

/// Per-request overrides of the configured classifier policy.
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    pub lookback_days: Option<usize>,
    pub mode: Option<CompareMode>,
    pub averaging: Option<RankAveraging>,
    pub reentry_scope: Option<ReentryScope>,
    pub entry_rule: Option<EntryRule>,
    pub status: Option<LifecycleStatus>,
}

impl CompareOptions {
    pub fn apply(&self, mut policy: ClassifierPolicy) -> ClassifierPolicy {
        if let Some(days) = self.lookback_days {
            policy.lookback_days = days;
        }
        if let Some(mode) = self.mode {
            policy.mode = mode;
        }
        if let Some(averaging) = self.averaging {
            policy.averaging = averaging;
        }
        if let Some(scope) = self.reentry_scope {
            policy.reentry_scope = scope;
        }
        if let Some(rule) = self.entry_rule {
            policy.entry_rule = rule;
        }
        policy
    }
}

/// Build a lifecycle report for `query`. Shared by the CLI and HTTP server.
pub async fn compare_report(
    store: &SqliteSnapshotStore,
    config: &Config,
    query: &DimensionQuery,
    options: &CompareOptions,
) -> Result<LifecycleReport, ChartError> {
    let key = config.resolve_key(query)?;
    let policy = options.apply(config.classifier_policy());
    let mut report = classify(store, &key, &policy).await?;
    if let Some(status) = options.status {
        report.retain_status(status);
    }
    Ok(report)
}

pub async fn run_compare(
    config: &Config,
    query: &DimensionQuery,
    options: &CompareOptions,
    format: OutputFormat,
) -> Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let report = compare_report(&store, config, query, options).await?;

    if format == OutputFormat::Table {
        print_summary(&report);
    }
    print!("{}", export::render(&report, format)?);

    store.close().await;
    Ok(())
}

fn print_summary(report: &LifecycleReport) {
    if report.state.is_terminal() {
        println!(
            "No comparison for {}: {:?} (need at least two snapshot dates).",
            report.key, report.state
        );
        return;
    }
    let current = report.current_date.map(format_date).unwrap_or_default();
    let oldest = report.window_dates.last().copied().map(format_date).unwrap_or_default();
    let c = &report.counts;
    println!(
        "{}  {} vs {} dates back to {} ({} mode, lookback {})",
        report.key,
        current,
        report.window_dates.len(),
        oldest,
        report.policy.mode,
        report.policy.lookback_days
    );
    println!(
        "NEW {}  RE-ENTRY {}  DROPPED {}  UP {}  DOWN {}  SAME {}",
        c.new, c.re_entry, c.dropped, c.up, c.down, c.same
    );
    println!();
}
