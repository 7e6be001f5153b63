//! Week-over-week views: which apps entered the chart this week, and which
//! climbed furthest against last week's average.
//!
//! A "week" is the last `lookback_days` distinct snapshot dates for a key.
//! The previous week is the `lookback_days` distinct dates before the
//! current week starts. Gaps in collection simply shrink the calendar span.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::classify::{RankAveraging, ReportState};
use crate::dimension::DimensionKey;
use crate::error::{ChartError, Result};
use crate::models::{LifecycleStatus, Snapshot, SnapshotEntry};
use crate::store::SnapshotReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryCounts {
    #[serde(rename = "NEW")]
    pub new: usize,
    #[serde(rename = "RE-ENTRY")]
    pub re_entry: usize,
}

/// An app that showed up this week after being absent last week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightRow {
    pub app_id: String,
    pub app_name: String,
    pub country: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub status: LifecycleStatus,
    pub first_seen_date: NaiveDate,
    /// Rank on `first_seen_date`.
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyInsights {
    pub state: ReportState,
    pub week_start: Option<NaiveDate>,
    pub week_end: Option<NaiveDate>,
    pub latest_snapshot: Option<NaiveDate>,
    /// Tallies before any status filter.
    pub counts: EntryCounts,
    pub total: usize,
    pub rows: Vec<InsightRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingRow {
    pub app_id: String,
    pub app_name: String,
    pub developer_name: Option<String>,
    pub rank: i64,
    pub last_week_rank: i64,
    /// `last_week_rank - rank`; positive means the app climbed.
    pub rank_delta: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyTrending {
    pub state: ReportState,
    pub latest_snapshot: Option<NaiveDate>,
    pub previous_week: Vec<NaiveDate>,
    pub rows: Vec<TrendingRow>,
}

struct Weeks {
    /// Current week, oldest first.
    current: Vec<NaiveDate>,
    /// Previous week, most recent first.
    previous: Vec<NaiveDate>,
}

async fn resolve_weeks<R: SnapshotReader + ?Sized>(
    reader: &R,
    key: &DimensionKey,
    lookback_days: usize,
) -> Result<Option<Weeks>> {
    if lookback_days == 0 {
        return Err(ChartError::InvalidPolicy(
            "lookback_days must be >= 1".to_string(),
        ));
    }
    let mut current = reader.list_snapshot_dates(key, lookback_days).await?;
    let Some(&week_start) = current.last() else {
        return Ok(None);
    };
    let previous = reader
        .list_snapshot_dates_before(key, week_start, lookback_days)
        .await?;
    current.reverse();
    Ok(Some(Weeks { current, previous }))
}

async fn load_all<R: SnapshotReader + ?Sized>(
    reader: &R,
    key: &DimensionKey,
    dates: &[NaiveDate],
) -> Result<Vec<Snapshot>> {
    let mut out = Vec::with_capacity(dates.len());
    for date in dates {
        out.push(reader.load_snapshot(key, *date).await?);
    }
    Ok(out)
}

/// NEW and RE-ENTRY apps of the current week.
///
/// An app counts when it appears on some date of the current week but on
/// no date of the previous week. It is RE-ENTRY if it has any row before
/// the week start, else NEW. `status` filters the returned rows only.
pub async fn weekly_insights<R: SnapshotReader + ?Sized>(
    reader: &R,
    key: &DimensionKey,
    lookback_days: usize,
    status: Option<LifecycleStatus>,
) -> Result<WeeklyInsights> {
    let Some(weeks) = resolve_weeks(reader, key, lookback_days).await? else {
        return Ok(WeeklyInsights {
            state: ReportState::InsufficientHistory,
            week_start: None,
            week_end: None,
            latest_snapshot: None,
            counts: EntryCounts::default(),
            total: 0,
            rows: Vec::new(),
        });
    };
    let week_start = weeks.current[0];
    let week_end = weeks.current[weeks.current.len() - 1];

    let previous: HashSet<String> = load_all(reader, key, &weeks.previous)
        .await?
        .iter()
        .flat_map(|s| s.entries().iter().map(|e| e.app_id.clone()))
        .collect();

    // First sighting within the week, walking dates oldest first.
    let mut first_seen: Vec<(NaiveDate, SnapshotEntry)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for snapshot in load_all(reader, key, &weeks.current).await? {
        for entry in snapshot.entries() {
            if previous.contains(&entry.app_id) || !seen.insert(entry.app_id.clone()) {
                continue;
            }
            first_seen.push((snapshot.date, entry.clone()));
        }
    }

    let mut counts = EntryCounts::default();
    let mut rows = Vec::with_capacity(first_seen.len());
    for (date, entry) in first_seen {
        let existed = reader
            .has_appeared_before(key, &entry.app_id, week_start, None)
            .await?;
        let status = if existed {
            counts.re_entry += 1;
            LifecycleStatus::ReEntry
        } else {
            counts.new += 1;
            LifecycleStatus::New
        };
        rows.push(InsightRow {
            app_id: entry.app_id,
            app_name: entry.app_name,
            country: entry.country,
            category: entry.category,
            subcategory: entry.subcategory,
            status,
            first_seen_date: date,
            rank: entry.rank,
        });
    }

    if let Some(wanted) = status {
        rows.retain(|r| r.status == wanted);
    }
    rows.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.app_id.cmp(&b.app_id)));

    tracing::debug!(key = %key, %week_start, %week_end, rows = rows.len(), "weekly insights");

    Ok(WeeklyInsights {
        state: ReportState::Complete,
        week_start: Some(week_start),
        week_end: Some(week_end),
        latest_snapshot: Some(week_end),
        counts,
        total: rows.len(),
        rows,
    })
}

/// Apps on the latest date that were also charted last week, biggest
/// climbers first. `limit` caps the number of rows returned.
pub async fn weekly_trending<R: SnapshotReader + ?Sized>(
    reader: &R,
    key: &DimensionKey,
    lookback_days: usize,
    averaging: RankAveraging,
    limit: Option<usize>,
) -> Result<WeeklyTrending> {
    let Some(weeks) = resolve_weeks(reader, key, lookback_days).await? else {
        return Ok(WeeklyTrending {
            state: ReportState::InsufficientHistory,
            latest_snapshot: None,
            previous_week: Vec::new(),
            rows: Vec::new(),
        });
    };
    let latest_date = weeks.current[weeks.current.len() - 1];
    if weeks.previous.is_empty() {
        return Ok(WeeklyTrending {
            state: ReportState::InsufficientHistory,
            latest_snapshot: Some(latest_date),
            previous_week: Vec::new(),
            rows: Vec::new(),
        });
    }

    let latest = reader.load_snapshot(key, latest_date).await?;
    let mut history: HashMap<String, Vec<i64>> = HashMap::new();
    for snapshot in load_all(reader, key, &weeks.previous).await? {
        for entry in snapshot.entries() {
            history.entry(entry.app_id.clone()).or_default().push(entry.rank);
        }
    }

    let mut rows: Vec<TrendingRow> = latest
        .entries()
        .iter()
        .filter_map(|entry| {
            let last_week_rank = averaging.mean(history.get(&entry.app_id)?)?;
            Some(TrendingRow {
                app_id: entry.app_id.clone(),
                app_name: entry.app_name.clone(),
                developer_name: entry.developer_name.clone(),
                rank: entry.rank,
                last_week_rank,
                rank_delta: last_week_rank - entry.rank,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.rank_delta
            .cmp(&a.rank_delta)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.app_id.cmp(&b.app_id))
    });
    if let Some(limit) = limit {
        rows.truncate(limit);
    }

    Ok(WeeklyTrending {
        state: ReportState::Complete,
        latest_snapshot: Some(latest_date),
        previous_week: weeks.previous,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotRow;
    use crate::store::memory::InMemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn key() -> DimensionKey {
        DimensionKey::new("US", "top_free").with_category("Games")
    }

    fn put(store: &InMemoryStore, d: u32, apps: &[&str]) {
        for (i, app) in apps.iter().enumerate() {
            store.insert(SnapshotRow::new(day(d), "US", "top_free", "Games", None, i as i64 + 1, app, app));
        }
    }

    /// Days 1-2 are last week, days 3-4 this week (lookback 2).
    fn two_weeks() -> InMemoryStore {
        let store = InMemoryStore::new();
        put(&store, 1, &["a", "b", "old"]);
        put(&store, 2, &["a", "b", "c"]);
        put(&store, 3, &["b", "a", "d"]);
        put(&store, 4, &["d", "a", "b", "old"]);
        store
    }

    #[tokio::test]
    async fn test_insights_new_and_reentry() {
        let store = two_weeks();
        let report = weekly_insights(&store, &key(), 2, None).await.unwrap();
        assert_eq!(report.week_start, Some(day(3)));
        assert_eq!(report.week_end, Some(day(4)));

        let ids: Vec<&str> = report.rows.iter().map(|r| r.app_id.as_str()).collect();
        // "old" was on day 1, which is part of the previous week.
        assert_eq!(ids, vec!["d"]);
        assert_eq!(report.rows[0].status, LifecycleStatus::New);
        assert_eq!(report.rows[0].first_seen_date, day(3));
        assert_eq!(report.rows[0].rank, 3);
    }

    #[tokio::test]
    async fn test_insights_reentry_from_before_previous_week() {
        let store = two_weeks();
        let report = weekly_insights(&store, &key(), 1, None).await.unwrap();
        // Week = day 4, previous week = day 3.
        let old = report.rows.iter().find(|r| r.app_id == "old").unwrap();
        assert_eq!(old.status, LifecycleStatus::ReEntry);
        assert_eq!(report.counts, EntryCounts { new: 0, re_entry: 1 });

        let filtered = weekly_insights(&store, &key(), 1, Some(LifecycleStatus::New)).await.unwrap();
        assert!(filtered.rows.is_empty());
        assert_eq!(filtered.counts.re_entry, 1);
    }

    #[tokio::test]
    async fn test_insights_empty_store() {
        let store = InMemoryStore::new();
        let report = weekly_insights(&store, &key(), 7, None).await.unwrap();
        assert_eq!(report.state, ReportState::InsufficientHistory);
        assert!(report.rows.is_empty());
        assert_eq!(report.week_start, None);
    }

    #[tokio::test]
    async fn test_trending_sorted_by_delta() {
        let store = two_weeks();
        let report = weekly_trending(&store, &key(), 2, RankAveraging::Truncate, None)
            .await
            .unwrap();
        assert_eq!(report.latest_snapshot, Some(day(4)));
        assert_eq!(report.previous_week, vec![day(2), day(1)]);

        // a: 1,1 → 1, now 2. b: 2,2 → 2, now 3. old: 3 → now 4. d missed last week.
        let ids: Vec<(&str, i64)> = report.rows.iter().map(|r| (r.app_id.as_str(), r.rank_delta)).collect();
        assert_eq!(ids, vec![("a", -1), ("b", -1), ("old", -1)]);
    }

    #[tokio::test]
    async fn test_trending_limit_and_no_previous_week() {
        let store = two_weeks();
        let report = weekly_trending(&store, &key(), 2, RankAveraging::Round, Some(1))
            .await
            .unwrap();
        assert_eq!(report.rows.len(), 1);

        let report = weekly_trending(&store, &key(), 4, RankAveraging::Round, None)
            .await
            .unwrap();
        assert_eq!(report.state, ReportState::InsufficientHistory);
        assert!(report.rows.is_empty());
    }
}
