//! Lifecycle classifier: label every app in the latest snapshot and in its
//! lookback window as NEW, RE-ENTRY, DROPPED, UP, DOWN, or SAME.
//!
//! The engine works only through the [`SnapshotReader`] trait. The async
//! entry point [`classify`] gathers snapshots and existence facts; the pure
//! [`classify_snapshots`] does the labelling and is what the unit tests
//! exercise.
//!
//! # Algorithm
//!
//! 1. Fetch up to `lookback_days + 1` most recent dates for the key.
//!    Fewer than two → [`ReportState::InsufficientHistory`].
//! 2. The newest date is *current*; the rest form the *window*.
//! 3. For each app in `current ∪ window`:
//!    - an **entry** (see [`EntryRule`]) is `NEW` if it has no row before
//!      the current date, else `RE-ENTRY` ([`ReentryScope`] bounds how far
//!      back that check looks);
//!    - otherwise, present in both: `previous_rank` is the latest window rank
//!      ([`CompareMode::Pairwise`]) or the window mean
//!      ([`CompareMode::Windowed`], see [`RankAveraging`]);
//!      `delta = previous - current` picks `UP` / `DOWN` / `SAME`;
//!    - in the window but not current: `DROPPED`.
//! 4. Sort by current rank, then previous rank, absent values last.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::dimension::DimensionKey;
use crate::error::{ChartError, Result};
use crate::models::{LifecycleStatus, Snapshot, SnapshotEntry};
use crate::store::SnapshotReader;

/// What "previous rank" means for an app seen in both periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Most recent window observation.
    Pairwise,
    /// Mean of every window observation.
    #[default]
    Windowed,
}

/// How a windowed mean rank becomes an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankAveraging {
    /// Truncate toward zero. Matches historical reports.
    #[default]
    Truncate,
    /// Round half away from zero.
    Round,
}

/// How far back the NEW vs RE-ENTRY existence check reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentryScope {
    /// Any earlier date in the key's history.
    #[default]
    Unbounded,
    /// Only the window plus `lookback_days` calendar days before it.
    Bounded,
}

/// When an app present on the current date counts as having (re-)entered.
///
/// Pairwise mode only looks at the preceding snapshot, so it always
/// applies [`EntryRule::Preceding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRule {
    /// Absent from the snapshot immediately before the current one.
    #[default]
    Preceding,
    /// Absent from every snapshot in the window.
    Window,
}

macro_rules! policy_enum_str {
    ($ty:ty, $what:literal, { $($text:literal => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ChartError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(ChartError::InvalidPolicy(format!(
                        concat!("unknown ", $what, " '{}'. Use {}"),
                        other,
                        [$($text),+].join(" or ")
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let text = match self {
                    $($variant => $text,)+
                };
                f.write_str(text)
            }
        }
    };
}

policy_enum_str!(CompareMode, "mode", {
    "pairwise" => CompareMode::Pairwise,
    "windowed" => CompareMode::Windowed,
});
policy_enum_str!(RankAveraging, "averaging", {
    "truncate" => RankAveraging::Truncate,
    "round" => RankAveraging::Round,
});
policy_enum_str!(ReentryScope, "re-entry scope", {
    "unbounded" => ReentryScope::Unbounded,
    "bounded" => ReentryScope::Bounded,
});
policy_enum_str!(EntryRule, "entry rule", {
    "preceding" => EntryRule::Preceding,
    "window" => EntryRule::Window,
});

impl RankAveraging {
    /// Integer mean of `ranks`; `None` for an empty slice.
    pub fn mean(&self, ranks: &[i64]) -> Option<i64> {
        if ranks.is_empty() {
            return None;
        }
        let sum: i64 = ranks.iter().sum();
        let count = ranks.len() as i64;
        Some(match self {
            RankAveraging::Truncate => sum / count,
            RankAveraging::Round => (sum as f64 / count as f64).round() as i64,
        })
    }
}

/// Every knob the classifier honours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifierPolicy {
    pub lookback_days: usize,
    pub mode: CompareMode,
    pub averaging: RankAveraging,
    pub reentry_scope: ReentryScope,
    pub entry_rule: EntryRule,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            mode: CompareMode::default(),
            averaging: RankAveraging::default(),
            reentry_scope: ReentryScope::default(),
            entry_rule: EntryRule::default(),
        }
    }
}

impl ClassifierPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.lookback_days == 0 {
            return Err(ChartError::InvalidPolicy(
                "lookback_days must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The entry rule actually applied under this policy's mode.
    pub fn effective_entry_rule(&self) -> EntryRule {
        match self.mode {
            CompareMode::Pairwise => EntryRule::Preceding,
            CompareMode::Windowed => self.entry_rule,
        }
    }
}

/// One labelled app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedApp {
    pub app_id: String,
    pub app_name: String,
    pub developer_name: Option<String>,
    pub country: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub current_rank: Option<i64>,
    pub previous_rank: Option<i64>,
    pub delta: Option<i64>,
    pub status: LifecycleStatus,
}

/// Whether a report carries a real comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Complete,
    /// Fewer than two snapshot dates for the key.
    InsufficientHistory,
    /// The current date resolved to zero rows.
    EmptyContext,
}

impl ReportState {
    /// `InsufficientHistory` and `EmptyContext` are both "nothing to show yet".
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportState::Complete)
    }
}

/// Per-status tallies of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "NEW")]
    pub new: usize,
    #[serde(rename = "RE-ENTRY")]
    pub re_entry: usize,
    #[serde(rename = "DROPPED")]
    pub dropped: usize,
    #[serde(rename = "UP")]
    pub up: usize,
    #[serde(rename = "DOWN")]
    pub down: usize,
    #[serde(rename = "SAME")]
    pub same: usize,
}

impl StatusCounts {
    pub fn tally(rows: &[ClassifiedApp]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            counts.add(row.status);
        }
        counts
    }

    pub fn add(&mut self, status: LifecycleStatus) {
        match status {
            LifecycleStatus::New => self.new += 1,
            LifecycleStatus::ReEntry => self.re_entry += 1,
            LifecycleStatus::Dropped => self.dropped += 1,
            LifecycleStatus::MoverUp => self.up += 1,
            LifecycleStatus::MoverDown => self.down += 1,
            LifecycleStatus::Same => self.same += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.new + self.re_entry + self.dropped + self.up + self.down + self.same
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleReport {
    pub state: ReportState,
    pub key: DimensionKey,
    pub policy: ClassifierPolicy,
    pub current_date: Option<NaiveDate>,
    /// Window dates, most recent first.
    pub window_dates: Vec<NaiveDate>,
    pub counts: StatusCounts,
    pub rows: Vec<ClassifiedApp>,
}

impl LifecycleReport {
    fn terminal(
        state: ReportState,
        key: &DimensionKey,
        policy: &ClassifierPolicy,
        current_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            state,
            key: key.clone(),
            policy: policy.clone(),
            current_date,
            window_dates: Vec::new(),
            counts: StatusCounts::default(),
            rows: Vec::new(),
        }
    }

    /// Keep only rows with `status`. Counts are left as computed.
    pub fn retain_status(&mut self, status: LifecycleStatus) {
        self.rows.retain(|r| r.status == status);
    }
}

/// Per-app view of the window snapshots.
#[derive(Debug, Default)]
pub struct WindowSummary<'a> {
    /// Ranks in window order (most recent first).
    ranks: HashMap<&'a str, Vec<i64>>,
    /// Entry from the most recent window date the app appears on.
    latest: HashMap<&'a str, &'a SnapshotEntry>,
    /// Apps present in the snapshot right before the current one.
    preceding: HashSet<&'a str>,
    /// First-seen order, for deterministic iteration.
    order: Vec<&'a str>,
}

impl<'a> WindowSummary<'a> {
    /// `window` must be ordered most recent first.
    pub fn build(window: &'a [Snapshot]) -> Self {
        let mut summary = WindowSummary::default();
        for (i, snapshot) in window.iter().enumerate() {
            for entry in snapshot.entries() {
                let id = entry.app_id.as_str();
                if i == 0 {
                    summary.preceding.insert(id);
                }
                summary.ranks.entry(id).or_default().push(entry.rank);
                summary.latest.entry(id).or_insert_with(|| {
                    summary.order.push(id);
                    entry
                });
            }
        }
        summary
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.ranks.contains_key(app_id)
    }

    pub fn in_preceding(&self, app_id: &str) -> bool {
        self.preceding.contains(app_id)
    }

    pub fn ranks(&self, app_id: &str) -> &[i64] {
        self.ranks.get(app_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Baseline rank for `app_id` under `mode`.
    pub fn previous_rank(
        &self,
        app_id: &str,
        mode: CompareMode,
        averaging: RankAveraging,
    ) -> Option<i64> {
        let ranks = self.ranks.get(app_id)?;
        match mode {
            CompareMode::Pairwise => ranks.first().copied(),
            CompareMode::Windowed => averaging.mean(ranks),
        }
    }

    fn is_entry(&self, app_id: &str, rule: EntryRule) -> bool {
        match rule {
            EntryRule::Preceding => !self.in_preceding(app_id),
            EntryRule::Window => !self.contains(app_id),
        }
    }
}

/// Apps in `current` that need a NEW vs RE-ENTRY existence check.
pub fn entry_candidates<'a>(
    current: &'a Snapshot,
    summary: &WindowSummary<'_>,
    rule: EntryRule,
) -> Vec<&'a str> {
    current
        .entries()
        .iter()
        .map(|e| e.app_id.as_str())
        .filter(|id| summary.is_entry(id, rule))
        .collect()
}

/// Label every app in `current ∪ window`.
///
/// `window` is ordered most recent first. `seen_before` holds the entry
/// candidates that do have an earlier row; every other candidate is NEW.
pub fn classify_snapshots(
    current: &Snapshot,
    window: &[Snapshot],
    policy: &ClassifierPolicy,
    seen_before: &HashSet<String>,
) -> Vec<ClassifiedApp> {
    let summary = WindowSummary::build(window);
    let mut rows: Vec<ClassifiedApp> = Vec::with_capacity(current.len() + summary.order.len());

    let rule = policy.effective_entry_rule();
    for entry in current.entries() {
        let id = entry.app_id.as_str();
        let (previous_rank, delta, status) = if summary.is_entry(id, rule) {
            let status = if seen_before.contains(id) {
                LifecycleStatus::ReEntry
            } else {
                LifecycleStatus::New
            };
            (None, None, status)
        } else {
            match summary.previous_rank(id, policy.mode, policy.averaging) {
                Some(prev) => {
                    let delta = prev - entry.rank;
                    (Some(prev), Some(delta), LifecycleStatus::from_delta(delta))
                }
                None => (None, None, LifecycleStatus::New),
            }
        };
        rows.push(row_from(entry, Some(entry.rank), previous_rank, delta, status));
    }

    for id in &summary.order {
        if current.contains(id) {
            continue;
        }
        let latest = summary.latest[id];
        let previous_rank = summary.previous_rank(id, policy.mode, policy.averaging);
        rows.push(row_from(latest, None, previous_rank, None, LifecycleStatus::Dropped));
    }

    sort_rows(&mut rows);
    rows
}

fn row_from(
    entry: &SnapshotEntry,
    current_rank: Option<i64>,
    previous_rank: Option<i64>,
    delta: Option<i64>,
    status: LifecycleStatus,
) -> ClassifiedApp {
    ClassifiedApp {
        app_id: entry.app_id.clone(),
        app_name: entry.app_name.clone(),
        developer_name: entry.developer_name.clone(),
        country: entry.country.clone(),
        category: entry.category.clone(),
        subcategory: entry.subcategory.clone(),
        current_rank,
        previous_rank,
        delta,
        status,
    }
}

/// Ascending with `None` last.
fn cmp_rank(a: Option<i64>, b: Option<i64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Sort by current rank, then previous rank (absent last), then app id.
pub fn sort_rows(rows: &mut [ClassifiedApp]) {
    rows.sort_by(|a, b| {
        cmp_rank(a.current_rank, b.current_rank)
            .then_with(|| cmp_rank(a.previous_rank, b.previous_rank))
            .then_with(|| a.app_id.cmp(&b.app_id))
    });
}

/// Lower bound for the RE-ENTRY existence check under `scope`.
fn reentry_since(
    scope: ReentryScope,
    window_dates: &[NaiveDate],
    lookback_days: usize,
) -> Option<NaiveDate> {
    match scope {
        ReentryScope::Unbounded => None,
        ReentryScope::Bounded => window_dates
            .last()
            .and_then(|oldest| oldest.checked_sub_days(Days::new(lookback_days as u64))),
    }
}

/// Classify the latest snapshot of `key` against its lookback window.
///
/// "No data" outcomes are reports with a terminal [`ReportState`], never
/// errors.
///
/// # Errors
///
/// [`ChartError::InvalidPolicy`] for `lookback_days == 0`, and
/// [`ChartError::Store`] when the reader fails.
pub async fn classify<R: SnapshotReader + ?Sized>(
    reader: &R,
    key: &DimensionKey,
    policy: &ClassifierPolicy,
) -> Result<LifecycleReport> {
    policy.validate()?;

    let dates_desc = reader
        .list_snapshot_dates(key, policy.lookback_days + 1)
        .await?;
    if dates_desc.len() < 2 {
        tracing::debug!(key = %key, dates = dates_desc.len(), "insufficient history");
        return Ok(LifecycleReport::terminal(
            ReportState::InsufficientHistory,
            key,
            policy,
            dates_desc.first().copied(),
        ));
    }

    let current_date = dates_desc[0];
    let window_dates = dates_desc[1..].to_vec();

    let current = reader.load_snapshot(key, current_date).await?;
    if current.is_empty() {
        return Ok(LifecycleReport::terminal(
            ReportState::EmptyContext,
            key,
            policy,
            Some(current_date),
        ));
    }

    let mut window = Vec::with_capacity(window_dates.len());
    for date in &window_dates {
        window.push(reader.load_snapshot(key, *date).await?);
    }

    let since = reentry_since(policy.reentry_scope, &window_dates, policy.lookback_days);
    let mut seen_before = HashSet::new();
    {
        let summary = WindowSummary::build(&window);
        for app_id in entry_candidates(&current, &summary, policy.effective_entry_rule()) {
            if reader
                .has_appeared_before(key, app_id, current_date, since)
                .await?
            {
                seen_before.insert(app_id.to_string());
            }
        }
    }

    let rows = classify_snapshots(&current, &window, policy, &seen_before);
    let counts = StatusCounts::tally(&rows);

    tracing::debug!(
        key = %key,
        current = %current_date,
        window = window_dates.len(),
        rows = rows.len(),
        "classified snapshot"
    );

    Ok(LifecycleReport {
        state: ReportState::Complete,
        key: key.clone(),
        policy: policy.clone(),
        current_date: Some(current_date),
        window_dates,
        counts,
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

    fn entry(app: &str, rank: i64) -> SnapshotEntry {
        SnapshotEntry {
            app_id: app.to_string(),
            rank,
            app_name: format!("App {}", app),
            developer_name: Some("Dev".to_string()),
            country: "US".to_string(),
            category: "Games".to_string(),
            subcategory: None,
        }
    }

    fn snap(d: u32, apps: &[(&str, i64)]) -> Snapshot {
        Snapshot::from_entries(day(d), apps.iter().map(|(a, r)| entry(a, *r)))
    }

    fn find<'a>(rows: &'a [ClassifiedApp], app: &str) -> &'a ClassifiedApp {
        rows.iter().find(|r| r.app_id == app).unwrap()
    }

    fn key() -> DimensionKey {
        DimensionKey::new("US", "top_free").with_category("Games")
    }

    fn row(d: u32, rank: i64, app: &str) -> SnapshotRow {
        SnapshotRow::new(day(d), "US", "top_free", "Games", None, rank, app, app)
    }

    #[test]
    fn test_mean_truncates_toward_zero() {
        assert_eq!(RankAveraging::Truncate.mean(&[1, 2]), Some(1));
        assert_eq!(RankAveraging::Truncate.mean(&[2, 3, 3]), Some(2));
        assert_eq!(RankAveraging::Round.mean(&[1, 2]), Some(2));
        assert_eq!(RankAveraging::Round.mean(&[2, 3, 3]), Some(3));
        assert_eq!(RankAveraging::Truncate.mean(&[]), None);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Pairwise".parse::<CompareMode>().unwrap(), CompareMode::Pairwise);
        assert_eq!("round".parse::<RankAveraging>().unwrap(), RankAveraging::Round);
        assert_eq!("bounded".parse::<ReentryScope>().unwrap(), ReentryScope::Bounded);
        assert_eq!("window".parse::<EntryRule>().unwrap(), EntryRule::Window);
        assert!("weekly".parse::<CompareMode>().is_err());
        assert_eq!(CompareMode::Windowed.to_string(), "windowed");
    }

    #[test]
    fn test_zero_lookback_rejected() {
        let policy = ClassifierPolicy {
            lookback_days: 0,
            ..ClassifierPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ChartError::InvalidPolicy(_))));
    }

    #[test]
    fn test_windowed_previous_rank_is_mean() {
        let current = snap(7, &[("a", 4)]);
        let window = vec![snap(6, &[("a", 1)]), snap(5, &[("a", 2)]), snap(4, &[("a", 4)])];
        let rows = classify_snapshots(&current, &window, &ClassifierPolicy::default(), &HashSet::new());
        let a = find(&rows, "a");
        // (1 + 2 + 4) / 3 = 2.33 → 2
        assert_eq!(a.previous_rank, Some(2));
        assert_eq!(a.delta, Some(-2));
        assert_eq!(a.status, LifecycleStatus::MoverDown);
    }

    #[test]
    fn test_pairwise_previous_rank_is_latest() {
        let current = snap(7, &[("e", 15)]);
        let window = vec![snap(6, &[("e", 20)]), snap(5, &[("e", 1)])];
        let policy = ClassifierPolicy {
            mode: CompareMode::Pairwise,
            ..ClassifierPolicy::default()
        };
        let rows = classify_snapshots(&current, &window, &policy, &HashSet::new());
        let e = find(&rows, "e");
        assert_eq!(e.previous_rank, Some(20));
        assert_eq!(e.delta, Some(5));
        assert_eq!(e.status, LifecycleStatus::MoverUp);
    }

    #[test]
    fn test_entry_rule_preceding_vs_window() {
        // c was in the window on day 1 but not on day 6.
        let current = snap(7, &[("c", 8)]);
        let window = vec![snap(6, &[("x", 1)]), snap(1, &[("c", 3)])];
        let seen: HashSet<String> = ["c".to_string()].into_iter().collect();

        let preceding = classify_snapshots(&current, &window, &ClassifierPolicy::default(), &seen);
        assert_eq!(find(&preceding, "c").status, LifecycleStatus::ReEntry);
        assert_eq!(find(&preceding, "c").previous_rank, None);

        let policy = ClassifierPolicy {
            entry_rule: EntryRule::Window,
            ..ClassifierPolicy::default()
        };
        let window_rule = classify_snapshots(&current, &window, &policy, &seen);
        assert_eq!(find(&window_rule, "c").status, LifecycleStatus::MoverDown);
        assert_eq!(find(&window_rule, "c").previous_rank, Some(3));
    }

    #[test]
    fn test_pairwise_ignores_window_entry_rule() {
        let current = snap(7, &[("c", 8)]);
        let window = vec![snap(6, &[("x", 1)]), snap(1, &[("c", 3)])];
        let seen: HashSet<String> = ["c".to_string()].into_iter().collect();

        let policy = ClassifierPolicy {
            mode: CompareMode::Pairwise,
            entry_rule: EntryRule::Window,
            ..ClassifierPolicy::default()
        };
        assert_eq!(policy.effective_entry_rule(), EntryRule::Preceding);

        let rows = classify_snapshots(&current, &window, &policy, &seen);
        let c = find(&rows, "c");
        assert_eq!(c.status, LifecycleStatus::ReEntry);
        assert_eq!(c.previous_rank, None);
        assert_eq!(c.delta, None);
    }

    #[test]
    fn test_dropped_uses_latest_descriptive_fields() {
        let current = snap(7, &[("a", 1)]);
        let mut renamed = entry("d", 2);
        renamed.app_name = "D Renamed".to_string();
        let window = vec![
            Snapshot::from_entries(day(6), vec![entry("a", 1), renamed]),
            snap(5, &[("a", 1), ("d", 4)]),
        ];
        let rows = classify_snapshots(&current, &window, &ClassifierPolicy::default(), &HashSet::new());
        let d = find(&rows, "d");
        assert_eq!(d.status, LifecycleStatus::Dropped);
        assert_eq!(d.app_name, "D Renamed");
        assert_eq!(d.current_rank, None);
        assert_eq!(d.previous_rank, Some(3));
        assert_eq!(d.delta, None);
    }

    #[test]
    fn test_sort_order_absent_last() {
        let current = snap(7, &[("a", 2), ("b", 1)]);
        let window = vec![snap(6, &[("a", 1), ("z", 3), ("y", 2)])];
        let rows = classify_snapshots(&current, &window, &ClassifierPolicy::default(), &HashSet::new());
        let ids: Vec<&str> = rows.iter().map(|r| r.app_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "y", "z"]);
    }

    #[test]
    fn test_partition_and_sign_convention() {
        let current = snap(7, &[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        let window = vec![
            snap(6, &[("b", 1), ("a", 2), ("c", 3), ("e", 4)]),
            snap(5, &[("f", 1), ("a", 2)]),
        ];
        let rows = classify_snapshots(&current, &window, &ClassifierPolicy::default(), &HashSet::new());

        let mut ids: Vec<&str> = rows.iter().map(|r| r.app_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e", "f"]);

        for r in &rows {
            if let (Some(prev), Some(cur)) = (r.previous_rank, r.current_rank) {
                assert_eq!(r.status == LifecycleStatus::MoverUp, prev > cur);
                assert_eq!(r.status == LifecycleStatus::MoverDown, prev < cur);
                assert_eq!(r.status == LifecycleStatus::Same, prev == cur);
            }
        }
        assert_eq!(find(&rows, "d").status, LifecycleStatus::New);
        assert_eq!(find(&rows, "f").status, LifecycleStatus::Dropped);
    }

    #[tokio::test]
    async fn test_empty_store_is_insufficient_history() {
        let store = InMemoryStore::new();
        let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
        assert_eq!(report.state, ReportState::InsufficientHistory);
        assert!(report.state.is_terminal());
        assert!(report.rows.is_empty());
        assert_eq!(report.current_date, None);
    }

    #[tokio::test]
    async fn test_single_date_is_insufficient_history() {
        let store = InMemoryStore::new();
        store.insert(row(7, 1, "a"));
        let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
        assert_eq!(report.state, ReportState::InsufficientHistory);
        assert_eq!(report.current_date, Some(day(7)));
    }

    #[tokio::test]
    async fn test_bounded_reentry_scope() {
        let store = InMemoryStore::new();
        // Seen long ago, then absent, then back on the current date.
        store.insert(row(1, 1, "old"));
        store.insert(row(20, 1, "x"));
        store.insert(row(21, 1, "x"));
        store.insert(row(21, 2, "old"));

        let unbounded = ClassifierPolicy {
            lookback_days: 1,
            ..ClassifierPolicy::default()
        };
        let report = classify(&store, &key(), &unbounded).await.unwrap();
        assert_eq!(find(&report.rows, "old").status, LifecycleStatus::ReEntry);

        let bounded = ClassifierPolicy {
            lookback_days: 1,
            reentry_scope: ReentryScope::Bounded,
            ..ClassifierPolicy::default()
        };
        let report = classify(&store, &key(), &bounded).await.unwrap();
        assert_eq!(find(&report.rows, "old").status, LifecycleStatus::New);
    }

    #[tokio::test]
    async fn test_classify_is_idempotent() {
        let store = InMemoryStore::new();
        for d in 1..=4 {
            store.insert(row(d, 1, "a"));
            store.insert(row(d, 2, if d % 2 == 0 { "b" } else { "c" }));
        }
        let policy = ClassifierPolicy::default();
        let first = classify(&store, &key(), &policy).await.unwrap();
        let second = classify(&store, &key(), &policy).await.unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.counts, second.counts);
        assert_eq!(first.counts.total(), first.rows.len());
    }
}
