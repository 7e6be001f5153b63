//! Core data models: ranked snapshot rows, loaded snapshots, and the
//! lifecycle labels attached to apps when two points in time are compared.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ChartError, Result};

/// Storage and wire format for snapshot dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| ChartError::InvalidDate(s.to_string()))
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// One ranked row as produced by the chart collector.
///
/// `(snapshot_date, country, chart_type, category, subcategory, rank)` and
/// `(snapshot_date, country, chart_type, category, subcategory, app_id)`
/// are both unique in a well-formed store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub snapshot_date: NaiveDate,
    pub country: String,
    pub chart_type: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub rank: i64,
    pub app_id: String,
    pub app_name: String,
    pub developer_name: Option<String>,
    pub bundle_id: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub rating: Option<f64>,
    pub ratings_count: Option<i64>,
}

impl SnapshotRow {
    /// Minimal row with the descriptive extras left empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        snapshot_date: NaiveDate,
        country: &str,
        chart_type: &str,
        category: &str,
        subcategory: Option<&str>,
        rank: i64,
        app_id: &str,
        app_name: &str,
    ) -> Self {
        Self {
            snapshot_date,
            country: country.to_string(),
            chart_type: chart_type.to_string(),
            category: category.to_string(),
            subcategory: subcategory.filter(|s| !s.is_empty()).map(str::to_string),
            rank,
            app_id: app_id.to_string(),
            app_name: app_name.to_string(),
            developer_name: None,
            bundle_id: None,
            price: None,
            currency: None,
            rating: None,
            ratings_count: None,
        }
    }

    pub fn to_entry(&self) -> SnapshotEntry {
        SnapshotEntry {
            app_id: self.app_id.clone(),
            rank: self.rank,
            app_name: self.app_name.clone(),
            developer_name: self.developer_name.clone(),
            country: self.country.clone(),
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
        }
    }
}

/// What a reader returns for one app on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub app_id: String,
    pub rank: i64,
    pub app_name: String,
    pub developer_name: Option<String>,
    pub country: String,
    pub category: String,
    pub subcategory: Option<String>,
}

/// All entries for one dimension key on one date, ordered by rank.
///
/// Holds at most one entry per `app_id`. When a key leaves a filter unset
/// (e.g. any subcategory) the same app can occur in several chart contexts
/// on the same day; the best-ranked occurrence wins.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub date: NaiveDate,
    entries: Vec<SnapshotEntry>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_entries(date: NaiveDate, entries: impl IntoIterator<Item = SnapshotEntry>) -> Self {
        let mut best: HashMap<String, SnapshotEntry> = HashMap::new();
        for entry in entries {
            match best.get(&entry.app_id) {
                Some(existing) if existing.rank <= entry.rank => {}
                _ => {
                    best.insert(entry.app_id.clone(), entry);
                }
            }
        }

        let mut entries: Vec<SnapshotEntry> = best.into_values().collect();
        entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.app_id.cmp(&b.app_id)));

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.app_id.clone(), i))
            .collect();

        Self {
            date,
            entries,
            index,
        }
    }

    pub fn get(&self, app_id: &str) -> Option<&SnapshotEntry> {
        self.index.get(app_id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.index.contains_key(app_id)
    }

    /// First entry holding `rank`, if any.
    pub fn at_rank(&self, rank: i64) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.rank == rank)
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the ranks are exactly `1..=len` with no gaps or duplicates.
    pub fn has_contiguous_ranks(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.rank == i as i64 + 1)
    }
}

/// Lifecycle label for one app relative to a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleStatus {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "RE-ENTRY")]
    ReEntry,
    #[serde(rename = "DROPPED")]
    Dropped,
    #[serde(rename = "UP")]
    MoverUp,
    #[serde(rename = "DOWN")]
    MoverDown,
    #[serde(rename = "SAME")]
    Same,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::New => "NEW",
            LifecycleStatus::ReEntry => "RE-ENTRY",
            LifecycleStatus::Dropped => "DROPPED",
            LifecycleStatus::MoverUp => "UP",
            LifecycleStatus::MoverDown => "DOWN",
            LifecycleStatus::Same => "SAME",
        }
    }

    /// Status for an app present in both the baseline and the current snapshot.
    ///
    /// Lower rank numbers are better, so a positive `previous - current`
    /// delta means the app climbed.
    pub fn from_delta(delta: i64) -> Self {
        match delta {
            d if d > 0 => LifecycleStatus::MoverUp,
            d if d < 0 => LifecycleStatus::MoverDown,
            _ => LifecycleStatus::Same,
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', "-");
        match normalized.as_str() {
            "NEW" => Ok(LifecycleStatus::New),
            "RE-ENTRY" | "REENTRY" => Ok(LifecycleStatus::ReEntry),
            "DROPPED" | "OUT" => Ok(LifecycleStatus::Dropped),
            "UP" | "MOVER-UP" => Ok(LifecycleStatus::MoverUp),
            "DOWN" | "MOVER-DOWN" => Ok(LifecycleStatus::MoverDown),
            "SAME" | "IN-TOP" => Ok(LifecycleStatus::Same),
            _ => Err(ChartError::InvalidPolicy(format!(
                "unknown status '{}'. Use NEW, RE-ENTRY, DROPPED, UP, DOWN, or SAME",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(app_id: &str, rank: i64) -> SnapshotEntry {
        SnapshotEntry {
            app_id: app_id.to_string(),
            rank,
            app_name: app_id.to_uppercase(),
            developer_name: None,
            country: "US".to_string(),
            category: "Games".to_string(),
            subcategory: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_parse_and_format_date() {
        let d = parse_date("2025-10-07").unwrap();
        assert_eq!(format_date(d), "2025-10-07");
        assert!(matches!(
            parse_date("07/10/2025"),
            Err(ChartError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_snapshot_orders_by_rank() {
        let snap = Snapshot::from_entries(day(1), vec![entry("b", 2), entry("c", 3), entry("a", 1)]);
        let ids: Vec<&str> = snap.entries().iter().map(|e| e.app_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(snap.has_contiguous_ranks());
        assert_eq!(snap.get("c").map(|e| e.rank), Some(3));
        assert_eq!(snap.at_rank(2).map(|e| e.app_id.as_str()), Some("b"));
    }

    #[test]
    fn test_snapshot_keeps_best_rank_per_app() {
        let snap = Snapshot::from_entries(day(1), vec![entry("a", 7), entry("a", 2), entry("b", 1)]);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("a").map(|e| e.rank), Some(2));
    }

    #[test]
    fn test_rank_gap_detected() {
        let snap = Snapshot::from_entries(day(1), vec![entry("a", 1), entry("b", 3)]);
        assert!(!snap.has_contiguous_ranks());

        let dup = Snapshot::from_entries(day(1), vec![entry("a", 1), entry("b", 1)]);
        assert!(!dup.has_contiguous_ranks());
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = Snapshot::empty(day(3));
        assert!(snap.is_empty());
        assert!(snap.has_contiguous_ranks());
        assert!(!snap.contains("a"));
    }

    #[test]
    fn test_status_from_delta() {
        assert_eq!(LifecycleStatus::from_delta(5), LifecycleStatus::MoverUp);
        assert_eq!(LifecycleStatus::from_delta(-1), LifecycleStatus::MoverDown);
        assert_eq!(LifecycleStatus::from_delta(0), LifecycleStatus::Same);
    }

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!("re-entry".parse::<LifecycleStatus>().unwrap(), LifecycleStatus::ReEntry);
        assert_eq!("RE_ENTRY".parse::<LifecycleStatus>().unwrap(), LifecycleStatus::ReEntry);
        assert_eq!("mover_up".parse::<LifecycleStatus>().unwrap(), LifecycleStatus::MoverUp);
        assert_eq!("IN_TOP".parse::<LifecycleStatus>().unwrap(), LifecycleStatus::Same);
        assert!("sideways".parse::<LifecycleStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_as_wire_label() {
        let json = serde_json::to_string(&LifecycleStatus::ReEntry).unwrap();
        assert_eq!(json, "\"RE-ENTRY\"");
        assert_eq!(LifecycleStatus::MoverDown.to_string(), "DOWN");
    }
}
