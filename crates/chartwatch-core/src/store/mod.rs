//! Read access to stored chart snapshots.
//!
//! The [`SnapshotReader`] trait is the only thing the comparison engines
//! know about storage. Every method is a pure read; "no rows" is an empty
//! result, never an error.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::dimension::DimensionKey;
use crate::models::Snapshot;

/// Abstract snapshot store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_snapshot_dates`](SnapshotReader::list_snapshot_dates) | Most recent distinct dates for a key |
/// | [`list_snapshot_dates_before`](SnapshotReader::list_snapshot_dates_before) | Same, strictly before a date |
/// | [`load_snapshot`](SnapshotReader::load_snapshot) | One app → entry mapping for a key and date |
/// | [`has_appeared_before`](SnapshotReader::has_appeared_before) | Single existence check for an app |
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    /// Distinct dates with at least one row matching `key`, most recent
    /// first, at most `max_count` of them.
    async fn list_snapshot_dates(
        &self,
        key: &DimensionKey,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>>;

    /// Like [`list_snapshot_dates`](SnapshotReader::list_snapshot_dates)
    /// but only dates strictly before `before`.
    async fn list_snapshot_dates_before(
        &self,
        key: &DimensionKey,
        before: NaiveDate,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>>;

    /// All entries matching `key` on `date`, one per app, ordered by rank.
    /// An empty snapshot when nothing was recorded.
    async fn load_snapshot(&self, key: &DimensionKey, date: NaiveDate) -> Result<Snapshot>;

    /// Whether `app_id` has a row matching `key` on some date in
    /// `[since, before)`; `since = None` searches the whole history.
    ///
    /// Must be answerable with one indexed lookup, not a history scan.
    async fn has_appeared_before(
        &self,
        key: &DimensionKey,
        app_id: &str,
        before: NaiveDate,
        since: Option<NaiveDate>,
    ) -> Result<bool>;
}

/// Log a warning when a snapshot for a fully pinned key breaks rank
/// conservation (ranks must be exactly `1..=n`). Returns whether it held.
///
/// Keys with unset filters merge several chart contexts, so duplicate
/// ranks are expected there and nothing is checked.
pub fn check_rank_conservation(key: &DimensionKey, snapshot: &Snapshot) -> bool {
    if !key.is_fully_resolved() || snapshot.has_contiguous_ranks() {
        return true;
    }
    tracing::warn!(
        key = %key,
        date = %snapshot.date,
        entries = snapshot.len(),
        "snapshot ranks are not contiguous from 1"
    );
    false
}

/// Clamp a `usize` limit to what SQL `LIMIT` accepts.
pub fn sql_limit(max_count: usize) -> i64 {
    i64::try_from(max_count).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::SubcategoryFilter;
    use crate::models::SnapshotEntry;

    fn entry(app_id: &str, rank: i64) -> SnapshotEntry {
        SnapshotEntry {
            app_id: app_id.to_string(),
            rank,
            app_name: app_id.to_string(),
            developer_name: None,
            country: "US".to_string(),
            category: "Games".to_string(),
            subcategory: None,
        }
    }

    fn snapshot(ranks: &[(&str, i64)]) -> Snapshot {
        let date = NaiveDate::from_ymd_opt(2025, 10, 7).unwrap();
        Snapshot::from_entries(date, ranks.iter().map(|(id, rank)| entry(id, *rank)))
    }

    fn pinned_key() -> DimensionKey {
        DimensionKey::new("US", "top_free")
            .with_category("Games")
            .with_subcategory(SubcategoryFilter::None)
    }

    #[test]
    fn test_rank_gap_fails_for_pinned_key() {
        let gap = snapshot(&[("a", 1), ("b", 3)]);
        assert!(!check_rank_conservation(&pinned_key(), &gap));

        let duplicate = snapshot(&[("a", 1), ("b", 1)]);
        assert!(!check_rank_conservation(&pinned_key(), &duplicate));
    }

    #[test]
    fn test_contiguous_ranks_hold_for_pinned_key() {
        let ranks = snapshot(&[("a", 1), ("b", 2), ("c", 3)]);
        assert!(check_rank_conservation(&pinned_key(), &ranks));
        assert!(check_rank_conservation(&pinned_key(), &snapshot(&[])));
    }

    #[test]
    fn test_partial_keys_skip_the_check() {
        let merged = snapshot(&[("a", 1), ("b", 1), ("c", 4)]);

        let any_subcategory = DimensionKey::new("US", "top_free").with_category("Games");
        assert!(!any_subcategory.is_fully_resolved());
        assert!(check_rank_conservation(&any_subcategory, &merged));

        let no_category = DimensionKey::new("US", "top_free").with_subcategory(SubcategoryFilter::None);
        assert!(check_rank_conservation(&no_category, &merged));
    }
}
