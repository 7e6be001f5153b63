//! In-memory [`SnapshotReader`] for tests and embedders.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Inserts follow the
//! store's uniqueness rules the way `INSERT OR IGNORE` does: a row whose
//! rank slot or app slot is already taken for its context and date is
//! skipped.

use std::collections::BTreeSet;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::dimension::DimensionKey;
use crate::models::{Snapshot, SnapshotRow};

use super::{check_rank_conservation, SnapshotReader};

/// In-memory snapshot store.
pub struct InMemoryStore {
    rows: RwLock<Vec<SnapshotRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Insert one row; returns `false` when it collides with an existing one.
    pub fn insert(&self, row: SnapshotRow) -> bool {
        let mut rows = self.rows.write().unwrap();
        let collides = rows.iter().any(|r| {
            same_context(r, &row) && (r.rank == row.rank || r.app_id == row.app_id)
        });
        if collides {
            return false;
        }
        rows.push(row);
        true
    }

    /// Insert many rows; returns how many were accepted.
    pub fn insert_rows(&self, rows: impl IntoIterator<Item = SnapshotRow>) -> usize {
        let mut accepted = 0;
        for row in rows {
            if self.insert(row) {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dates_matching(
        &self,
        key: &DimensionKey,
        before: Option<NaiveDate>,
        max_count: usize,
    ) -> Vec<NaiveDate> {
        let rows = self.rows.read().unwrap();
        let dates: BTreeSet<NaiveDate> = rows
            .iter()
            .filter(|r| row_matches(key, r))
            .map(|r| r.snapshot_date)
            .filter(|d| before.map_or(true, |b| *d < b))
            .collect();
        dates.into_iter().rev().take(max_count).collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_context(a: &SnapshotRow, b: &SnapshotRow) -> bool {
    a.snapshot_date == b.snapshot_date
        && a.country == b.country
        && a.chart_type == b.chart_type
        && a.category == b.category
        && a.subcategory.as_deref().unwrap_or("") == b.subcategory.as_deref().unwrap_or("")
}

fn row_matches(key: &DimensionKey, row: &SnapshotRow) -> bool {
    key.matches(
        &row.country,
        &row.chart_type,
        &row.category,
        row.subcategory.as_deref(),
    )
}

#[async_trait]
impl SnapshotReader for InMemoryStore {
    async fn list_snapshot_dates(
        &self,
        key: &DimensionKey,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>> {
        Ok(self.dates_matching(key, None, max_count))
    }

    async fn list_snapshot_dates_before(
        &self,
        key: &DimensionKey,
        before: NaiveDate,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>> {
        Ok(self.dates_matching(key, Some(before), max_count))
    }

    async fn load_snapshot(&self, key: &DimensionKey, date: NaiveDate) -> Result<Snapshot> {
        let snapshot = {
            let rows = self.rows.read().unwrap();
            Snapshot::from_entries(
                date,
                rows.iter()
                    .filter(|r| r.snapshot_date == date && row_matches(key, r))
                    .map(SnapshotRow::to_entry),
            )
        };
        check_rank_conservation(key, &snapshot);
        Ok(snapshot)
    }

    async fn has_appeared_before(
        &self,
        key: &DimensionKey,
        app_id: &str,
        before: NaiveDate,
        since: Option<NaiveDate>,
    ) -> Result<bool> {
        let rows = self.rows.read().unwrap();
        Ok(rows.iter().any(|r| {
            r.app_id == app_id
                && r.snapshot_date < before
                && since.map_or(true, |s| r.snapshot_date >= s)
                && row_matches(key, r)
        }))
    }
}
