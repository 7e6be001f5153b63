//! Day-by-day chart events: who entered, who left, and whose slot they took.
//!
//! Each consecutive pair of snapshot dates is compared pairwise. Only
//! boundary crossings are reported (NEW, RE-ENTRY, DROPPED); movers are
//! visible through the `replaced_*` fields instead.

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::ReportState;
use crate::dimension::DimensionKey;
use crate::error::Result;
use crate::models::{LifecycleStatus, Snapshot};
use crate::store::SnapshotReader;

#[derive(Debug, Clone)]
pub struct HistoryRequest {
    /// Report a single date against its predecessor.
    pub date: Option<NaiveDate>,
    /// How many recent dates to walk when `date` is unset.
    pub max_dates: usize,
    pub status: Option<LifecycleStatus>,
}

impl Default for HistoryRequest {
    fn default() -> Self {
        Self {
            date: None,
            max_dates: 30,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEvent {
    pub date: NaiveDate,
    pub previous_date: NaiveDate,
    pub app_id: String,
    pub app_name: String,
    pub developer_name: Option<String>,
    pub status: LifecycleStatus,
    /// Rank on `date`; unset for DROPPED.
    pub rank: Option<i64>,
    /// Rank on `previous_date`; unset for NEW and RE-ENTRY.
    pub previous_rank: Option<i64>,
    /// Entries: the app that held this rank on `previous_date`.
    pub replaced_app_id: Option<String>,
    pub replaced_app_name: Option<String>,
    pub replaced_current_rank: Option<i64>,
    pub replaced_status: Option<LifecycleStatus>,
    /// Drops: the app holding the vacated rank on `date`.
    pub replaced_by_app_id: Option<String>,
    pub replaced_by_app_name: Option<String>,
    pub replaced_by_rank: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub state: ReportState,
    /// Most recent first.
    pub available_dates: Vec<NaiveDate>,
    pub rows: Vec<HistoryEvent>,
}

/// Entry and exit events between `current` and `previous`.
///
/// `seen_before` answers whether an entering app has any row before
/// `current.date`.
pub fn diff_pair<F>(
    current: &Snapshot,
    previous: &Snapshot,
    mut seen_before: F,
) -> Vec<HistoryEvent>
where
    F: FnMut(&str) -> bool,
{
    let mut events = Vec::new();

    for entry in current.entries() {
        if previous.contains(&entry.app_id) {
            continue;
        }
        let status = if seen_before(&entry.app_id) {
            LifecycleStatus::ReEntry
        } else {
            LifecycleStatus::New
        };
        let replaced = previous.at_rank(entry.rank);
        let replaced_current_rank = replaced.and_then(|r| current.get(&r.app_id)).map(|e| e.rank);
        let replaced_status = replaced.map(|r| match replaced_current_rank {
            Some(now) => LifecycleStatus::from_delta(r.rank - now),
            None => LifecycleStatus::Dropped,
        });
        events.push(HistoryEvent {
            date: current.date,
            previous_date: previous.date,
            app_id: entry.app_id.clone(),
            app_name: entry.app_name.clone(),
            developer_name: entry.developer_name.clone(),
            status,
            rank: Some(entry.rank),
            previous_rank: None,
            replaced_app_id: replaced.map(|r| r.app_id.clone()),
            replaced_app_name: replaced.map(|r| r.app_name.clone()),
            replaced_current_rank,
            replaced_status,
            replaced_by_app_id: None,
            replaced_by_app_name: None,
            replaced_by_rank: None,
        });
    }

    for entry in previous.entries() {
        if current.contains(&entry.app_id) {
            continue;
        }
        let replaced_by = current.at_rank(entry.rank);
        events.push(HistoryEvent {
            date: current.date,
            previous_date: previous.date,
            app_id: entry.app_id.clone(),
            app_name: entry.app_name.clone(),
            developer_name: entry.developer_name.clone(),
            status: LifecycleStatus::Dropped,
            rank: None,
            previous_rank: Some(entry.rank),
            replaced_app_id: None,
            replaced_app_name: None,
            replaced_current_rank: None,
            replaced_status: None,
            replaced_by_app_id: replaced_by.map(|r| r.app_id.clone()),
            replaced_by_app_name: replaced_by.map(|r| r.app_name.clone()),
            replaced_by_rank: replaced_by.map(|r| r.rank),
        });
    }

    events
}

/// Walk recent dates of `key` and report entry and exit events.
pub async fn history<R: SnapshotReader + ?Sized>(
    reader: &R,
    key: &DimensionKey,
    request: &HistoryRequest,
) -> Result<HistoryReport> {
    let available_dates = reader
        .list_snapshot_dates(key, request.max_dates.max(1))
        .await?;

    // Dates arrive most recent first, so each loaded snapshot is reused as
    // the next pair's current side.
    let mut carried: Option<Snapshot> = None;
    if let Some(date) = request.date {
        let current = reader.load_snapshot(key, date).await?;
        if current.is_empty() {
            return Ok(HistoryReport {
                state: ReportState::EmptyContext,
                available_dates,
                rows: Vec::new(),
            });
        }
        carried = Some(current);
    }

    let pairs: Vec<(NaiveDate, NaiveDate)> = match request.date {
        Some(date) => reader
            .list_snapshot_dates_before(key, date, 1)
            .await?
            .into_iter()
            .map(|prev| (date, prev))
            .collect(),
        None => available_dates.windows(2).map(|w| (w[0], w[1])).collect(),
    };

    if pairs.is_empty() {
        return Ok(HistoryReport {
            state: ReportState::InsufficientHistory,
            available_dates,
            rows: Vec::new(),
        });
    }

    let mut rows = Vec::new();
    for (date, prev_date) in pairs {
        let current = match carried.take() {
            Some(s) if s.date == date => s,
            _ => reader.load_snapshot(key, date).await?,
        };
        let previous = reader.load_snapshot(key, prev_date).await?;

        let mut existed = Vec::new();
        for entry in current.entries() {
            if !previous.contains(&entry.app_id)
                && reader
                    .has_appeared_before(key, &entry.app_id, date, None)
                    .await?
            {
                existed.push(entry.app_id.clone());
            }
        }
        rows.extend(diff_pair(&current, &previous, |id| existed.iter().any(|e| e == id)));
        carried = Some(previous);
    }

    if let Some(wanted) = request.status {
        rows.retain(|r| r.status == wanted);
    }
    rows.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.status.cmp(&b.status))
            .then_with(|| a.rank.or(a.previous_rank).cmp(&b.rank.or(b.previous_rank)))
            .then_with(|| a.app_id.cmp(&b.app_id))
    });

    Ok(HistoryReport {
        state: ReportState::Complete,
        available_dates,
        rows,
    })
}
