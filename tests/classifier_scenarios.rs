//! End-to-end classifier behaviour over a real SQLite store.

use chartwatch::config::{parse_config, Config};
use chartwatch::sqlite_store::SqliteSnapshotStore;
use chartwatch_core::classify::{classify, ClassifierPolicy, CompareMode, ReentryScope, ReportState};
use chartwatch_core::dimension::{DimensionKey, SubcategoryFilter};
use chartwatch_core::models::{LifecycleStatus, SnapshotRow};
use chartwatch_core::store::SnapshotReader;
use chrono::NaiveDate;
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
}

fn config(tmp: &TempDir) -> Config {
    parse_config(&format!(
        "[db]\npath = \"{}\"\n",
        tmp.path().join("charts.sqlite").display()
    ))
    .unwrap()
}

async fn open_store() -> (TempDir, SqliteSnapshotStore) {
    let tmp = TempDir::new().unwrap();
    let store = SqliteSnapshotStore::open(&config(&tmp)).await.unwrap();
    (tmp, store)
}

fn key() -> DimensionKey {
    DimensionKey::new("US", "top_free")
        .with_category("Games")
        .with_subcategory(SubcategoryFilter::None)
}

/// Rows for one date, ranked in slice order.
fn day_rows(d: u32, apps: &[&str]) -> Vec<SnapshotRow> {
    apps.iter()
        .enumerate()
        .map(|(i, app)| SnapshotRow::new(day(d), "US", "top_free", "Games", None, i as i64 + 1, app, app))
        .collect()
}

async fn seed(store: &SqliteSnapshotStore, days: &[(u32, &[&str])]) {
    let mut rows = Vec::new();
    for (d, apps) in days {
        rows.extend(day_rows(*d, apps));
    }
    store.insert_rows(&rows).await.unwrap();
}

fn status_of(report: &chartwatch_core::classify::LifecycleReport, app: &str) -> Option<LifecycleStatus> {
    report.rows.iter().find(|r| r.app_id == app).map(|r| r.status)
}

#[tokio::test]
async fn test_steady_app_is_same() {
    let (_tmp, store) = open_store().await;
    let mut rows = Vec::new();
    for d in 1..=7 {
        let mut r = SnapshotRow::new(day(d), "US", "top_free", "Games", None, 5, "A", "A");
        r.developer_name = Some("Dev".to_string());
        rows.push(r);
    }
    store.insert_rows(&rows).await.unwrap();

    let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
    assert_eq!(report.state, ReportState::Complete);
    let a = &report.rows[0];
    assert_eq!(a.status, LifecycleStatus::Same);
    assert_eq!(a.previous_rank, Some(5));
    assert_eq!(a.current_rank, Some(5));
    assert_eq!(a.delta, Some(0));
    assert_eq!(a.developer_name.as_deref(), Some("Dev"));
}

#[tokio::test]
async fn test_first_appearance_is_new() {
    let (_tmp, store) = open_store().await;
    let mut days: Vec<(u32, &[&str])> = (1..=6).map(|d| (d, &["x"] as &[&str])).collect();
    days.push((7, &["x", "B"] as &[&str]));
    seed(&store, &days).await;

    let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
    assert_eq!(status_of(&report, "B"), Some(LifecycleStatus::New));
    let b = report.rows.iter().find(|r| r.app_id == "B").unwrap();
    assert_eq!(b.previous_rank, None);
    assert_eq!(b.delta, None);
}

#[tokio::test]
async fn test_return_after_absence_is_reentry() {
    let (_tmp, store) = open_store().await;
    let mut days: Vec<(u32, &[&str])> = vec![(1, &["x", "y", "C"] as &[&str])];
    days.extend((2..=6).map(|d| (d, &["x", "y"] as &[&str])));
    days.push((7, &["x", "y", "C"] as &[&str]));
    seed(&store, &days).await;

    let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
    assert_eq!(status_of(&report, "C"), Some(LifecycleStatus::ReEntry));
}

#[tokio::test]
async fn test_missing_from_current_is_dropped() {
    let (_tmp, store) = open_store().await;
    let mut days: Vec<(u32, &[&str])> = (1..=6).map(|d| (d, &["x", "D"] as &[&str])).collect();
    days.push((7, &["x"] as &[&str]));
    seed(&store, &days).await;

    let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
    let d = report.rows.iter().find(|r| r.app_id == "D").unwrap();
    assert_eq!(d.status, LifecycleStatus::Dropped);
    assert_eq!(d.previous_rank, Some(2));
    assert_eq!(d.current_rank, None);
    assert_eq!(d.delta, None);
}

#[tokio::test]
async fn test_pairwise_mover_up() {
    let (_tmp, store) = open_store().await;
    let rows = vec![
        SnapshotRow::new(day(6), "US", "top_free", "Games", None, 20, "E", "E"),
        SnapshotRow::new(day(7), "US", "top_free", "Games", None, 15, "E", "E"),
    ];
    store.insert_rows(&rows).await.unwrap();

    let policy = ClassifierPolicy {
        mode: CompareMode::Pairwise,
        ..ClassifierPolicy::default()
    };
    let report = classify(&store, &key(), &policy).await.unwrap();
    let e = &report.rows[0];
    assert_eq!(e.delta, Some(5));
    assert_eq!(e.status, LifecycleStatus::MoverUp);
}

#[tokio::test]
async fn test_empty_store_is_insufficient_history() {
    let (_tmp, store) = open_store().await;

    let report = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
    assert_eq!(report.state, ReportState::InsufficientHistory);
    assert!(report.rows.is_empty());
}

#[tokio::test]
async fn test_bounded_scope_forgets_old_appearances() {
    let (_tmp, store) = open_store().await;
    // C charted once long before the window.
    let mut rows = vec![SnapshotRow::new(
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        "US",
        "top_free",
        "Games",
        None,
        2,
        "C",
        "C",
    )];
    rows.extend(day_rows(6, &["x"]));
    rows.extend(day_rows(7, &["x", "C"]));
    store.insert_rows(&rows).await.unwrap();

    let unbounded = classify(&store, &key(), &ClassifierPolicy::default()).await.unwrap();
    assert_eq!(status_of(&unbounded, "C"), Some(LifecycleStatus::ReEntry));

    let policy = ClassifierPolicy {
        lookback_days: 1,
        reentry_scope: ReentryScope::Bounded,
        ..ClassifierPolicy::default()
    };
    let bounded = classify(&store, &key(), &policy).await.unwrap();
    assert_eq!(status_of(&bounded, "C"), Some(LifecycleStatus::New));
}

#[tokio::test]
async fn test_subcategory_absent_and_empty_differ() {
    let (_tmp, store) = open_store().await;
    let rows = vec![
        SnapshotRow::new(day(6), "US", "top_free", "Games", None, 1, "plain", "plain"),
        SnapshotRow::new(day(6), "US", "top_free", "Games", Some("Puzzle"), 1, "puzzle", "puzzle"),
        SnapshotRow::new(day(7), "US", "top_free", "Games", None, 1, "plain", "plain"),
        SnapshotRow::new(day(7), "US", "top_free", "Games", Some("Puzzle"), 1, "puzzle", "puzzle"),
    ];
    store.insert_rows(&rows).await.unwrap();

    let none_key = key();
    let snapshot = store.load_snapshot(&none_key, day(7)).await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains("plain"));

    let any_key = DimensionKey::new("US", "top_free").with_category("Games");
    let snapshot = store.load_snapshot(&any_key, day(7)).await.unwrap();
    assert_eq!(snapshot.len(), 2);

    let puzzle_key = any_key
        .clone()
        .with_subcategory(SubcategoryFilter::Exactly("Puzzle".to_string()));
    let report = classify(&store, &puzzle_key, &ClassifierPolicy::default()).await.unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].app_id, "puzzle");
    assert_eq!(report.rows[0].subcategory.as_deref(), Some("Puzzle"));
}

#[tokio::test]
async fn test_duplicate_rows_are_ignored() {
    let (_tmp, store) = open_store().await;
    let rows = day_rows(7, &["a", "b"]);

    assert_eq!(store.insert_rows(&rows).await.unwrap(), 2);
    assert_eq!(store.insert_rows(&rows).await.unwrap(), 0);
    assert_eq!(store.list_snapshot_dates(&key(), 10).await.unwrap(), vec![day(7)]);
}

#[tokio::test]
async fn test_has_appeared_before_respects_bounds() {
    let (_tmp, store) = open_store().await;
    seed(&store, &[(1, &["a"] as &[&str]), (5, &["b"] as &[&str]), (7, &["a", "b"] as &[&str])]).await;

    assert!(store.has_appeared_before(&key(), "a", day(7), None).await.unwrap());
    assert!(!store.has_appeared_before(&key(), "a", day(7), Some(day(2))).await.unwrap());
    assert!(store.has_appeared_before(&key(), "b", day(7), Some(day(2))).await.unwrap());
    assert!(!store.has_appeared_before(&key(), "b", day(5), None).await.unwrap());
}
