//! CSV ingestion.
//!
//! Walks a directory for chart exports, maps their loosely named columns
//! onto `charts`, and inserts each file in one transaction with
//! `INSERT OR IGNORE`, so re-running over the same files is a no-op.
//!
//! The snapshot date comes from a `YYYY-MM-DD` in the file name, falling
//! back to a `snapshot_date` column. Files with neither are rejected.

use anyhow::{bail, Context, Result};
use chartwatch_core::models::{parse_date, SnapshotRow};
use chrono::NaiveDate;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::sqlite_store::SqliteSnapshotStore;

/// Canonical column a CSV header maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    SnapshotDate,
    Country,
    ChartType,
    Category,
    Subcategory,
    Rank,
    AppId,
    AppName,
    DeveloperName,
    BundleId,
    Price,
    Currency,
    Rating,
    RatingsCount,
}

fn field_for_header(header: &str) -> Option<Field> {
    let normalized = header.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    let field = match normalized.as_str() {
        "snapshot_date" | "date" => Field::SnapshotDate,
        "country" | "storefront" => Field::Country,
        "chart" | "chart_type" => Field::ChartType,
        "category" | "primary_genre" => Field::Category,
        "subcategory" | "sub_category" => Field::Subcategory,
        "rank" | "current_rank" => Field::Rank,
        "app_id" | "id" => Field::AppId,
        "app" | "app_name" | "name" | "title" => Field::AppName,
        "developer" | "developer_name" => Field::DeveloperName,
        "bundle_id" => Field::BundleId,
        "price" => Field::Price,
        "currency" => Field::Currency,
        "rating" | "average_rating" => Field::Rating,
        "ratings_count" | "rating_count" => Field::RatingsCount,
        _ => return None,
    };
    Some(field)
}

/// Integer parse that tolerates decoration such as `12↑` or `#3`.
fn parse_lenient_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Ok(v) = trimmed.parse() {
        return Some(v);
    }
    // Float exports write ranks as `1.0`; only whole values count.
    if let Ok(f) = trimmed.parse::<f64>() {
        return (f.is_finite() && f.fract() == 0.0).then_some(f as i64);
    }
    let whole = trimmed.split('.').next().unwrap_or(trimmed);
    let digits: String = whole
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse().ok()
}

fn parse_lenient_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// First `YYYY-MM-DD` found in a file name.
pub fn date_from_filename(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let bytes = name.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    (0..=bytes.len() - 10).find_map(|i| {
        let window = name.get(i..i + 10)?;
        let b = window.as_bytes();
        let shaped = b[4] == b'-'
            && b[7] == b'-'
            && b.iter()
                .enumerate()
                .all(|(j, c)| j == 4 || j == 7 || c.is_ascii_digit());
        if shaped {
            parse_date(window).ok()
        } else {
            None
        }
    })
}

/// Defaults for columns a file may leave out.
#[derive(Debug, Clone)]
pub struct RowDefaults {
    pub country: Option<String>,
    pub chart_type: String,
    pub category: String,
}

impl RowDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            country: config.dimensions.default_country.clone(),
            chart_type: config.ingest.default_chart_type.clone(),
            category: config.ingest.default_category.clone(),
        }
    }
}

/// Rows read from one file.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub rows: Vec<SnapshotRow>,
    /// Records dropped for a missing app id, rank, country, or date.
    pub skipped: usize,
}

/// Parse one CSV export into snapshot rows.
pub fn parse_csv_file(path: &Path, defaults: &RowDefaults) -> Result<ParsedFile> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV: {}", path.display()))?;

    let mut columns: HashMap<Field, usize> = HashMap::new();
    for (i, header) in reader.headers()?.iter().enumerate() {
        if let Some(field) = field_for_header(header) {
            columns.entry(field).or_insert(i);
        }
    }

    let file_date = date_from_filename(path);
    if file_date.is_none() && !columns.contains_key(&Field::SnapshotDate) {
        bail!(
            "{}: no YYYY-MM-DD in the file name and no snapshot_date column",
            path.display()
        );
    }

    let mut parsed = ParsedFile::default();
    for record in reader.records() {
        let record = record?;
        let get = |field: Field| {
            columns
                .get(&field)
                .and_then(|&i| record.get(i))
                .filter(|v| !v.is_empty())
        };

        let date = file_date.or_else(|| get(Field::SnapshotDate).and_then(|v| parse_date(v).ok()));
        let rank = get(Field::Rank).and_then(parse_lenient_int);
        let app_id = get(Field::AppId);
        let country = get(Field::Country)
            .map(str::to_string)
            .or_else(|| defaults.country.clone())
            .map(|c| c.to_ascii_uppercase());

        let (Some(date), Some(rank), Some(app_id), Some(country)) = (date, rank, app_id, country) else {
            parsed.skipped += 1;
            continue;
        };

        let mut row = SnapshotRow::new(
            date,
            &country,
            get(Field::ChartType).unwrap_or(defaults.chart_type.as_str()),
            get(Field::Category).unwrap_or(defaults.category.as_str()),
            get(Field::Subcategory),
            rank,
            app_id,
            get(Field::AppName).unwrap_or(app_id),
        );
        row.developer_name = get(Field::DeveloperName).map(str::to_string);
        row.bundle_id = get(Field::BundleId).map(str::to_string);
        row.price = get(Field::Price).and_then(parse_lenient_float);
        row.currency = get(Field::Currency).map(str::to_string);
        row.rating = get(Field::Rating).and_then(parse_lenient_float);
        row.ratings_count = get(Field::RatingsCount).and_then(parse_lenient_int);
        parsed.rows.push(row);
    }

    Ok(parsed)
}

/// CSV files under `root` matching `include_globs`, sorted by path.
pub fn scan_csv_files(root: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("CSV directory does not exist: {}", root.display());
    }
    let include_set = build_globset(include_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Totals for one ingest run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub files_rejected: usize,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub rows_inserted: u64,
}

/// Ingest every matching file under `dir` into `store`.
/// With `store = None` nothing is written (dry run).
pub async fn ingest_dir(
    store: Option<&SqliteSnapshotStore>,
    dir: &Path,
    include_globs: &[String],
    defaults: &RowDefaults,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for path in scan_csv_files(dir, include_globs)? {
        summary.files += 1;
        let parsed = match parse_csv_file(&path, defaults) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping file");
                summary.files_rejected += 1;
                continue;
            }
        };
        summary.rows_read += parsed.rows.len();
        summary.rows_skipped += parsed.skipped;

        if let Some(store) = store {
            let inserted = store.insert_rows(&parsed.rows).await?;
            summary.rows_inserted += inserted;
            tracing::info!(
                file = %path.display(),
                rows = parsed.rows.len(),
                inserted,
                skipped = parsed.skipped,
                "ingested"
            );
        }
    }

    Ok(summary)
}

pub async fn run_ingest(config: &Config, dir: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let dir = match dir.or_else(|| config.ingest.csv_dir.clone()) {
        Some(d) => d,
        None => bail!("No CSV directory: pass --dir or set ingest.csv_dir"),
    };
    let defaults = RowDefaults::from_config(config);

    if dry_run {
        let summary = ingest_dir(None, &dir, &config.ingest.include_globs, &defaults).await?;
        println!("ingest {} (dry-run)", dir.display());
        println!("  files found: {}", summary.files);
        println!("  files rejected: {}", summary.files_rejected);
        println!("  rows parsed: {}", summary.rows_read);
        println!("  rows skipped: {}", summary.rows_skipped);
        return Ok(());
    }

    let store = SqliteSnapshotStore::open(config).await?;
    let summary = ingest_dir(Some(&store), &dir, &config.ingest.include_globs, &defaults).await?;

    println!("ingest {}", dir.display());
    println!("  files: {} ({} rejected)", summary.files, summary.files_rejected);
    println!("  rows parsed: {}", summary.rows_read);
    println!("  rows skipped: {}", summary.rows_skipped);
    println!("  rows inserted: {}", summary.rows_inserted);
    println!("ok");

    store.close().await;
    Ok(())
}
