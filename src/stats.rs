//! Database statistics and health overview.
//!
//! A quick summary of what has been collected: row counts, distinct dates
//! and chart contexts, and a per-country breakdown. Used by
//! `chartwatch stats` to confirm that ingestion is keeping up.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::sqlite_store::SqliteSnapshotStore;

/// Per-country breakdown of row and date counts.
struct CountryStats {
    country: String,
    row_count: i64,
    date_count: i64,
    latest_date: Option<String>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let pool = store.pool();

    let total_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM charts")
        .fetch_one(pool)
        .await?;

    let total_dates: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT snapshot_date) FROM charts")
        .fetch_one(pool)
        .await?;

    let total_contexts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM (SELECT DISTINCT country, chart_type, category, subcategory FROM charts)",
    )
    .fetch_one(pool)
    .await?;

    let latest: Option<String> = sqlx::query_scalar("SELECT MAX(snapshot_date) FROM charts")
        .fetch_one(pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("chartwatch database stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Rows:        {}", total_rows);
    println!("  Dates:       {}", total_dates);
    println!("  Contexts:    {}", total_contexts);
    println!("  Latest:      {}", latest.as_deref().unwrap_or("never"));

    let country_rows = sqlx::query(
        r#"
        SELECT
            country,
            COUNT(*) AS row_count,
            COUNT(DISTINCT snapshot_date) AS date_count,
            MAX(snapshot_date) AS latest_date
        FROM charts
        GROUP BY country
        ORDER BY row_count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let countries: Vec<CountryStats> = country_rows
        .iter()
        .map(|row| CountryStats {
            country: row.get("country"),
            row_count: row.get("row_count"),
            date_count: row.get("date_count"),
            latest_date: row.get("latest_date"),
        })
        .collect();

    if !countries.is_empty() {
        println!();
        println!("  By country:");
        println!("  {:<10} {:>8} {:>8}   {}", "COUNTRY", "ROWS", "DATES", "LATEST");
        println!("  {}", "-".repeat(44));

        for c in &countries {
            println!(
                "  {:<10} {:>8} {:>8}   {}",
                c.country,
                c.row_count,
                c.date_count,
                c.latest_date.as_deref().unwrap_or("-")
            );
        }
    }

    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
