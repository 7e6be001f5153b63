use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the `charts` table and its indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Subcategory is '' rather than NULL so the unique indexes below hold:
    // SQLite treats NULLs as distinct.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS charts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_date TEXT NOT NULL,
            country TEXT NOT NULL,
            chart_type TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL DEFAULT '',
            rank INTEGER NOT NULL,
            app_id TEXT NOT NULL,
            bundle_id TEXT,
            app_name TEXT NOT NULL,
            developer_name TEXT,
            price REAL,
            currency TEXT,
            rating REAL,
            ratings_count INTEGER,
            fetched_at TEXT DEFAULT (datetime('now')),
            raw TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One app per rank slot, and one rank per app, per context and day.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_charts_context_rank \
         ON charts(snapshot_date, country, chart_type, category, subcategory, rank)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_charts_context_app \
         ON charts(snapshot_date, country, chart_type, category, subcategory, app_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_charts_date ON charts(snapshot_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_charts_app_date ON charts(app_id, snapshot_date)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_charts_ctx_date \
         ON charts(country, chart_type, category, subcategory, snapshot_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
