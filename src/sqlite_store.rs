//! SQLite-backed [`SnapshotReader`].
//!
//! Every reader method is one parameterised query over `charts`, filtered
//! through the `idx_charts_ctx_date` / `idx_charts_app_date` indexes.
//! Absent subcategories are stored as `''`; `COALESCE` also covers
//! databases written by older collectors that used NULL.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteArguments;
use sqlx::query::Query;
use sqlx::{Row, Sqlite, SqlitePool};

use chartwatch_core::dimension::{DimensionKey, SubcategoryFilter};
use chartwatch_core::models::{format_date, parse_date, Snapshot, SnapshotEntry, SnapshotRow};
use chartwatch_core::store::{check_rank_conservation, sql_limit, SnapshotReader};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// SQLite implementation of the [`SnapshotReader`] trait.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating the schema if missing.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert rows with `INSERT OR IGNORE` in a single transaction.
    /// Returns how many rows were actually written.
    pub async fn insert_rows(&self, rows: &[SnapshotRow]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO charts
                    (snapshot_date, country, chart_type, category, subcategory, rank,
                     app_id, bundle_id, app_name, developer_name,
                     price, currency, rating, ratings_count)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(format_date(row.snapshot_date))
            .bind(&row.country)
            .bind(&row.chart_type)
            .bind(&row.category)
            .bind(row.subcategory.as_deref().unwrap_or(""))
            .bind(row.rank)
            .bind(&row.app_id)
            .bind(&row.bundle_id)
            .bind(&row.app_name)
            .bind(&row.developer_name)
            .bind(row.price)
            .bind(&row.currency)
            .bind(row.rating)
            .bind(row.ratings_count)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

/// `WHERE` fragment and its bind values for a dimension key.
struct KeyFilter {
    sql: String,
    binds: Vec<String>,
}

impl KeyFilter {
    fn new(key: &DimensionKey) -> Self {
        let mut sql = String::from("country = ? AND chart_type = ?");
        let mut binds = vec![key.country.clone(), key.chart_type.clone()];

        if let Some(ref category) = key.category {
            sql.push_str(" AND category = ?");
            binds.push(category.clone());
        }
        match &key.subcategory {
            SubcategoryFilter::Any => {}
            SubcategoryFilter::None => sql.push_str(" AND COALESCE(subcategory, '') = ''"),
            SubcategoryFilter::Exactly(sub) => {
                sql.push_str(" AND COALESCE(subcategory, '') = ?");
                binds.push(sub.clone());
            }
        }

        Self { sql, binds }
    }

    fn bind<'q>(
        &self,
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for value in &self.binds {
            query = query.bind(value.clone());
        }
        query
    }
}

impl SqliteSnapshotStore {
    async fn dates(
        &self,
        key: &DimensionKey,
        before: Option<NaiveDate>,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>> {
        let filter = KeyFilter::new(key);
        let sql = format!(
            "SELECT DISTINCT snapshot_date FROM charts WHERE {}{} ORDER BY snapshot_date DESC LIMIT ?",
            filter.sql,
            if before.is_some() { " AND snapshot_date < ?" } else { "" }
        );

        let mut query = filter.bind(sqlx::query(&sql));
        if let Some(before) = before {
            query = query.bind(format_date(before));
        }
        let rows = query.bind(sql_limit(max_count)).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let raw: String = row.get("snapshot_date");
                parse_date(&raw).map_err(anyhow::Error::from)
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotReader for SqliteSnapshotStore {
    async fn list_snapshot_dates(
        &self,
        key: &DimensionKey,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>> {
        self.dates(key, None, max_count).await
    }

    async fn list_snapshot_dates_before(
        &self,
        key: &DimensionKey,
        before: NaiveDate,
        max_count: usize,
    ) -> Result<Vec<NaiveDate>> {
        self.dates(key, Some(before), max_count).await
    }

    async fn load_snapshot(&self, key: &DimensionKey, date: NaiveDate) -> Result<Snapshot> {
        let filter = KeyFilter::new(key);
        let sql = format!(
            "SELECT app_id, rank, app_name, developer_name, country, category, subcategory \
             FROM charts WHERE {} AND snapshot_date = ? ORDER BY rank",
            filter.sql
        );
        let rows = filter
            .bind(sqlx::query(&sql))
            .bind(format_date(date))
            .fetch_all(&self.pool)
            .await?;

        let entries = rows.iter().map(|row| {
            let subcategory: Option<String> = row.get("subcategory");
            SnapshotEntry {
                app_id: row.get("app_id"),
                rank: row.get("rank"),
                app_name: row.get("app_name"),
                developer_name: row.get("developer_name"),
                country: row.get("country"),
                category: row.get("category"),
                subcategory: subcategory.filter(|s| !s.is_empty()),
            }
        });
        let snapshot = Snapshot::from_entries(date, entries);
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
        let filter = KeyFilter::new(key);
        let sql = format!(
            "SELECT 1 FROM charts WHERE {} AND app_id = ? AND snapshot_date < ?{} LIMIT 1",
            filter.sql,
            if since.is_some() { " AND snapshot_date >= ?" } else { "" }
        );

        let mut query = filter
            .bind(sqlx::query(&sql))
            .bind(app_id.to_string())
            .bind(format_date(before));
        if let Some(since) = since {
            query = query.bind(format_date(since));
        }
        Ok(query.fetch_optional(&self.pool).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_unset_subcategory() {
        let key = DimensionKey::new("US", "top_free").with_category("Games");
        let filter = KeyFilter::new(&key);
        assert_eq!(filter.sql, "country = ? AND chart_type = ? AND category = ?");
        assert_eq!(filter.binds, vec!["US", "top_free", "Games"]);
    }

    #[test]
    fn test_filter_for_explicit_no_subcategory() {
        let key = DimensionKey::new("US", "top_free")
            .with_category("Games")
            .with_subcategory(SubcategoryFilter::None);
        let filter = KeyFilter::new(&key);
        assert!(filter.sql.ends_with("AND COALESCE(subcategory, '') = ''"));
        assert_eq!(filter.binds.len(), 3);
    }

    #[test]
    fn test_filter_for_named_subcategory() {
        let key = DimensionKey::new("GB", "top_paid")
            .with_category("Games")
            .with_subcategory(SubcategoryFilter::Exactly("Puzzle".to_string()));
        let filter = KeyFilter::new(&key);
        assert_eq!(filter.binds, vec!["GB", "top_paid", "Games", "Puzzle"]);
    }
}
