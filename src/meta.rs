//! Filter values available in the store, for building pickers and menus.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::export::OutputFormat;
use crate::sqlite_store::SqliteSnapshotStore;

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub countries: Vec<String>,
    pub chart_types: Vec<String>,
    pub categories: Vec<String>,
    /// Restricted to `category` when one was given.
    pub subcategories: Vec<String>,
    pub latest_date: Option<String>,
}

async fn distinct(pool: &SqlitePool, column: &str, category: Option<&str>) -> Result<Vec<String>> {
    let sql = match category {
        Some(_) => format!(
            "SELECT DISTINCT {col} FROM charts WHERE category = ? AND {col} <> '' ORDER BY {col}",
            col = column
        ),
        None => format!(
            "SELECT DISTINCT {col} FROM charts WHERE {col} IS NOT NULL AND {col} <> '' ORDER BY {col}",
            col = column
        ),
    };
    let mut query = sqlx::query_scalar::<_, String>(&sql);
    if let Some(category) = category {
        query = query.bind(category.to_string());
    }
    Ok(query.fetch_all(pool).await?)
}

pub async fn load_meta(pool: &SqlitePool, category: Option<&str>) -> Result<Meta> {
    let latest_date: Option<String> = sqlx::query_scalar("SELECT MAX(snapshot_date) FROM charts")
        .fetch_one(pool)
        .await?;

    Ok(Meta {
        countries: distinct(pool, "country", None).await?,
        chart_types: distinct(pool, "chart_type", None).await?,
        categories: distinct(pool, "category", None).await?,
        subcategories: distinct(pool, "subcategory", category).await?,
        latest_date,
    })
}

pub async fn run_meta(config: &Config, category: Option<&str>, format: OutputFormat) -> Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let meta = load_meta(store.pool(), category).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
        OutputFormat::Csv => anyhow::bail!("meta does not support csv output"),
        OutputFormat::Table => {
            println!("  Latest date:    {}", meta.latest_date.as_deref().unwrap_or("none"));
            println!("  Countries:      {}", meta.countries.join(", "));
            println!("  Chart types:    {}", meta.chart_types.join(", "));
            println!("  Categories:     {}", meta.categories.join(", "));
            println!("  Subcategories:  {}", meta.subcategories.join(", "));
        }
    }

    store.close().await;
    Ok(())
}
