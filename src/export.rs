//! Render reports as JSON, CSV, or an aligned text table.
//!
//! Each report type implements [`Tabular`] to describe its flat row form;
//! JSON always serialises the full report structure instead.

use anyhow::Result;
use chartwatch_core::classify::LifecycleReport;
use chartwatch_core::history::HistoryReport;
use chartwatch_core::models::format_date;
use chartwatch_core::weekly::{WeeklyInsights, WeeklyTrending};
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    Csv,
    #[default]
    Table,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "table" => Ok(OutputFormat::Table),
            other => anyhow::bail!("Unknown format: '{}'. Must be json, csv, or table.", other),
        }
    }
}

/// A report that can be flattened into header + rows.
pub trait Tabular {
    fn headers(&self) -> &'static [&'static str];
    fn records(&self) -> Vec<Vec<String>>;
}

fn opt<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

impl Tabular for LifecycleReport {
    fn headers(&self) -> &'static [&'static str] {
        &[
            "status",
            "current_rank",
            "previous_rank",
            "delta",
            "app_name",
            "developer_name",
            "app_id",
            "country",
            "category",
            "subcategory",
        ]
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    r.status.to_string(),
                    opt(&r.current_rank),
                    opt(&r.previous_rank),
                    opt(&r.delta),
                    r.app_name.clone(),
                    opt(&r.developer_name),
                    r.app_id.clone(),
                    r.country.clone(),
                    r.category.clone(),
                    opt(&r.subcategory),
                ]
            })
            .collect()
    }
}

impl Tabular for WeeklyInsights {
    fn headers(&self) -> &'static [&'static str] {
        &[
            "country",
            "category",
            "subcategory",
            "status",
            "first_seen_date",
            "rank",
            "app",
            "app_id",
        ]
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    r.country.clone(),
                    r.category.clone(),
                    opt(&r.subcategory),
                    r.status.to_string(),
                    format_date(r.first_seen_date),
                    r.rank.to_string(),
                    r.app_name.clone(),
                    r.app_id.clone(),
                ]
            })
            .collect()
    }
}

impl Tabular for WeeklyTrending {
    fn headers(&self) -> &'static [&'static str] {
        &["rank", "last_week_rank", "rank_delta", "app_name", "developer_name", "app_id"]
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    r.rank.to_string(),
                    r.last_week_rank.to_string(),
                    format!("{:+}", r.rank_delta),
                    r.app_name.clone(),
                    opt(&r.developer_name),
                    r.app_id.clone(),
                ]
            })
            .collect()
    }
}

impl Tabular for HistoryReport {
    fn headers(&self) -> &'static [&'static str] {
        &[
            "date",
            "status",
            "rank",
            "previous_rank",
            "app_name",
            "app_id",
            "replaced_app_name",
            "replaced_current_rank",
            "replaced_status",
            "replaced_by_app_name",
            "replaced_by_rank",
        ]
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    format_date(r.date),
                    r.status.to_string(),
                    opt(&r.rank),
                    opt(&r.previous_rank),
                    r.app_name.clone(),
                    r.app_id.clone(),
                    opt(&r.replaced_app_name),
                    opt(&r.replaced_current_rank),
                    opt(&r.replaced_status),
                    opt(&r.replaced_by_app_name),
                    opt(&r.replaced_by_rank),
                ]
            })
            .collect()
    }
}

pub fn to_json<T: Serialize>(report: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn to_csv<T: Tabular>(report: &T) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(report.headers())?;
    for record in report.records() {
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("csv flush failed: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Fixed-width columns sized to the widest cell.
pub fn to_table<T: Tabular>(report: &T) -> String {
    let headers = report.headers();
    let records = report.records();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for record in &records {
        for (i, cell) in record.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |cells: Vec<String>, out: &mut String| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    };

    line(headers.iter().map(|h| h.to_uppercase()).collect(), &mut out);
    line(widths.iter().map(|w| "-".repeat(*w)).collect(), &mut out);
    for record in records {
        line(record, &mut out);
    }
    out
}

pub fn render<T: Serialize + Tabular>(report: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Csv => to_csv(report),
        OutputFormat::Table => Ok(to_table(report)),
    }
}
