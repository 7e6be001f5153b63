//! # chartwatch CLI
//!
//! ## Usage
//!
//! ```bash
//! chartwatch --config ./config/chartwatch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chartwatch init` | Create the SQLite database and schema |
//! | `chartwatch ingest` | Load chart CSV exports into the database |
//! | `chartwatch compare` | NEW / RE-ENTRY / DROPPED / UP / DOWN / SAME for the latest snapshot |
//! | `chartwatch insights` | Apps that entered the chart this week |
//! | `chartwatch trending` | Biggest climbers against last week |
//! | `chartwatch history` | Entry and exit events per date |
//! | `chartwatch meta` | Available countries, categories, subcategories |
//! | `chartwatch stats` | Database overview |
//! | `chartwatch serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! chartwatch init
//! chartwatch ingest --dir ./exports
//! chartwatch compare --country US --category Games --subcategory ""
//! chartwatch compare --country US --mode pairwise --status NEW --format csv
//! chartwatch history --country BG --category Games --date 2025-10-07
//! ```

use chartwatch::compare::{self, CompareOptions};
use chartwatch::export::OutputFormat;
use chartwatch::{config, history, ingest, meta, migrate, server, stats, weekly};
use chartwatch_core::classify::{CompareMode, EntryRule, RankAveraging, ReentryScope};
use chartwatch_core::dimension::DimensionQuery;
use chartwatch_core::history::HistoryRequest;
use chartwatch_core::models::LifecycleStatus;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Track App Store chart snapshots and classify how apps move between them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chartwatch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "chartwatch",
    about = "Daily App Store chart snapshots with new / re-entry / dropped / mover diffs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chartwatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Which chart context to report on.
#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Two-letter storefront code (e.g. `US`, `BG`).
    #[arg(long)]
    country: Option<String>,

    /// Chart type (e.g. `top_free`). Defaults to `[classifier].chart_type`.
    #[arg(long)]
    chart_type: Option<String>,

    /// Category. Omit to match every category.
    #[arg(long)]
    category: Option<String>,

    /// Subcategory. Pass `""` for rows without one; omit to match any.
    #[arg(long)]
    subcategory: Option<String>,
}

impl From<FilterArgs> for DimensionQuery {
    fn from(args: FilterArgs) -> Self {
        DimensionQuery {
            country: args.country,
            chart_type: args.chart_type,
            category: args.category,
            subcategory: args.subcategory,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file, the `charts` table and its indexes.
    /// Running it again is safe.
    Init,

    /// Ingest chart CSV exports.
    ///
    /// Scans a directory for CSV files, infers the snapshot date from each
    /// file name, and inserts rows, ignoring ones already stored.
    Ingest {
        /// Directory to scan. Defaults to `[ingest].csv_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Parse and count rows without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify the latest snapshot against its lookback window.
    Compare {
        #[command(flatten)]
        filters: FilterArgs,

        /// Number of earlier snapshot dates to compare against.
        #[arg(long)]
        lookback_days: Option<usize>,

        /// `windowed` (mean over the window) or `pairwise` (latest window date).
        #[arg(long)]
        mode: Option<CompareMode>,

        /// How windowed means become integers: `truncate` or `round`.
        #[arg(long)]
        averaging: Option<RankAveraging>,

        /// How far back RE-ENTRY looks: `unbounded` or `bounded`.
        #[arg(long)]
        reentry_scope: Option<ReentryScope>,

        /// When an app counts as entering: `preceding` or `window`.
        #[arg(long)]
        entry_rule: Option<EntryRule>,

        /// Only show rows with this status.
        #[arg(long)]
        status: Option<LifecycleStatus>,

        /// Output format: `table`, `json`, or `csv`.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// NEW and RE-ENTRY apps of the current week.
    Insights {
        #[command(flatten)]
        filters: FilterArgs,

        /// Snapshot dates per week.
        #[arg(long)]
        lookback_days: Option<usize>,

        /// Only show `NEW` or `RE-ENTRY`.
        #[arg(long)]
        status: Option<LifecycleStatus>,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Apps on the latest date ranked by gain over last week's average.
    Trending {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long)]
        lookback_days: Option<usize>,

        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Entry and exit events between consecutive snapshot dates.
    History {
        #[command(flatten)]
        filters: FilterArgs,

        /// Report only this date (YYYY-MM-DD) against the one before it.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// How many recent dates to walk.
        #[arg(long, default_value_t = 30)]
        max_dates: usize,

        #[arg(long)]
        status: Option<LifecycleStatus>,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// List countries, chart types, categories and subcategories in the store.
    Meta {
        /// Restrict subcategories to this category.
        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show database statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dir, dry_run } => {
            ingest::run_ingest(&cfg, dir, dry_run).await?;
        }
        Commands::Compare {
            filters,
            lookback_days,
            mode,
            averaging,
            reentry_scope,
            entry_rule,
            status,
            format,
        } => {
            let options = CompareOptions {
                lookback_days,
                mode,
                averaging,
                reentry_scope,
                entry_rule,
                status,
            };
            compare::run_compare(&cfg, &filters.into(), &options, format).await?;
        }
        Commands::Insights {
            filters,
            lookback_days,
            status,
            format,
        } => {
            weekly::run_insights(&cfg, &filters.into(), lookback_days, status, format).await?;
        }
        Commands::Trending {
            filters,
            lookback_days,
            limit,
            format,
        } => {
            weekly::run_trending(&cfg, &filters.into(), lookback_days, limit, format).await?;
        }
        Commands::History {
            filters,
            date,
            max_dates,
            status,
            format,
        } => {
            let request = HistoryRequest {
                date,
                max_dates,
                status,
            };
            history::run_history(&cfg, &filters.into(), &request, format).await?;
        }
        Commands::Meta { category, format } => {
            meta::run_meta(&cfg, category.as_deref(), format).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
