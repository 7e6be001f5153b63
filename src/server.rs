//! Read-only JSON/CSV HTTP API over the chart store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/meta` | Countries, chart types, categories, subcategories, latest date |
//! | `GET`  | `/compare` | Lifecycle report for the latest snapshot |
//! | `GET`  | `/weekly/insights` | NEW and RE-ENTRY apps of the current week |
//! | `GET`  | `/weekly/trending` | Biggest climbers against last week's average |
//! | `GET`  | `/history` | Entry and exit events per date |
//!
//! Report endpoints share the query parameters `country`, `chart_type`,
//! `category`, `subcategory`, `lookback_days`, `status` and `format`.
//! `subcategory=` (empty) selects rows without a subcategory; leaving it
//! out matches every subcategory. `format=csv` returns `text/csv`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid dimension key: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chartwatch_core::classify::{CompareMode, EntryRule, RankAveraging, ReentryScope};
use chartwatch_core::dimension::DimensionQuery;
use chartwatch_core::history::HistoryRequest;
use chartwatch_core::models::{parse_date, LifecycleStatus};
use chartwatch_core::ChartError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::compare::{compare_report, CompareOptions};
use crate::config::Config;
use crate::export::{self, Tabular};
use crate::history::history_report;
use crate::meta::{load_meta, Meta};
use crate::sqlite_store::SqliteSnapshotStore;
use crate::weekly::{insights_report, trending_report};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteSnapshotStore>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteSnapshotStore) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }
}

/// Build the router. Split from [`run_server`] so tests can serve it on an
/// ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(handle_health))
        .route("/meta", get(handle_meta))
        .route("/compare", get(handle_compare))
        .route("/weekly/insights", get(handle_insights))
        .route("/weekly/trending", get(handle_trending))
        .route("/history", get(handle_history))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteSnapshotStore::open(config).await?;
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config.clone(), store));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "chartwatch server listening");
    println!("chartwatch server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<ChartError> for AppError {
    fn from(err: ChartError) -> Self {
        if err.is_client_error() {
            bad_request(err.to_string())
        } else {
            tracing::error!(error = %err, "request failed");
            internal(err.to_string())
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        internal(format!("{:#}", err))
    }
}

// ============ Query parameters ============

#[derive(Debug, Default, Deserialize)]
struct ReportParams {
    country: Option<String>,
    chart_type: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    lookback_days: Option<usize>,
    mode: Option<String>,
    averaging: Option<String>,
    reentry_scope: Option<String>,
    entry_rule: Option<String>,
    status: Option<String>,
    date: Option<String>,
    max_dates: Option<usize>,
    limit: Option<usize>,
    format: Option<String>,
}

impl ReportParams {
    fn dimension_query(&self) -> DimensionQuery {
        DimensionQuery {
            country: self.country.clone(),
            chart_type: self.chart_type.clone(),
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
        }
    }

    fn wants_csv(&self) -> bool {
        self.format
            .as_deref()
            .map(|f| f.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }
}

/// Parse an optional, possibly blank, parameter.
fn parse_opt<T: FromStr<Err = ChartError>>(value: &Option<String>) -> Result<Option<T>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(AppError::from),
    }
}

fn respond<T: Serialize + Tabular>(report: &T, csv: bool) -> Result<Response, AppError> {
    if csv {
        let body = export::to_csv(report)?;
        Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
    } else {
        Ok(Json(serde_json::to_value(report).map_err(anyhow::Error::from)?).into_response())
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
struct MetaParams {
    category: Option<String>,
}

async fn handle_meta(
    State(state): State<AppState>,
    Query(params): Query<MetaParams>,
) -> Result<Json<Meta>, AppError> {
    let category = params.category.as_deref().filter(|c| !c.trim().is_empty());
    Ok(Json(load_meta(state.store.pool(), category).await?))
}

async fn handle_compare(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, AppError> {
    let options = CompareOptions {
        lookback_days: params.lookback_days,
        mode: parse_opt::<CompareMode>(&params.mode)?,
        averaging: parse_opt::<RankAveraging>(&params.averaging)?,
        reentry_scope: parse_opt::<ReentryScope>(&params.reentry_scope)?,
        entry_rule: parse_opt::<EntryRule>(&params.entry_rule)?,
        status: parse_opt::<LifecycleStatus>(&params.status)?,
    };
    let report = compare_report(&state.store, &state.config, &params.dimension_query(), &options).await?;
    respond(&report, params.wants_csv())
}

async fn handle_insights(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, AppError> {
    let status = parse_opt::<LifecycleStatus>(&params.status)?;
    let report = insights_report(
        &state.store,
        &state.config,
        &params.dimension_query(),
        params.lookback_days,
        status,
    )
    .await?;
    respond(&report, params.wants_csv())
}

async fn handle_trending(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, AppError> {
    let averaging = parse_opt::<RankAveraging>(&params.averaging)?;
    let report = trending_report(
        &state.store,
        &state.config,
        &params.dimension_query(),
        params.lookback_days,
        averaging,
        params.limit,
    )
    .await?;
    respond(&report, params.wants_csv())
}

async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Response, AppError> {
    let date = match params.date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(d) => Some(parse_date(d)?),
    };
    let request = HistoryRequest {
        date,
        max_dates: params.max_dates.unwrap_or(HistoryRequest::default().max_dates),
        status: parse_opt::<LifecycleStatus>(&params.status)?,
    };
    let report = history_report(&state.store, &state.config, &params.dimension_query(), &request).await?;
    respond(&report, params.wants_csv())
}
