//! HTTP server for on-demand imports and read access to stored series.
//!
//! Provides endpoints for:
//! - `POST /api/import` - Import one parameter/region pair
//! - `GET /api/regions`, `GET /api/regions/:code`
//! - `GET /api/parameters`, `GET /api/parameters/:code`
//! - `GET /api/weather-data` - Filtered data points
//! - `GET /api/weather-data/{by-region-parameter,seasonal,annual}/:region/:parameter`
//! - `GET /api/stats` - Row counts
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use climate_store::{ClimateStore, DataQuery};
use metrics_exporter_prometheus::PrometheusHandle;
use metoffice_parser::PeriodType;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::pipeline::Importer;

// ============================================================================
// Shared State
// ============================================================================

pub struct ServerState {
    pub importer: Importer,
    /// Present when a Prometheus recorder is installed
    pub prometheus: Option<PrometheusHandle>,
}

impl ServerState {
    fn store(&self) -> &dyn ClimateStore {
        self.importer.store().as_ref()
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Request body for `POST /api/import`.
#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub parameter_code: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub records_imported: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub regions_count: u64,
    pub parameters_count: u64,
    pub data_count: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Query string for `GET /api/weather-data`.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherDataParams {
    pub region: Option<String>,
    pub parameter: Option<String>,
    pub year: Option<i32>,
    pub period_type: Option<String>,
    pub month: Option<u8>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Query string for the per-series endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SeriesParams {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub period_type: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn parse_period_type(raw: Option<&str>) -> Result<Vec<PeriodType>, Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Vec::new()),
        Some(value) => value
            .parse::<PeriodType>()
            .map(|p| vec![p])
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ============================================================================
// Router
// ============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/import", post(import_handler))
        .route("/api/regions", get(regions_handler))
        .route("/api/regions/:code", get(region_detail_handler))
        .route("/api/parameters", get(parameters_handler))
        .route("/api/parameters/:code", get(parameter_detail_handler))
        .route("/api/weather-data", get(weather_data_handler))
        .route(
            "/api/weather-data/by-region-parameter/:region/:parameter",
            get(by_region_parameter_handler),
        )
        .route(
            "/api/weather-data/seasonal/:region/:parameter",
            get(seasonal_handler),
        )
        .route(
            "/api/weather-data/annual/:region/:parameter",
            get(annual_handler),
        )
        .route("/api/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/import - Import one parameter/region pair
async fn import_handler(
    Extension(state): Extension<Arc<ServerState>>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Response {
    let id = Uuid::new_v4().to_string();

    // A body that is not a JSON object of strings carries no usable codes
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(id = %id, error = %rejection, "Rejected import request body");
            ImportRequest::default()
        }
    };

    let (Some(parameter_code), Some(region_code)) = (
        non_empty(request.parameter_code),
        non_empty(request.region_code),
    ) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Both parameter_code and region_code are required",
        );
    };

    info!(
        id = %id,
        parameter = %parameter_code,
        region = %region_code,
        "Received import request"
    );

    match state.importer.import(&parameter_code, &region_code).await {
        Ok(outcome) => {
            metrics::record_pair(true);
            info!(id = %id, records = outcome.records_imported(), "Import completed");

            (
                StatusCode::OK,
                Json(ImportResponse {
                    success: true,
                    message: format!(
                        "Data imported successfully for {} in {}",
                        parameter_code, region_code
                    ),
                    records_imported: outcome.records_imported(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            metrics::record_pair(false);
            error!(id = %id, error = %e, "Import failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/regions - List regions
async fn regions_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match state.store().list_regions(query.search.as_deref()).await {
        Ok(regions) => Json(regions).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/regions/:code - Region detail
async fn region_detail_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Path(code): Path<String>,
) -> Response {
    match state.store().find_region(&code).await {
        Ok(Some(region)) => Json(region).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Region not found: {}", code)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/parameters - List parameters
async fn parameters_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match state.store().list_parameters(query.search.as_deref()).await {
        Ok(parameters) => Json(parameters).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/parameters/:code - Parameter detail
async fn parameter_detail_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Path(code): Path<String>,
) -> Response {
    match state.store().find_parameter(&code).await {
        Ok(Some(parameter)) => Json(parameter).into_response(),
        Ok(None) => {
            error_response(StatusCode::NOT_FOUND, format!("Parameter not found: {}", code))
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn run_query(state: &ServerState, query: DataQuery) -> Response {
    match state.store().query_data(&query).await {
        Ok(points) => Json(points).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/weather-data - Filtered data points
async fn weather_data_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(params): Query<WeatherDataParams>,
) -> Response {
    let period_types = match parse_period_type(params.period_type.as_deref()) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let query = DataQuery {
        region: non_empty(params.region),
        parameter: non_empty(params.parameter),
        year: params.year,
        start_year: params.start_year,
        end_year: params.end_year,
        period_types,
        month: params.month,
        limit: params.limit,
        offset: params.offset,
    };

    run_query(&state, query).await
}

/// GET /api/weather-data/by-region-parameter/:region/:parameter
async fn by_region_parameter_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Path((region, parameter)): Path<(String, String)>,
    Query(params): Query<SeriesParams>,
) -> Response {
    let period_types = match parse_period_type(params.period_type.as_deref()) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let query = DataQuery::series(region, parameter)
        .with_period_types(period_types)
        .with_year_range(params.start_year, params.end_year);

    run_query(&state, query).await
}

/// GET /api/weather-data/seasonal/:region/:parameter
async fn seasonal_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Path((region, parameter)): Path<(String, String)>,
    Query(params): Query<SeriesParams>,
) -> Response {
    let query = DataQuery::series(region, parameter)
        .with_period_types(PeriodType::SEASONS)
        .with_year_range(params.start_year, params.end_year);

    run_query(&state, query).await
}

/// GET /api/weather-data/annual/:region/:parameter
async fn annual_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Path((region, parameter)): Path<(String, String)>,
    Query(params): Query<SeriesParams>,
) -> Response {
    let query = DataQuery::series(region, parameter)
        .with_period_types([PeriodType::Annual])
        .with_year_range(params.start_year, params.end_year);

    run_query(&state, query).await
}

/// GET /api/stats - Row counts
async fn stats_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    match state.store().stats().await {
        Ok(stats) => Json(StatsResponse {
            regions_count: stats.regions,
            parameters_count: stats.parameters,
            data_count: stats.data_points,
            last_updated: Utc::now(),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "importer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting importer HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
