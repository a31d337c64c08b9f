//! HTTP status API.
//!
//! Provides endpoints for:
//! - Service health and poll failures
//! - The decoded forecast series
//! - Rain outlook evaluated at request time
//! - Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use radar_common::{ForecastPoint, GridCoordinate, RainOutlook};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Location;
use crate::poller::SharedSnapshot;

pub struct ServerState {
    pub snapshot: SharedSnapshot,
    pub location: Location,
    pub prometheus: Option<PrometheusHandle>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub grid: GridCoordinate,
    pub updated_at: Option<DateTime<Utc>>,
    pub forecasts: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Router
// ============================================================================

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/forecast", get(forecast_handler))
        .route("/outlook", get(outlook_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let status = match (snapshot.updated_at, snapshot.consecutive_failures) {
        (None, _) => "starting",
        (Some(_), 0) => "ok",
        (Some(_), _) => "degraded",
    };

    Json(HealthResponse {
        service: "rain-radar".to_string(),
        status: status.to_string(),
        updated_at: snapshot.updated_at,
        last_error: snapshot.last_error.clone(),
        consecutive_failures: snapshot.consecutive_failures,
    })
}

/// GET /forecast - decoded points, ascending by prediction time
async fn forecast_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(ForecastResponse {
        latitude: state.location.latitude,
        longitude: state.location.longitude,
        grid: state.location.grid,
        updated_at: snapshot.updated_at,
        forecasts: snapshot.forecasts.clone(),
    })
}

/// GET /outlook - derived views at the current time
async fn outlook_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    let snapshot = state.snapshot.read().await;
    if snapshot.updated_at.is_none() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "no radar data fetched yet".to_string(),
            }),
        )
            .into_response();
    }

    Json(RainOutlook::evaluate(&snapshot.forecasts, Utc::now())).into_response()
}

/// GET /metrics - Prometheus exposition
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
