//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use tracing::{info, warn};

use crate::domain::CarrierId;
use crate::forecast::Forecast;
use crate::poller::PollError;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stations", get(stations))
        .route("/api/carriers", get(carriers))
        .route("/api/carriers/:id/history", get(carrier_history))
        .route("/api/forecast", get(forecast))
        .route("/api/connection", get(connection))
        .route("/api/connection/reconnect", post(reconnect))
        .route("/api/exits", get(exits))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn stations(State(state): State<AppState>) -> Json<StationsResponse> {
    let store = state.store.read().await;

    Json(StationsResponse {
        snapshot_at: store.snapshot_at(),
        link_healthy: store.link_healthy(),
        stale: store.is_stale(Utc::now(), state.stale_after),
        last_source: store.last_source(),
        stations: store.all_stations().cloned().collect(),
    })
}

/// Carriers currently at a station.
async fn carriers(State(state): State<AppState>) -> Json<CarriersResponse> {
    let store = state.store.read().await;
    Json(CarriersResponse {
        carriers: store.active_carriers().cloned().collect(),
    })
}

async fn carrier_history(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<HistoryResponse>, AppError> {
    let store = state.store.read().await;
    let carrier = store
        .carrier(CarrierId::new(id))
        .ok_or_else(|| AppError::NotFound {
            message: format!("unknown carrier {id}"),
        })?;

    Ok(Json(HistoryResponse::from(carrier)))
}

async fn forecast(State(state): State<AppState>) -> Json<Forecast> {
    Json(state.forecast.borrow().clone())
}

async fn connection(State(state): State<AppState>) -> Json<ConnectionResponse> {
    Json(ConnectionResponse::from(&state.stream))
}

/// Manual reconnect. Accepted even when already connected; the client
/// ignores redundant requests.
async fn reconnect(State(state): State<AppState>) -> (StatusCode, Json<ConnectionResponse>) {
    info!("manual reconnect requested");
    state.stream.connect();
    (StatusCode::ACCEPTED, Json(ConnectionResponse::from(&state.stream)))
}

async fn exits(State(state): State<AppState>) -> Result<Json<ExitsResponse>, AppError> {
    let exits = state.exits.recent_exits().await?;
    Ok(Json(ExitsResponse {
        exits: exits.to_vec(),
    }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound { message: String },
    Upstream { message: String },
}

impl From<PollError> for AppError {
    fn from(e: PollError) -> Self {
        AppError::Upstream {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
        };

        if status.is_server_error() {
            warn!(%status, %message, "request failed");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
