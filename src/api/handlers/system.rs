//! Liveness endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
    /// Live event-bus receivers; 0 means the audit recorder has stopped.
    event_subscribers: usize,
    /// Whether admin routes accept a token.
    admin_enabled: bool,
}

/// `GET /health`: Liveness and wiring summary.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reports version, server time, the number of event subscribers and whether admin routes are enabled.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let event_subscribers = state.event_bus.receiver_count();
    let status = if event_subscribers == 0 {
        "degraded"
    } else {
        "healthy"
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        event_subscribers,
        admin_enabled: state.admin_token.is_some(),
    })
}

/// Root-level routes, outside `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
