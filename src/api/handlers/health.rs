//! Health check endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Liveness of the relay process itself
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ros-relay",
            "uptimeSecs": state.started_at.elapsed().as_secs(),
        })),
    )
}

/// Per-channel connectivity report
pub async fn relay_health(State(state): State<AppState>) -> impl IntoResponse {
    let signals = state.hub.signals(&state.bus);
    Json(state.health.evaluate(&signals))
}
