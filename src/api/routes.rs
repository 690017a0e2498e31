//! API route definitions

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use super::handlers;
use super::server::AppState;
use super::websocket;

/// Upper bound for a single container CLI call
const CONTAINER_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/health", get(handlers::health::relay_health))
        .nest("/api/ros", ros_routes())
        .nest("/api/docker", docker_routes())
        .with_state(state)
}

/// Bus-facing routes
fn ros_routes() -> Router<AppState> {
    Router::new()
        .route("/command", post(handlers::command::send_command))
        .route("/publish", post(handlers::command::publish))
        .route("/subscribe", post(handlers::subscribe::subscribe))
        .route("/unsubscribe", post(handlers::subscribe::unsubscribe))
        .route("/messages", get(handlers::messages::list_messages))
        .route("/camera-stream", get(handlers::camera::camera_stream))
        .route("/logs-ws", get(websocket::logs::logs_ws))
}

/// Container CLI routes
fn docker_routes() -> Router<AppState> {
    Router::new()
        .route("/ps", get(handlers::docker::list_running))
        .route("/ps-all", get(handlers::docker::list_all))
        .route("/start", post(handlers::docker::start_container))
        .route("/stop", post(handlers::docker::stop_container))
        .layer(TimeoutLayer::new(CONTAINER_TIMEOUT))
}
