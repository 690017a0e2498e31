//! Container management handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::json_body;
use crate::api::server::AppState;
use crate::error::{RelayError, Result};
use crate::models::{non_empty_str, ContainerRequest};

/// Running containers
pub async fn list_running(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let containers = state.containers.list(false).await?;
    Ok(Json(json!({
        "success": true,
        "count": containers.len(),
        "containers": containers,
    })))
}

/// All containers, including stopped ones
pub async fn list_all(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let containers = state.containers.list(true).await?;
    Ok(Json(json!({
        "success": true,
        "count": containers.len(),
        "containers": containers,
    })))
}

pub async fn start_container(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ContainerRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(payload)?;
    let id = container_id(&req)?;

    let output = state.containers.start(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Container {} started successfully", id),
        "output": output,
    })))
}

pub async fn stop_container(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ContainerRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(payload)?;
    let id = container_id(&req)?;

    let output = state.containers.stop(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Container {} stopped successfully", id),
        "output": output,
    })))
}

fn container_id(req: &ContainerRequest) -> Result<&str> {
    non_empty_str(req.container_id.as_ref()).ok_or_else(|| {
        RelayError::InvalidRequest("containerId is required and must be a string".into())
    })
}
