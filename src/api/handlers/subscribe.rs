//! Topic subscription handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;

use super::json_body;
use crate::api::server::AppState;
use crate::error::{RelayError, Result};
use crate::models::{SubscribeRequest, UnsubscribeRequest};
use crate::services::{RequiredSubscription, LEDGER_CONSUMER};

/// Record every message on a topic into the ledger
///
/// Succeeds regardless of the bus state; the supervisor subscribes as soon
/// as the bus is (re)connected.
pub async fn subscribe(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(payload)?;

    let (Some(topic), Some(kind)) = (
        req.topic.as_deref().map(str::trim).filter(|t| !t.is_empty()),
        req.message_type.as_deref().map(str::trim).filter(|k| !k.is_empty()),
    ) else {
        return Err(RelayError::InvalidRequest(
            "topic and messageType are required".into(),
        ));
    };

    let handler = state.hub.recorder(topic, kind);
    let subscribed = state.supervisor.require(RequiredSubscription::new(
        topic,
        kind,
        LEDGER_CONSUMER,
        handler,
    ));

    info!(topic, kind, subscribed, "Client subscribe request");

    Ok(Json(json!({
        "success": true,
        "message": format!("Subscribed to {}", topic),
        "connected": state.bus.is_connected(),
    })))
}

/// Stop recording a topic
pub async fn unsubscribe(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(payload)?;
    let topic = req
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("topic is required".into()))?;

    let released = state.supervisor.release(topic, LEDGER_CONSUMER);

    Ok(Json(json!({
        "success": true,
        "message": format!("Unsubscribed from {}", topic),
        "released": released,
    })))
}
