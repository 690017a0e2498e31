//! Outbound command and publish handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use super::json_body;
use crate::api::server::AppState;
use crate::error::{RelayError, Result};
use crate::models::{CommandRequest, PublishRequest};

/// Publish a text command for the robot
pub async fn send_command(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CommandRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(payload)?;
    // Published verbatim, padding included
    let command = req
        .command
        .as_ref()
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            RelayError::InvalidRequest("command is required and must be a string".into())
        })?;

    if !state.bus.is_connected() {
        return Err(RelayError::BusUnavailable);
    }

    let relay = &state.config.relay;
    let message = json!({ "data": command });
    state
        .bus
        .publish(&relay.command_topic, &relay.command_message_type, message.clone());
    state.hub.record(
        &relay.command_topic,
        Some(&relay.command_message_type),
        message,
    );

    info!(topic = %relay.command_topic, command, "Command sent");

    Ok(Json(json!({
        "success": true,
        "message": format!("Command '{}' was sent to the robot", command),
    })))
}

/// Publish an arbitrary message on any topic
pub async fn publish(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PublishRequest>, JsonRejection>,
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

    let message = match req.message {
        Some(message) if message.is_object() => message,
        _ => {
            return Err(RelayError::InvalidRequest(
                "message must be a JSON object".into(),
            ))
        }
    };

    if !state.bus.is_connected() {
        return Err(RelayError::BusUnavailable);
    }

    state.bus.publish(topic, kind, message.clone());
    let envelope = state.hub.record(topic, Some(kind), message);

    info!(topic, kind, "Message published");

    Ok(Json(json!({
        "success": true,
        "message": format!("Published to {}", topic),
        "timestamp": envelope.timestamp,
    })))
}
