//! Ledger poll handler

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use crate::api::server::AppState;
use crate::error::{RelayError, Result};
use crate::models::MessagesQuery;

/// Messages newer than `since`, oldest first
pub async fn list_messages(
    State(state): State<AppState>,
    query: std::result::Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;

    let since = query.since.unwrap_or(0);
    let page = state
        .hub
        .messages_after(since, query.exclude_binary.unwrap_or(false));

    debug!(since, returned = page.messages.len(), "Messages polled");
    Ok(Json(page))
}
