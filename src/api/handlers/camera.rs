//! Camera frame stream (Server-Sent Events)

use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{self, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use tracing::info;

use crate::api::server::AppState;
use crate::error::{RelayError, Result};
use crate::models::StreamQuery;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Push every frame newer than `since`, then new frames as they arrive
///
/// The per-client ticker lives inside the response stream and is dropped
/// together with it when the client goes away.
pub async fn camera_stream(
    State(state): State<AppState>,
    query: std::result::Result<Query<StreamQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
    let since = query.since.unwrap_or(0);

    info!(since, "Camera stream client connected");

    let events = state
        .hub
        .camera()
        .subscribe(since)
        .map(|frame| Event::default().json_data(&frame));

    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        sse,
    ))
}
