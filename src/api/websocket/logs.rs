//! Log WebSocket handler
//!
//! Pure fan-out: every message recorded by the relay is pushed to each
//! connected client. Nothing is replayed on connect; clients that need
//! history poll the messages endpoint.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::api::server::AppState;

/// WebSocket handler for log streaming
pub async fn logs_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_logs_ws(socket, state))
}

async fn handle_logs_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Detached from the broadcast set when dropped with the send task.
    let mut client = state.hub.broadcast().register();
    let client_id = client.id();

    let mut send_task = tokio::spawn(async move {
        while let Some(json) = client.recv().await {
            if sender.send(Message::Text(json.to_string())).await.is_err() {
                debug!("Log WebSocket send failed");
                break;
            }
        }
    });

    // Incoming frames carry no payload; watch for close only
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Log WebSocket received close");
                    break;
                }
                Err(e) => {
                    debug!("Log WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut receive_task => {}
    }

    send_task.abort();
    receive_task.abort();
    let _ = tokio::join!(send_task, receive_task);

    info!(client = %client_id, "Log WebSocket disconnected");
}
