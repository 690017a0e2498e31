//! API server implementation
//!
//! REST, Server-Sent Events and WebSocket endpoints for the dashboard.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{ApiServer, AppState};
