//! Upstream bus connection
//!
//! This module owns everything that talks to the robot's pub/sub bus:
//! - The rosbridge wire protocol
//! - The reconnecting WebSocket transport
//! - Topic subscription multiplexing and dispatch
//! - The client facade used by the rest of the relay

pub mod client;
pub mod multiplexer;
pub mod protocol;
pub mod rosbridge;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{BusClient, DEFAULT_CONSUMER};
pub use multiplexer::TopicMultiplexer;
pub use protocol::{BusFrame, BusOp};
pub use rosbridge::{RosbridgeTransport, RosbridgeWorker};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Connection state of the upstream bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback invoked once per inbound message on a subscribed topic
pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// A message received from the bus, waiting to be dispatched
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Value,
}

/// Low-level, fire-and-forget access to the upstream bus
///
/// Implementations never report per-operation failures; callers observe
/// trouble only through [`BusTransport::state`] transitions.
pub trait BusTransport: Send + Sync {
    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Number of the current bus session, bumped on every successful connect
    fn session(&self) -> u64;

    /// Receiver that observes every state transition
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// Queue an operation for the current session
    fn send(&self, op: BusOp);

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}
