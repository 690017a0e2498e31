use serde::Serialize;

use crate::bus::ConnectionState;

/// Three-way status of one logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Disconnected => "disconnected",
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-channel status block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatuses {
    pub stream: ChannelStatus,
    pub command: ChannelStatus,
    pub log: ChannelStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusDetails {
    pub state: ConnectionState,
    pub connected: bool,
    pub session: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDetails {
    pub active: bool,
    pub last_message_time: Option<u64>,
    pub last_frame_age_ms: Option<u64>,
    pub buffered_frames: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketDetails {
    pub has_clients: bool,
    pub client_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerDetails {
    pub size: usize,
    pub capacity: usize,
}

/// Raw signals behind the channel statuses
#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub bus: BusDetails,
    pub camera: CameraDetails,
    pub websocket: WebSocketDetails,
    pub ledger: LedgerDetails,
}

/// Health query response
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub success: bool,
    pub status: ChannelStatuses,
    pub details: HealthDetails,
}
