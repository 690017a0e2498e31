//! Health aggregation
//!
//! Channel statuses are derived on demand from a snapshot of the relay's
//! observable state; nothing here is stored between calls.

use std::time::Duration;

use crate::bus::ConnectionState;
use crate::models::{
    BusDetails, CameraDetails, ChannelStatus, ChannelStatuses, HealthDetails, HealthReport,
    LedgerDetails, WebSocketDetails,
};

/// Raw signals the aggregator looks at
#[derive(Debug, Clone, Default)]
pub struct HealthSignals {
    pub bus_state: ConnectionState,
    pub session: u64,
    pub last_frame_time: Option<u64>,
    pub last_frame_age: Option<Duration>,
    pub buffered_frames: usize,
    pub log_clients: usize,
    pub ledger_size: usize,
    pub ledger_capacity: usize,
}

/// Maps [`HealthSignals`] to per-channel statuses
#[derive(Debug, Clone, Copy)]
pub struct HealthAggregator {
    stream_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(stream_timeout: Duration) -> Self {
        Self { stream_timeout }
    }

    pub fn stream_timeout(&self) -> Duration {
        self.stream_timeout
    }

    /// Whether the camera has produced a frame within the timeout window
    pub fn camera_active(&self, signals: &HealthSignals) -> bool {
        signals
            .last_frame_age
            .map(|age| age < self.stream_timeout)
            .unwrap_or(false)
    }

    pub fn statuses(&self, signals: &HealthSignals) -> ChannelStatuses {
        let gate = |live: bool| match signals.bus_state {
            ConnectionState::Disconnected => ChannelStatus::Disconnected,
            ConnectionState::Connecting => ChannelStatus::Connecting,
            ConnectionState::Connected if live => ChannelStatus::Connected,
            ConnectionState::Connected => ChannelStatus::Disconnected,
        };

        ChannelStatuses {
            stream: gate(self.camera_active(signals)),
            command: gate(true),
            log: gate(signals.log_clients > 0),
        }
    }

    pub fn evaluate(&self, signals: &HealthSignals) -> HealthReport {
        HealthReport {
            success: true,
            status: self.statuses(signals),
            details: HealthDetails {
                bus: BusDetails {
                    state: signals.bus_state,
                    connected: signals.bus_state == ConnectionState::Connected,
                    session: signals.session,
                },
                camera: CameraDetails {
                    active: self.camera_active(signals),
                    last_message_time: signals.last_frame_time,
                    last_frame_age_ms: signals
                        .last_frame_age
                        .map(|age| u64::try_from(age.as_millis()).unwrap_or(u64::MAX)),
                    buffered_frames: signals.buffered_frames,
                },
                websocket: WebSocketDetails {
                    has_clients: signals.log_clients > 0,
                    client_count: signals.log_clients,
                },
                ledger: LedgerDetails {
                    size: signals.ledger_size,
                    capacity: signals.ledger_capacity,
                },
            },
        }
    }
}
