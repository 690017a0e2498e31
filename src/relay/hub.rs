//! Relay hub
//!
//! Owns the message ledger, the camera distributor and the live broadcast
//! channel. Created once at startup and shared by handle.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

use super::broadcast::LiveBroadcast;
use super::camera::CameraDistributor;
use super::clock::MonotonicClock;
use super::health::HealthSignals;
use super::ledger::BoundedLedger;
use crate::bus::{BusClient, MessageHandler};
use crate::config::RelayConfig;
use crate::models::{MessageEnvelope, MessagePage};

pub struct RelayHub {
    clock: MonotonicClock,
    ledger: RwLock<BoundedLedger<MessageEnvelope>>,
    camera: Arc<CameraDistributor>,
    broadcast: Arc<LiveBroadcast>,
}

impl RelayHub {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            clock: MonotonicClock::new(),
            ledger: RwLock::new(BoundedLedger::new(config.ledger_capacity)),
            camera: Arc::new(CameraDistributor::new(
                config.camera_capacity,
                config.frame_interval,
            )),
            broadcast: Arc::new(LiveBroadcast::new(config.ws_buffer)),
        }
    }

    /// Stamp a message, store it and push it to live clients
    pub fn record(&self, topic: &str, kind: Option<&str>, payload: Value) -> MessageEnvelope {
        // Stamp under the write lock so insertion order stays timestamp order
        let envelope = {
            let mut ledger = self.ledger.write();
            let mut envelope = MessageEnvelope::new(topic, payload, self.clock.stamp());
            if let Some(kind) = kind {
                envelope = envelope.with_kind(kind);
            }
            ledger.append(envelope.clone());
            envelope
        };
        let delivered = self.broadcast.broadcast(&envelope);

        trace!(
            topic,
            timestamp = envelope.timestamp,
            delivered,
            "Message recorded"
        );
        envelope
    }

    /// Bus handler that records every message on `topic`
    pub fn recorder(self: &Arc<Self>, topic: &str, kind: &str) -> MessageHandler {
        let hub = self.clone();
        let topic = topic.to_string();
        let kind = kind.to_string();
        Arc::new(move |payload: &Value| {
            hub.record(&topic, Some(&kind), payload.clone());
        })
    }

    /// Bus handler that feeds the camera distributor
    pub fn camera_feed(&self) -> MessageHandler {
        let camera = self.camera.clone();
        Arc::new(move |payload: &Value| {
            camera.handle_message(payload);
        })
    }

    /// Poll query
    ///
    /// `latest_timestamp` is the last returned envelope's timestamp, or
    /// `since` when nothing newer is buffered.
    pub fn messages_after(&self, since: u64, exclude_binary: bool) -> MessagePage {
        let mut messages = self.ledger.read().query_after(since);
        let latest_timestamp = messages.last().map(|m| m.timestamp).unwrap_or(since);

        if exclude_binary {
            messages.retain(|m| !m.is_binary());
        }

        MessagePage {
            messages,
            latest_timestamp,
        }
    }

    pub fn camera(&self) -> &Arc<CameraDistributor> {
        &self.camera
    }

    pub fn broadcast(&self) -> &Arc<LiveBroadcast> {
        &self.broadcast
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.read().len()
    }

    pub fn ledger_capacity(&self) -> usize {
        self.ledger.read().capacity()
    }

    /// Snapshot of everything the health aggregator needs
    pub fn signals(&self, bus: &BusClient) -> HealthSignals {
        let (ledger_size, ledger_capacity) = {
            let ledger = self.ledger.read();
            (ledger.len(), ledger.capacity())
        };

        HealthSignals {
            bus_state: bus.state(),
            session: bus.session(),
            last_frame_time: self.camera.last_frame_time(),
            last_frame_age: self.camera.last_frame_age(),
            buffered_frames: self.camera.buffered(),
            log_clients: self.broadcast.client_count(),
            ledger_size,
            ledger_capacity,
        }
    }
}
