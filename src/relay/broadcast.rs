//! Live broadcast channel
//!
//! Fans non-camera messages out to every connected streaming client. There
//! is no replay: a client only sees what is broadcast while it is attached.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Set of currently attached clients
pub struct LiveBroadcast {
    clients: DashMap<Uuid, mpsc::Sender<Arc<str>>>,
    buffer: usize,
}

impl LiveBroadcast {
    /// `buffer` is the number of messages queued per client before new ones
    /// are dropped for that client
    pub fn new(buffer: usize) -> Self {
        Self {
            clients: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Attach a new client; it is detached when the returned handle drops
    pub fn register(self: &Arc<Self>) -> BroadcastClient {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.attach(tx);
        info!(client = %id, clients = self.client_count(), "Log client connected");

        BroadcastClient {
            id,
            rx,
            channel: self.clone(),
        }
    }

    /// Attach a raw sender; it stays until a broadcast finds it closed
    pub fn attach(&self, tx: mpsc::Sender<Arc<str>>) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        id
    }

    pub fn detach(&self, id: &Uuid) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Serialize once and write to every ready client
    ///
    /// Clients whose receiving side is gone are removed. Clients whose queue
    /// is full miss this message but stay attached. Returns the number of
    /// clients the message was queued for.
    pub fn broadcast<T: Serialize>(&self, item: &T) -> usize {
        if self.clients.is_empty() {
            return 0;
        }

        let payload: Arc<str> = match serde_json::to_string(item) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize broadcast message: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        self.clients.retain(|id, tx| match tx.try_send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(client = %id, "Log client buffer full, dropping message");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = %id, "Removing closed log client");
                false
            }
        });

        delivered
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn has_clients(&self) -> bool {
        !self.clients.is_empty()
    }
}

/// Receiving side of one attached client
pub struct BroadcastClient {
    id: Uuid,
    rx: mpsc::Receiver<Arc<str>>,
    channel: Arc<LiveBroadcast>,
}

impl BroadcastClient {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next serialized message; `None` once detached
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }
}

impl Drop for BroadcastClient {
    fn drop(&mut self) {
        if self.channel.detach(&self.id) {
            info!(
                client = %self.id,
                clients = self.channel.client_count(),
                "Log client disconnected"
            );
        }
    }
}
