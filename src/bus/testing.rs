//! In-memory transport for unit tests

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use super::{BusOp, BusTransport, ConnectionState};

/// Records every operation and lets tests drive state and sessions
pub(crate) struct FakeTransport {
    state_tx: watch::Sender<ConnectionState>,
    session: AtomicU64,
    sent: Mutex<Vec<BusOp>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state_tx,
            session: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn connected() -> Self {
        let transport = Self::new();
        transport.connect();
        transport
    }

    /// Start a new session
    pub(crate) fn connect(&self) {
        self.session.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Connected);
    }

    pub(crate) fn disconnect(&self) {
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    pub(crate) fn sent(&self) -> Vec<BusOp> {
        self.sent.lock().clone()
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.sent.lock().iter().filter(|op| op.name() == name).count()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl BusTransport for FakeTransport {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn send(&self, op: BusOp) {
        self.sent.lock().push(op);
    }
}
