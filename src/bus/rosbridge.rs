//! rosbridge WebSocket transport
//!
//! The transport half is shared with the rest of the relay and only queues
//! operations. The worker half owns the socket, reconnects forever and
//! forwards inbound `publish` frames to the dispatcher.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::{BusFrame, BusOp, BusTransport, ConnectionState, InboundMessage};
use crate::config::BusConfig;
use crate::error::{RelayError, Result};

/// Maximum number of operations queued for the socket writer
pub const OUTBOUND_BUFFER: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An operation tagged with the session it was issued in
struct Outbound {
    session: u64,
    op: BusOp,
}

/// How a connected session ended
enum SessionEnd {
    Closed,
    Failed(RelayError),
    Shutdown,
}

/// Shared, non-blocking side of the rosbridge connection
pub struct RosbridgeTransport {
    url: String,
    state_tx: watch::Sender<ConnectionState>,
    session: AtomicU64,
    outbound: mpsc::Sender<Outbound>,
}

impl RosbridgeTransport {
    /// Create the transport and the worker that drives it
    ///
    /// Nothing connects until [`RosbridgeWorker::run`] is spawned.
    pub fn new(config: BusConfig) -> (Arc<Self>, RosbridgeWorker) {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

        let transport = Arc::new(Self {
            url: config.url.clone(),
            state_tx,
            session: AtomicU64::new(0),
            outbound: outbound_tx,
        });

        let worker = RosbridgeWorker {
            transport: transport.clone(),
            config,
            outbound: outbound_rx,
        };

        (transport, worker)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn begin_session(&self) -> u64 {
        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connected);
        session
    }
}

impl BusTransport for RosbridgeTransport {
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
        if !self.is_connected() {
            debug!(op = op.name(), topic = op.topic(), "Bus not connected, dropping operation");
            return;
        }

        let outbound = Outbound {
            session: self.session(),
            op,
        };

        match self.outbound.try_send(outbound) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    op = dropped.op.name(),
                    topic = dropped.op.topic(),
                    "Outbound bus queue full, dropping operation"
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Bus worker stopped, dropping operation");
            }
        }
    }
}

/// Owns the WebSocket and the reconnect loop
pub struct RosbridgeWorker {
    transport: Arc<RosbridgeTransport>,
    config: BusConfig,
    outbound: mpsc::Receiver<Outbound>,
}

impl RosbridgeWorker {
    /// Connect, pump frames, and reconnect until shutdown
    pub async fn run(
        mut self,
        inbound: mpsc::Sender<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("ROS client connecting to {}", self.config.url);

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.transport.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = self.connect() => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(ws) => {
                    let session = self.transport.begin_session();
                    info!(session, "ROS connected");

                    let end = self.drive(ws, session, &inbound, &mut shutdown).await;
                    self.transport.set_state(ConnectionState::Disconnected);

                    match end {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed => warn!(session, "ROS connection closed"),
                        SessionEnd::Failed(e) => warn!(session, "ROS connection lost: {}", e),
                    }
                }
                Err(e) => {
                    self.transport.set_state(ConnectionState::Disconnected);
                    warn!("ROS connection failed: {}", e);
                }
            }

            let delay = self.reconnect_delay();
            debug!("Reconnecting to ROS in {:?}", delay);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.transport.set_state(ConnectionState::Disconnected);
        info!("ROS client stopped");
    }

    async fn connect(&self) -> Result<WsStream> {
        let secs = self.config.connect_timeout.as_secs();

        match timeout(self.config.connect_timeout, connect_async(self.config.url.as_str())).await {
            Ok(result) => {
                let (ws, _response) = result?;
                Ok(ws)
            }
            Err(_) => Err(RelayError::ConnectTimeout { secs }),
        }
    }

    async fn drive(
        &mut self,
        ws: WsStream,
        session: u64,
        inbound: &mpsc::Sender<InboundMessage>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let outbound = &mut self.outbound;

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = parse_inbound(&text) {
                            if inbound.send(message).await.is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(len = data.len(), "Ignoring binary bus frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Bus sent close");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Failed(e.into()),
                    None => return SessionEnd::Closed,
                },
                queued = outbound.recv() => match queued {
                    Some(Outbound { session: issued, op }) if issued == session => {
                        let text = match serde_json::to_string(&op) {
                            Ok(text) => text,
                            Err(e) => {
                                error!("Failed to serialize bus operation: {}", e);
                                continue;
                            }
                        };

                        trace!(op = op.name(), topic = op.topic(), "Sending bus operation");
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            return SessionEnd::Failed(e.into());
                        }
                    }
                    Some(Outbound { session: issued, op }) => {
                        debug!(
                            issued,
                            session,
                            op = op.name(),
                            "Dropping operation from an earlier session"
                        );
                    }
                    None => return SessionEnd::Shutdown,
                },
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            }
        }
    }

    fn reconnect_delay(&self) -> Duration {
        let jitter_ms = self.config.reconnect_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.config.reconnect_delay + Duration::from_millis(jitter)
    }
}

/// Turn a text frame into a dispatchable message; everything else is logged
/// and dropped.
fn parse_inbound(text: &str) -> Option<InboundMessage> {
    match serde_json::from_str::<BusFrame>(text) {
        Ok(BusFrame::Publish { topic, msg }) => Some(InboundMessage {
            topic,
            payload: msg,
        }),
        Ok(BusFrame::Status { level, msg }) => {
            match level.as_str() {
                "error" | "warning" => warn!("rosbridge {}: {}", level, msg),
                _ => debug!("rosbridge {}: {}", level, msg),
            }
            None
        }
        Ok(BusFrame::Other) => {
            trace!("Ignoring unsupported bus frame");
            None
        }
        Err(e) => {
            warn!("Malformed bus frame dropped: {}", e);
            None
        }
    }
}
