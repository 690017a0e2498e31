//! Camera frame distributor
//!
//! Ingestion keeps only the latest few frames; every streaming client gets
//! its own cursor and a ticker that pushes whatever is newer than it.
//! There is no backpressure: a client that falls behind loses frames.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::Stream;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, trace, warn};

use super::clock::MonotonicClock;
use super::ledger::BoundedLedger;
use crate::error::{RelayError, Result};
use crate::models::CameraFrame;

/// Bounded "latest frames" buffer plus per-client delivery
pub struct CameraDistributor {
    frames: RwLock<BoundedLedger<CameraFrame>>,
    clock: MonotonicClock,
    last_ingest: Mutex<Option<Instant>>,
    cadence: Duration,
}

impl CameraDistributor {
    pub fn new(capacity: usize, cadence: Duration) -> Self {
        Self {
            frames: RwLock::new(BoundedLedger::new(capacity)),
            clock: MonotonicClock::new(),
            last_ingest: Mutex::new(None),
            cadence,
        }
    }

    /// Encode and buffer one frame
    pub fn ingest(&self, payload: &[u8]) -> Result<CameraFrame> {
        if payload.is_empty() {
            return Err(RelayError::EmptyFrame);
        }

        let data = STANDARD.encode(payload);
        let frame = {
            let mut frames = self.frames.write();
            let frame = CameraFrame {
                data,
                timestamp: self.clock.stamp(),
            };
            frames.append(frame.clone());
            frame
        };
        *self.last_ingest.lock() = Some(Instant::now());

        trace!(timestamp = frame.timestamp, bytes = payload.len(), "Camera frame buffered");
        Ok(frame)
    }

    /// Ingest a bus message carrying a `data` field
    ///
    /// Malformed or empty messages are logged and dropped.
    pub fn handle_message(&self, message: &Value) -> Option<CameraFrame> {
        let ingested = frame_bytes(message).and_then(|bytes| self.ingest(&bytes));
        match ingested {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Camera message dropped: {}", e);
                None
            }
        }
    }

    /// Frames with `timestamp > since`, oldest first
    pub fn frames_after(&self, since: u64) -> Vec<CameraFrame> {
        self.frames.read().query_after(since)
    }

    /// Timestamp of the newest buffered frame
    pub fn last_frame_time(&self) -> Option<u64> {
        self.frames.read().latest_timestamp()
    }

    /// Time since the last frame was ingested
    pub fn last_frame_age(&self) -> Option<Duration> {
        self.last_ingest.lock().map(|at| at.elapsed())
    }

    pub fn buffered(&self) -> usize {
        self.frames.read().len()
    }

    pub fn capacity(&self) -> usize {
        self.frames.read().capacity()
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Push stream for one client, starting after `since`
    ///
    /// Every tick delivers the frames newer than the client's cursor, in
    /// order. The first tick fires immediately, so buffered frames go out
    /// right away. Dropping the stream drops its ticker; nothing outlives
    /// the client.
    pub fn subscribe(self: &Arc<Self>, since: u64) -> impl Stream<Item = CameraFrame> + Send + 'static {
        use futures::StreamExt;

        let mut ticker = interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let distributor = self.clone();
        let mut cursor = FrameCursor::new(since);

        IntervalStream::new(ticker).flat_map(move |_| {
            let batch = cursor.advance(&distributor);
            futures::stream::iter(batch)
        })
    }
}

/// Per-client bookmark into the frame buffer
#[derive(Debug)]
pub struct FrameCursor {
    position: u64,
    delivered: u64,
}

impl FrameCursor {
    pub fn new(since: u64) -> Self {
        Self {
            position: since,
            delivered: 0,
        }
    }

    /// Collect the frames newer than the cursor and move past them
    pub fn advance(&mut self, distributor: &CameraDistributor) -> Vec<CameraFrame> {
        let frames = distributor.frames_after(self.position);
        if let Some(last) = frames.last() {
            self.position = last.timestamp;
            self.delivered += frames.len() as u64;
        }
        frames
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Drop for FrameCursor {
    fn drop(&mut self) {
        debug!(delivered = self.delivered, "Camera stream client released");
    }
}

/// Extract raw frame bytes from a bus message
///
/// rosbridge sends `uint8[]` as a base64 string; an array of byte values is
/// accepted as well.
pub fn frame_bytes(message: &Value) -> Result<Vec<u8>> {
    match message.get("data") {
        Some(Value::String(encoded)) => STANDARD
            .decode(encoded)
            .map_err(|e| RelayError::MalformedPayload(format!("invalid base64 frame: {}", e))),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| {
                RelayError::MalformedPayload("frame data must be an array of bytes".into())
            }),
        Some(Value::Null) | None => Err(RelayError::MalformedPayload(
            "message has no data field".into(),
        )),
        Some(_) => Err(RelayError::MalformedPayload(
            "frame data has an unsupported type".into(),
        )),
    }
}
