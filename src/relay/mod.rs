//! Relay and buffering core
//!
//! - [`ledger`]: bounded, timestamp-ordered message history
//! - [`camera`]: latest-frames buffer with per-client push streams
//! - [`broadcast`]: live fan-out to streaming log clients
//! - [`health`]: channel status derivation
//! - [`hub`]: the owned object tying the buffers together

pub mod broadcast;
pub mod camera;
pub mod clock;
pub mod health;
pub mod hub;
pub mod ledger;

pub use broadcast::{BroadcastClient, LiveBroadcast};
pub use camera::{frame_bytes, CameraDistributor, FrameCursor};
pub use clock::{now_millis, MonotonicClock};
pub use health::{HealthAggregator, HealthSignals};
pub use hub::RelayHub;
pub use ledger::{BoundedLedger, Timestamped};
