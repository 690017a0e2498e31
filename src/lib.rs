//! ROS Relay - rosbridge to browser relay
//!
//! Bridges a robot's rosbridge pub/sub bus to web clients.
//!
//! ## Features
//!
//! - Single reconnecting rosbridge connection with per-topic subscription multiplexing
//! - Bounded message ledger queryable by timestamp
//! - Camera frames pushed over Server-Sent Events with resume support
//! - Live log fan-out over WebSocket
//! - Subscriptions re-established automatically after a bus reconnect
//! - Per-channel health reporting
//! - Container CLI shim for the robot's services

pub mod api;
pub mod bus;
pub mod config;
pub mod containers;
pub mod error;
pub mod models;
pub mod relay;
pub mod services;

pub use config::Config;
pub use error::{RelayError, Result};
