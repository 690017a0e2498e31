//! WebSocket handlers
//!
//! Per-client queues are bounded; a client that cannot keep up misses
//! messages instead of growing memory.

pub mod logs;
