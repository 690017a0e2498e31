//! Strictly increasing millisecond timestamps

use std::sync::atomic::{AtomicU64, Ordering};

/// Wall-clock milliseconds that never repeat or go backwards
///
/// Two stamps taken within the same millisecond differ by one, so a
/// `timestamp > cursor` query never skips an entry.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&self) -> u64 {
        let now = now_millis();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    /// Last stamp handed out, 0 if none
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
