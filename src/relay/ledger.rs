//! Bounded, timestamp-ordered history buffer
//!
//! Entries are appended in timestamp order and the oldest entry is evicted
//! once capacity is reached. A reader that is slower than the eviction rate
//! silently misses entries; that is accepted, not reported.

use std::collections::VecDeque;

use crate::models::{CameraFrame, MessageEnvelope};

/// Anything stored in a [`BoundedLedger`]
pub trait Timestamped {
    fn timestamp(&self) -> u64;
}

impl Timestamped for MessageEnvelope {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl Timestamped for CameraFrame {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// FIFO ring buffer queryable by "everything after timestamp T"
#[derive(Debug, Clone)]
pub struct BoundedLedger<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Timestamped + Clone> BoundedLedger<T> {
    /// Create a ledger holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full
    ///
    /// Returns the evicted entry, if any.
    pub fn append(&mut self, entry: T) -> Option<T> {
        debug_assert!(
            self.entries
                .back()
                .map(|last| last.timestamp() <= entry.timestamp())
                .unwrap_or(true),
            "ledger entries must be appended in timestamp order"
        );

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Entries with `timestamp > since`, in insertion order
    pub fn query_after(&self, since: u64) -> Vec<T> {
        let start = self.entries.partition_point(|e| e.timestamp() <= since);
        self.entries.range(start..).cloned().collect()
    }

    pub fn latest_timestamp(&self) -> Option<u64> {
        self.entries.back().map(Timestamped::timestamp)
    }

    pub fn oldest_timestamp(&self) -> Option<u64> {
        self.entries.front().map(Timestamped::timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
