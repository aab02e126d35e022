//! Record Window - Bounded FIFO of Recent Feed Records
//!
//! Holds the trailing horizon a live chart needs. Append-and-evict-oldest:
//! once `capacity` is reached each new record pushes the head out.
//! Eviction is by arrival order, never by timestamp.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

use super::record::FeedRecord;

/// Default number of records kept per connection.
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Ordered, size-bounded sequence of feed records.
#[derive(Debug, Clone)]
pub struct RecordWindow {
    records: VecDeque<FeedRecord>,
    capacity: usize,
}

impl RecordWindow {
    /// Create an empty window.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; config validation rejects that earlier.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "record window capacity must be positive");
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting from the head when full.
    ///
    /// Returns the evicted record, if any.
    pub fn push(&mut self, record: FeedRecord) -> Option<FeedRecord> {
        let evicted = if self.records.len() == self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the window holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended record.
    pub fn latest(&self) -> Option<&FeedRecord> {
        self.records.back()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Immutable copy of the current contents.
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            records: self.records.iter().cloned().collect(),
        }
    }
}

impl Default for RecordWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

/// Immutable view of a `RecordWindow` handed to observers.
///
/// Cloning is cheap (shared `Arc`); there is no way to reach the
/// connection's live window through it.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    records: Arc<[FeedRecord]>,
}

impl WindowSnapshot {
    /// Snapshot with no records.
    pub fn empty() -> Self {
        Self {
            records: Arc::from(Vec::new()),
        }
    }

    /// Most recent record in the snapshot.
    pub fn latest(&self) -> Option<&FeedRecord> {
        self.records.last()
    }

    /// One field across the window as `(timestamp, value)` points.
    ///
    /// Records lacking the field are skipped, so the series may be
    /// shorter than the snapshot.
    pub fn field_series(&self, key: &str) -> Vec<(i64, f64)> {
        self.records
            .iter()
            .filter_map(|r| r.field(key).map(|v| (r.timestamp, v)))
            .collect()
    }

    /// Timestamps in arrival order.
    pub fn timestamps(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    /// Display labels (timestamps as sent) in arrival order.
    pub fn labels(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.label.as_str()).collect()
    }
}

impl Deref for WindowSnapshot {
    type Target = [FeedRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}
