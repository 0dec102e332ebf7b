//! # Event Buffer
//! Thread-safe, append-ordered buffer holding the current window of events.
//!
//! Appends come from the ingestion side, snapshots and prunes from the report
//! scheduler. All three go through one short-lived lock; nothing expensive
//! (tokenizing, regex work) ever happens while it is held.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::event::Event;

#[derive(Debug, Default)]
pub struct EventBuffer {
    inner: Mutex<VecDeque<Arc<Event>>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event at the tail. Events are never reordered.
    pub fn append(&self, event: Event) {
        let event = Arc::new(event);
        self.inner.lock().push_back(event);
    }

    /// Point-in-time copy of the contents. Only `Arc` handles are cloned, so the
    /// lock is held for a pointer copy per event.
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Remove the longest prefix whose timestamps are all `< threshold_ms`.
    ///
    /// Scanning stops at the first event at or above the threshold. Stragglers
    /// that arrived out of order behind a newer event survive until a later pass
    /// reaches them.
    pub fn prune_before(&self, threshold_ms: i64) -> usize {
        let mut buf = self.inner.lock();
        let cut = buf
            .iter()
            .position(|e| e.timestamp_ms >= threshold_ms)
            .unwrap_or(buf.len());
        buf.drain(..cut);
        cut
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
