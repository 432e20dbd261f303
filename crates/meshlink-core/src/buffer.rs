// ── Bounded message history ──
//
// Fixed-capacity FIFO store for normalized records. One producer (the
// registry's drain task) and any number of concurrent readers share it;
// at mesh-radio event rates a single lock around every operation is
// plenty.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{MessageKind, MessageRecord};

/// Default capacity, matching the reference deployment.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded FIFO store of message records.
///
/// Insertion order is preserved; appending past capacity evicts the
/// single oldest record. Capacity is fixed at construction.
pub struct MessageRingBuffer {
    capacity: usize,
    inner: Mutex<VecDeque<Arc<MessageRecord>>>,
}

impl MessageRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append a record, evicting the oldest when at capacity. O(1).
    pub fn append(&self, record: Arc<MessageRecord>) {
        let mut queue = self.lock();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(record);
    }

    /// Return matching records, most recent first.
    ///
    /// `filter` restricts results to one kind; `limit` caps the count
    /// (absent means unbounded).
    pub fn query(
        &self,
        filter: Option<MessageKind>,
        limit: Option<usize>,
    ) -> Vec<Arc<MessageRecord>> {
        let queue = self.lock();
        let matches = queue
            .iter()
            .rev()
            .filter(|r| filter.is_none_or(|kind| r.kind == kind))
            .cloned();
        match limit {
            Some(n) => matches.take(n).collect(),
            None => matches.collect(),
        }
    }

    /// Remove records, returning how many were removed.
    ///
    /// Three mutually exclusive modes:
    /// - `filter` given: every record of that kind goes, `limit` ignored;
    /// - only `limit` given: the `limit` most-recently-appended records
    ///   are popped from the live buffer. If a producer appends between a
    ///   `query` and this call, the popped records can differ from the
    ///   ones that query returned;
    /// - neither given: clear everything.
    pub fn evict(&self, filter: Option<MessageKind>, limit: Option<usize>) -> usize {
        let mut queue = self.lock();
        match (filter, limit) {
            (Some(kind), _) => {
                let before = queue.len();
                queue.retain(|r| r.kind != kind);
                before - queue.len()
            }
            (None, Some(n)) => {
                let count = n.min(queue.len());
                for _ in 0..count {
                    queue.pop_back();
                }
                count
            }
            (None, None) => {
                let count = queue.len();
                queue.clear();
                count
            }
        }
    }

    /// Empty the buffer, returning the prior size.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let count = queue.len();
        queue.clear();
        count
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<MessageRecord>>> {
        // A poisoned lock only means a reader panicked mid-query; the
        // queue itself is still structurally sound.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MessageRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
