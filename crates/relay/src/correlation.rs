//! Origin ↔ copy correlation, held only in bounded memory.
//!
//! Eviction from either map is independent and silently drops the ability to
//! mirror later changes for that message.

use tracing::debug;

use crate::{
    cache::FifoCache,
    types::{CopyRef, MessageId},
};

/// Default number of origin messages tracked.
pub const DEFAULT_FORWARD_CAPACITY: usize = 200;
/// Default number of copy → origin entries tracked (one per copy).
pub const DEFAULT_REVERSE_CAPACITY: usize = 600;

pub struct CorrelationCache {
    /// origin id → every copy, the origin included.
    forward: FifoCache<MessageId, Vec<CopyRef>>,
    /// any copy id (origin included) → origin id.
    reverse: FifoCache<MessageId, MessageId>,
}

impl Default for CorrelationCache {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARD_CAPACITY, DEFAULT_REVERSE_CAPACITY)
    }
}

impl CorrelationCache {
    pub fn new(forward_capacity: usize, reverse_capacity: usize) -> Self {
        Self {
            forward: FifoCache::new(forward_capacity),
            reverse: FifoCache::new(reverse_capacity),
        }
    }

    /// Insert or overwrite the correlation for `origin_id`.
    pub fn record(&mut self, origin_id: MessageId, copies: Vec<CopyRef>) {
        let mut origin_listed = false;
        for copy in &copies {
            origin_listed |= copy.message_id == origin_id;
            if let Some((evicted, _)) = self.reverse.insert(copy.message_id, origin_id) {
                debug!(message_id = %evicted, "reverse correlation evicted");
            }
        }
        if !origin_listed && let Some((evicted, _)) = self.reverse.insert(origin_id, origin_id) {
            debug!(message_id = %evicted, "reverse correlation evicted");
        }

        if let Some((evicted, _)) = self.forward.insert(origin_id, copies) {
            debug!(origin_id = %evicted, "forward correlation evicted");
        }
    }

    pub fn lookup_forward(&self, origin_id: MessageId) -> Option<&[CopyRef]> {
        self.forward.get(&origin_id).map(Vec::as_slice)
    }

    pub fn lookup_reverse(&self, message_id: MessageId) -> Option<MessageId> {
        self.reverse.get(&message_id).copied()
    }

    /// Remove and return the forward entry; reverse entries are left to age out.
    pub fn take_forward(&mut self, origin_id: MessageId) -> Option<Vec<CopyRef>> {
        self.forward.remove(&origin_id)
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    pub fn reverse_len(&self) -> usize {
        self.reverse.len()
    }
}
