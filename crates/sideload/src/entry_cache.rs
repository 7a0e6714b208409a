//! A minimal stand-in for the real Raft entry cache.
//!
//! The real entry cache, a bounded LRU of recently observed fat entries
//! keyed by range and index and shared by the whole replica, is out of
//! scope for this crate to define (see the crate-level docs). [`EntryCache`] is
//! the narrow trait the inlining pipeline needs from it, and
//! [`MemEntryCache`] is a concrete, in-process implementation so tests (and
//! any caller that hasn't wired up the real cache yet) have something to
//! pass.

use crate::entry::RaftEntry;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Read/write access to cached fat entries, keyed by `(range_id, index)`.
pub trait EntryCache: Send + Sync {
    /// Returns the cached entry for `(range_id, index)` if present.
    fn get(&self, range_id: u64, index: u64) -> Option<RaftEntry>;

    /// Records that `entries` are fat entries for `range_id`, recently
    /// observed. Implementations are free to evict older entries.
    fn add_entries(&self, range_id: u64, entries: &[RaftEntry]);

    /// Drops all cached entries for `range_id` with index `< upto`.
    fn clear_to(&self, range_id: u64, upto: u64);
}

/// A bounded, in-process LRU implementation of [`EntryCache`].
pub struct MemEntryCache {
    inner: Mutex<LruCache<(u64, u64), RaftEntry>>,
}

impl MemEntryCache {
    /// Creates a cache holding at most `capacity` entries across all ranges.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl EntryCache for MemEntryCache {
    fn get(&self, range_id: u64, index: u64) -> Option<RaftEntry> {
        self.inner.lock().unwrap().get(&(range_id, index)).cloned()
    }

    fn add_entries(&self, range_id: u64, entries: &[RaftEntry]) {
        let mut cache = self.inner.lock().unwrap();
        for entry in entries {
            cache.put((range_id, entry.index), entry.clone());
        }
    }

    fn clear_to(&self, range_id: u64, upto: u64) {
        let mut cache = self.inner.lock().unwrap();
        let stale: Vec<(u64, u64)> = cache
            .iter()
            .map(|(k, _)| *k)
            .filter(|(rid, idx)| *rid == range_id && *idx < upto)
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }
}
