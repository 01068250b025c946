//! Cache Module
//!
//! Generic, thread-safe object cache keyed by paths, with expiry against the
//! backing file's modify time and a background prefetch worker.
//!
//! ## Responsibilities
//! - Load objects through an owner-supplied loader, once per key
//! - Drop and reload entries whose backing file changed or vanished
//! - Bound the entry count with chunked, insertion-ordered eviction
//! - Populate the cache ahead of demand from one worker thread
//!
//! ## Structure
//! ```text
//!   owner thread ── acquire ──┐
//!                             ▼
//!   enqueue ─► PrefetchQueue ─► worker ── acquire ──► CacheCore
//!              (channel, FIFO)                        ReentrantMutex<
//!                                                       entries: BTreeMap<K, entry>
//!                                                       expire_queue: VecDeque<K> >
//! ```

mod object_cache;
mod prefetch;

use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use bitflags::bitflags;

use crate::path::ComplexPath;

pub use object_cache::ObjectCache;
pub use prefetch::PrefetchQueue;

bitflags! {
    /// What `acquire` did for one key. Flags compose, e.g.
    /// `REMOVE_EXPIRED | LOAD` for a refreshed entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CacheStatusFlags: u32 {
        /// Served from the cache
        const CACHE_HIT = 1 << 0;
        /// Freshly loaded by the owner
        const LOAD = 1 << 1;
        /// The owner's loader returned nothing
        const LOADING_ERROR = 1 << 2;
        /// A stale entry was dropped before loading
        const REMOVE_EXPIRED = 1 << 3;
    }
}

/// Result of [`ObjectCache::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Already cached and valid; nothing queued
    Found,
    /// Queued (or already queued) for the prefetch worker
    Pending,
}

/// Supplies and observes cached objects.
///
/// `load` runs with the cache lock held; it may call back into the same
/// cache from the calling thread.
pub trait CacheOwner<K, V>: Send + Sync {
    /// Produce the object for `key`; `None` signals failure
    fn load(&self, key: &K) -> Option<V>;

    /// Diagnostic hook called after every `acquire`
    fn trace_object(&self, _key: &K, _object: Option<&V>, _status: CacheStatusFlags) {}
}

/// A cache key backed by a file whose modify time decides expiry
pub trait CacheKey: Clone + Ord + Debug + Send + Sync + 'static {
    /// Current modify time of the backing file, `None` if it is missing
    fn modified(&self) -> Option<SystemTime>;

    /// True if `self` lies at or below `prefix`
    fn has_prefix(&self, prefix: &Self) -> bool {
        self == prefix
    }
}

impl CacheKey for ComplexPath {
    fn modified(&self) -> Option<SystemTime> {
        ComplexPath::modified(self)
    }

    fn has_prefix(&self, prefix: &Self) -> bool {
        self.starts_with(prefix)
    }
}

impl CacheKey for PathBuf {
    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(self).and_then(|m| m.modified()).ok()
    }

    fn has_prefix(&self, prefix: &Self) -> bool {
        self.starts_with(prefix)
    }
}
