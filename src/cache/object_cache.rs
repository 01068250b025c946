//! Object Cache
//!
//! Bounded map from key to loaded object.
//!
//! ## Concurrency
//! Every operation holds one re-entrant lock for its whole duration,
//! including the owner's `load`. The owning thread and the prefetch worker
//! therefore never load the same key twice: whoever comes second sees a
//! cache hit. The owner may re-enter the cache from inside `load`.
//!
//! ## Eviction
//! Insertion-ordered, not LRU. Once the entry count exceeds `max_size`, the
//! oldest `max(max_size / 10, 2)` entries are dropped in one batch, repeated
//! until the count fits. The entry just inserted is never evicted.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::RangeBounds;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::ReentrantMutex;

use crate::config::CacheConfig;
use crate::error::Result;

use super::prefetch::PrefetchQueue;
use super::{CacheKey, CacheOwner, CacheStatusFlags, EnqueueResult};

// =============================================================================
// Cache State
// =============================================================================

/// A cached object and the backing file's modify time when it was loaded
struct CacheEntry<V> {
    object: Arc<V>,
    modified: Option<SystemTime>,
}

struct CacheState<K, V> {
    entries: BTreeMap<K, CacheEntry<V>>,
    /// Keys in insertion order; same cardinality as `entries`
    expire_queue: VecDeque<K>,
    max_size: usize,
}

impl<K: CacheKey, V> CacheState<K, V> {
    fn insert(&mut self, key: K, entry: CacheEntry<V>) {
        if self.entries.insert(key.clone(), entry).is_none() {
            self.expire_queue.push_back(key);
        }
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.expire_queue.iter().position(|k| k == key) {
            self.expire_queue.remove(pos);
        }
        Some(entry)
    }

    fn remove_many(&mut self, keys: BTreeSet<K>) -> Vec<(K, Arc<V>)> {
        if keys.is_empty() {
            return Vec::new();
        }
        self.expire_queue.retain(|k| !keys.contains(k));
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|e| (k, e.object)))
            .collect()
    }

    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.max_size {
            let chunk = (self.max_size / 10).max(2);
            // Leave at least the newest entry
            let batch = chunk.min(self.entries.len() - 1);
            if batch == 0 {
                break;
            }
            for _ in 0..batch {
                if let Some(key) = self.expire_queue.pop_front() {
                    self.entries.remove(&key);
                    evicted += 1;
                }
            }
        }
        evicted
    }
}

// =============================================================================
// Cache Core
// =============================================================================

/// Lock, state and owner shared by the cache handle and its prefetch worker
pub(crate) struct CacheCore<K, V, O> {
    owner: O,
    check_expiry: bool,
    state: ReentrantMutex<RefCell<CacheState<K, V>>>,
}

impl<K, V, O> CacheCore<K, V, O>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    O: CacheOwner<K, V>,
{
    fn new(owner: O, config: &CacheConfig) -> Self {
        Self {
            owner,
            check_expiry: config.check_expiry,
            state: ReentrantMutex::new(RefCell::new(CacheState {
                entries: BTreeMap::new(),
                expire_queue: VecDeque::new(),
                max_size: config.max_size.max(1),
            })),
        }
    }

    fn is_fresh(&self, key: &K, stamp: Option<SystemTime>) -> bool {
        if !self.check_expiry {
            return true;
        }
        match (stamp, key.modified()) {
            (Some(cached), Some(current)) => cached == current,
            _ => false,
        }
    }

    pub(crate) fn find(&self, key: &K, check_valid: bool) -> Option<Arc<V>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let entry = state.entries.get(key)?;
        if check_valid && !self.is_fresh(key, entry.modified) {
            return None;
        }
        Some(Arc::clone(&entry.object))
    }

    pub(crate) fn acquire(&self, key: &K) -> (Option<Arc<V>>, CacheStatusFlags) {
        let guard = self.state.lock();
        let mut status = CacheStatusFlags::empty();

        let cached = guard
            .borrow()
            .entries
            .get(key)
            .map(|entry| (Arc::clone(&entry.object), entry.modified));

        if let Some((object, stamp)) = cached {
            if self.is_fresh(key, stamp) {
                status |= CacheStatusFlags::CACHE_HIT;
                tracing::trace!(?key, "cache hit");
                self.owner.trace_object(key, Some(&object), status);
                return (Some(object), status);
            }
            guard.borrow_mut().remove(key);
            status |= CacheStatusFlags::REMOVE_EXPIRED;
            tracing::debug!(?key, "removed expired entry");
        }

        // No RefCell borrow is held here: the owner may re-enter the cache
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| self.owner.load(key)));

        let object = match loaded {
            Ok(Some(value)) => {
                status |= CacheStatusFlags::LOAD;
                let object = Arc::new(value);
                let entry = CacheEntry {
                    object: Arc::clone(&object),
                    modified: key.modified(),
                };

                let mut state = guard.borrow_mut();
                state.insert(key.clone(), entry);
                let evicted = state.evict();
                tracing::debug!(?key, evicted, len = state.entries.len(), "loaded object");
                Some(object)
            }
            Ok(None) => {
                status |= CacheStatusFlags::LOADING_ERROR;
                tracing::debug!(?key, "loader returned nothing");
                None
            }
            Err(_) => {
                status |= CacheStatusFlags::LOADING_ERROR;
                tracing::warn!(?key, "loader panicked");
                None
            }
        };

        self.owner.trace_object(key, object.as_deref(), status);
        (object, status)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CacheState<K, V>) -> T) -> T {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }
}

// =============================================================================
// Object Cache
// =============================================================================

/// Expiring object cache with a background prefetch worker.
///
/// Objects are handed out as `Arc<V>`; the cache keeps its own reference
/// until the entry is removed or evicted. The worker thread is started by
/// [`ObjectCache::new`] and joined when the cache is dropped.
pub struct ObjectCache<K, V, O>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    O: CacheOwner<K, V> + 'static,
{
    core: Arc<CacheCore<K, V, O>>,
    prefetch: PrefetchQueue<K>,
}

impl<K, V, O> ObjectCache<K, V, O>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    O: CacheOwner<K, V> + 'static,
{
    /// Create a cache and start its prefetch worker
    pub fn new(owner: O, config: CacheConfig) -> Result<Self> {
        let core = Arc::new(CacheCore::new(owner, &config));
        let prefetch = PrefetchQueue::spawn(Arc::clone(&core), &config)?;
        Ok(Self { core, prefetch })
    }

    pub fn owner(&self) -> &O {
        &self.core.owner
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Plain lookup; with `check_valid`, expired entries count as missing
    pub fn find(&self, key: &K, check_valid: bool) -> Option<Arc<V>> {
        self.core.find(key, check_valid)
    }

    /// Return the object for `key`, loading it if missing or expired.
    ///
    /// Never fails: a failed load yields `None` with `LOADING_ERROR`.
    pub fn acquire(&self, key: &K) -> (Option<Arc<V>>, CacheStatusFlags) {
        self.core.acquire(key)
    }

    /// Queue `key` for the prefetch worker unless it is already cached
    pub fn enqueue(&self, key: K) -> EnqueueResult {
        if self.core.find(&key, true).is_some() {
            return EnqueueResult::Found;
        }
        self.prefetch.push(key);
        EnqueueResult::Pending
    }

    /// Block until every queued key has been processed
    pub fn wait_complete_pending(&self) {
        self.prefetch.wait_complete_pending();
    }

    /// Keys queued or being loaded by the worker
    pub fn pending_len(&self) -> usize {
        self.prefetch.pending_len()
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drop the entry for `key`
    pub fn remove(&self, key: &K) -> bool {
        self.core.with_state(|state| state.remove(key).is_some())
    }

    /// Remove the entry for `key` and hand its object to the caller
    pub fn take(&self, key: &K) -> Option<Arc<V>> {
        self.core.with_state(|state| state.remove(key).map(|e| e.object))
    }

    /// Drop every entry at or below `prefix`
    pub fn remove_prefix(&self, prefix: &K) -> usize {
        self.remove_where(|key| key.has_prefix(prefix))
    }

    /// Drop every entry whose key lies in `range`
    pub fn remove_range<R: RangeBounds<K>>(&self, range: R) -> usize {
        self.core.with_state(|state| {
            let keys: BTreeSet<K> = state.entries.range(range).map(|(k, _)| k.clone()).collect();
            state.remove_many(keys).len()
        })
    }

    /// Drop every entry whose key matches `pred`
    pub fn remove_where(&self, pred: impl FnMut(&K) -> bool) -> usize {
        self.drain_where(pred).len()
    }

    /// Remove every entry whose key matches `pred`, handing the removed
    /// objects to the caller
    pub fn drain_where(&self, mut pred: impl FnMut(&K) -> bool) -> Vec<(K, Arc<V>)> {
        self.core.with_state(|state| {
            let keys: BTreeSet<K> = state.entries.keys().filter(|k| pred(k)).cloned().collect();
            state.remove_many(keys)
        })
    }

    pub fn clear(&self) {
        self.core.with_state(|state| {
            state.entries.clear();
            state.expire_queue.clear();
        })
    }

    // =========================================================================
    // Size
    // =========================================================================

    pub fn len(&self) -> usize {
        self.core.with_state(|state| state.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.core.with_state(|state| state.max_size)
    }

    /// Change the capacity; shrinking evicts immediately
    pub fn set_max_size(&self, max_size: usize) {
        self.core.with_state(|state| {
            state.max_size = max_size.max(1);
            let evicted = state.evict();
            if evicted > 0 {
                tracing::debug!(max_size = state.max_size, evicted, "cache shrunk");
            }
        })
    }

    /// Keys in insertion order (oldest first)
    pub fn keys(&self) -> Vec<K> {
        self.core.with_state(|state| state.expire_queue.iter().cloned().collect())
    }

    /// True if the entry map and the expire queue agree
    pub fn is_consistent(&self) -> bool {
        self.core.with_state(|state| {
            state.entries.len() == state.expire_queue.len()
                && state.expire_queue.iter().all(|k| state.entries.contains_key(k))
        })
    }
}

impl<K, V, O> std::fmt::Debug for ObjectCache<K, V, O>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    O: CacheOwner<K, V> + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("len", &self.len())
            .field("max_size", &self.max_size())
            .field("pending", &self.pending_len())
            .finish()
    }
}
