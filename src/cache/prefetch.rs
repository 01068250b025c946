//! Prefetch Queue
//!
//! One worker thread per cache, fed FIFO through a channel. The worker calls
//! the cache's `acquire` for every key it receives and throws the result
//! away: populating the cache is the point.
//!
//! ## Shutdown
//! Dropping the queue sets the shutdown flag, closes the channel and joins
//! the worker. Keys still queued are discarded; a load already running
//! finishes first.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::error::Result;

use super::object_cache::CacheCore;
use super::{CacheKey, CacheOwner};

/// State shared between the queue handle and its worker
struct QueueShared<K> {
    /// Keys sent but not yet picked up, for deduplication
    queued: Mutex<BTreeSet<K>>,
    /// Keys queued plus the one being loaded
    outstanding: AtomicUsize,
    shutdown: AtomicBool,
}

/// Background prefetch queue owned by an [`ObjectCache`](super::ObjectCache)
pub struct PrefetchQueue<K> {
    sender: Option<Sender<K>>,
    shared: Arc<QueueShared<K>>,
    worker: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl<K: CacheKey> PrefetchQueue<K> {
    /// Start the worker thread for `core`
    pub(crate) fn spawn<V, O>(core: Arc<CacheCore<K, V, O>>, config: &CacheConfig) -> Result<Self>
    where
        V: Send + Sync + 'static,
        O: CacheOwner<K, V> + 'static,
    {
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(QueueShared {
            queued: Mutex::new(BTreeSet::new()),
            outstanding: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || run_worker(core, receiver, worker_shared))?;

        tracing::debug!(worker = %config.worker_name, "prefetch worker started");

        Ok(Self {
            sender: Some(sender),
            shared,
            worker: Some(worker),
            poll_interval: config.poll_interval,
        })
    }

    /// Queue `key`. Returns false if it was already queued or the queue is
    /// shutting down.
    pub(crate) fn push(&self, key: K) -> bool {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return false;
        }
        let Some(sender) = &self.sender else {
            return false;
        };

        let mut queued = self.shared.queued.lock();
        if !queued.insert(key.clone()) {
            return false;
        }
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);

        if sender.send(key.clone()).is_err() {
            queued.remove(&key);
            self.shared.outstanding.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        tracing::trace!(?key, "queued for prefetch");
        true
    }

    /// Keys queued or being loaded
    pub fn pending_len(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Poll until nothing is queued or loading, or the queue shut down
    pub fn wait_complete_pending(&self) {
        while self.pending_len() > 0 && !self.shared.shutdown.load(Ordering::Acquire) {
            thread::sleep(self.poll_interval);
        }
    }
}

impl<K> Drop for PrefetchQueue<K> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        // Closing the channel wakes the worker
        self.sender.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("prefetch worker panicked");
            }
        }
    }
}

fn run_worker<K, V, O>(core: Arc<CacheCore<K, V, O>>, receiver: Receiver<K>, shared: Arc<QueueShared<K>>)
where
    K: CacheKey,
    V: Send + Sync + 'static,
    O: CacheOwner<K, V>,
{
    for key in receiver.iter() {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        shared.queued.lock().remove(&key);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| core.acquire(&key)));
        match outcome {
            Ok((Some(_), status)) => tracing::trace!(?key, ?status, "prefetched"),
            Ok((None, status)) => tracing::debug!(?key, ?status, "prefetch load failed"),
            Err(_) => tracing::warn!(?key, "prefetch panicked"),
        }

        shared.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
    tracing::debug!("prefetch worker stopped");
}
