//! Container Storage
//!
//! An open container file: its directory tree, the cache of stream states
//! opened for reading, and the write slots of open stream writers.
//!
//! ## Lifecycle
//! ```text
//!   create_or_open ──► Open ──► close / last handle dropped ──► Closed
//!                       │
//!                       └─ stream states: filled lazily by open_stream,
//!                          cleared on share-mode change, stream overwrite
//!                          or delete, directory delete, and close
//! ```
//!
//! `ContainerStorage` is a cheap handle; clones refer to the same open
//! container.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, StgError};
use crate::path::SEPARATOR;

use super::directory::DirectoryHandle;
use super::format;
use super::mode::{Access, CreateMode, OpenMode, ShareMode};
use super::policy::{ErrorPolicy, PolicyGuard};
use super::registry::{normalize, ContainerRegistry};
use super::stream::{StreamReader, StreamState, StreamWriter};
use super::tree::StorageNode;

/// Source of container ids used to match registry entries
static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Open State
// =============================================================================

/// Everything that exists only while a container is open
pub(crate) struct OpenState {
    pub file: File,
    pub mode: OpenMode,
    pub root: StorageNode,
    /// Read states keyed by fully-qualified encoded path (`a/b/c`)
    pub stream_states: HashMap<String, StreamState>,
    /// Keys of streams with a live writer
    pub writers: HashSet<String>,
    /// Tree differs from the file
    pub dirty: bool,
}

impl OpenState {
    pub fn require_writable(&self, path: &Path) -> Result<()> {
        if self.mode.access.can_write() {
            Ok(())
        } else {
            Err(StgError::ReadOnly(path.display().to_string()))
        }
    }

    pub fn invalidate(&mut self, key: &str) {
        if self.stream_states.remove(key).is_some() {
            tracing::trace!(stream = key, "dropped cached stream state");
        }
    }

    /// Drop cached states of every stream at or below `prefix`
    pub fn invalidate_under(&mut self, prefix: &str) {
        self.stream_states.retain(|key, _| !is_under(key, prefix));
    }

    pub fn has_writer_under(&self, prefix: &str) -> bool {
        self.writers.iter().any(|key| is_under(key, prefix))
    }

    /// Rewrite the file if the tree changed and switch to the locked rewrite
    fn commit(&mut self, path: &Path, name_budget: u16) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let (share, access) = (self.mode.share, self.mode.access);
        let (tree, file) = format::rewrite_container(path, name_budget, &self.root, &mut self.file, |file| {
            lock_file(file, share, access, path)
        })?;

        self.file = file;
        self.root = tree;
        self.dirty = false;
        tracing::info!(path = %path.display(), "committed container");
        Ok(())
    }
}

/// `key` equals `prefix` or lies below it
pub(crate) fn is_under(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

// =============================================================================
// Shared Inner
// =============================================================================

pub(crate) struct ContainerInner {
    id: u64,
    path: PathBuf,
    name_budget: usize,
    registry: Arc<ContainerRegistry>,
    /// `None` once closed
    state: Mutex<Option<OpenState>>,
    policy: Mutex<ErrorPolicy>,
}

impl ContainerInner {
    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.get_mut().take() {
            if let Err(e) = state.commit(&self.path, self.name_budget as u16) {
                tracing::warn!(path = %self.path.display(), error = %e, "commit on drop failed");
            }
            drop(state);
            self.registry.unregister(&self.path, self.id);
        }
    }
}

// =============================================================================
// Container Storage
// =============================================================================

/// Handle to an open container file
#[derive(Clone)]
pub struct ContainerStorage {
    inner: Arc<ContainerInner>,
}

impl ContainerStorage {
    /// Open or create the container at `path` and register it.
    ///
    /// Unless the registry's config allows shared access, the share mode is
    /// raised to [`ShareMode::Exclusive`]. Fails with `SharingViolation`
    /// if the container is already registered or locked by another opener.
    pub fn create_or_open(
        registry: &Arc<ContainerRegistry>,
        path: impl AsRef<Path>,
        mode: OpenMode,
    ) -> Result<Self> {
        let path = normalize(path.as_ref());
        if registry.find(&path).is_some() {
            return Err(StgError::SharingViolation(format!(
                "container already open: {} (use find_opened)",
                path.display()
            )));
        }

        let config = registry.config();
        let mut mode = mode;
        if !config.allow_shared_access {
            mode.share = ShareMode::Exclusive;
        }
        if mode.create.creates() && !mode.access.can_write() {
            return Err(StgError::Config(format!(
                "{:?} requires write access",
                mode.create
            )));
        }

        let mut options = OpenOptions::new();
        options.read(true).write(mode.access.can_write());
        match mode.create {
            CreateMode::OpenExisting => {}
            CreateMode::CreateNew => {
                options.create_new(true);
            }
            CreateMode::OpenOrCreate | CreateMode::Truncate => {
                options.create(true);
            }
        }

        let mut file = options.open(&path).map_err(|e| open_error(e, &path))?;
        lock_file(&file, mode.share, mode.access, &path)?;

        // Truncate only once the lock is held
        if mode.create == CreateMode::Truncate {
            file.set_len(0)?;
        }
        if mode.create.creates() && file.metadata()?.len() == 0 {
            format::write_image(&mut file, config.name_budget as u16, &StorageNode::new(""), None)?;
            file.sync_all()?;
        }

        let (header, root) = format::read_container(&mut file)?;

        let inner = Arc::new(ContainerInner {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            path: path.clone(),
            name_budget: header.name_budget as usize,
            registry: Arc::clone(registry),
            state: Mutex::new(Some(OpenState {
                file,
                mode,
                root,
                stream_states: HashMap::new(),
                writers: HashSet::new(),
                dirty: false,
            })),
            policy: Mutex::new(config.default_policy),
        });

        registry.register(path.clone(), inner.id, Arc::downgrade(&inner))?;
        tracing::info!(path = %path.display(), ?mode, "opened container");

        Ok(Self { inner })
    }

    /// The container already open at `path`, if any
    pub fn find_opened(registry: &ContainerRegistry, path: impl AsRef<Path>) -> Option<Self> {
        registry.find(path)
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Absolute physical path of the container file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Maximum entry-name length recorded in the container header
    pub fn name_budget(&self) -> usize {
        self.inner.name_budget
    }

    /// Effective open mode (after share-mode enforcement)
    pub fn mode(&self) -> Result<OpenMode> {
        self.with_state(|state| Ok(state.mode))
    }

    pub fn registry(&self) -> &Arc<ContainerRegistry> {
        &self.inner.registry
    }

    /// Number of cached stream read states
    pub fn cached_stream_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .as_ref()
            .map_or(0, |state| state.stream_states.len())
    }

    /// True if there are uncommitted changes
    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().as_ref().is_some_and(|state| state.dirty)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// The container's root storage
    pub fn root(&self) -> Result<DirectoryHandle> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        Ok(DirectoryHandle::new(self.clone(), Vec::new()))
    }

    /// Open the storage at `embedded` (segments separated by `/` or `\`)
    pub fn open_dir_path(&self, embedded: &str) -> Result<DirectoryHandle> {
        let mut dir = self.root()?;
        for segment in embedded_segments(embedded)? {
            dir = dir.open_dir(segment)?;
        }
        Ok(dir)
    }

    /// Open the storage at `embedded`, creating missing storages on the way
    pub fn create_dir_path(&self, embedded: &str) -> Result<DirectoryHandle> {
        let mut dir = self.root()?;
        for segment in embedded_segments(embedded)? {
            dir = dir.open_or_create_dir(segment)?;
        }
        Ok(dir)
    }

    pub fn open_stream_path(&self, embedded: &str) -> Result<StreamReader> {
        let (parent, name) = split_stream_path(embedded)?;
        self.open_dir_path(&parent)?.open_stream(name)
    }

    /// Create (or truncate) the stream at `embedded`, creating parent storages
    pub fn create_stream_path(&self, embedded: &str) -> Result<StreamWriter> {
        let (parent, name) = split_stream_path(embedded)?;
        self.create_dir_path(&parent)?.create_stream(name)
    }

    pub fn delete_stream_path(&self, embedded: &str) -> Result<()> {
        let (parent, name) = split_stream_path(embedded)?;
        self.open_dir_path(&parent)?.delete_stream(name)
    }

    /// Existence probe; never fails
    pub fn exists_stream_path(&self, embedded: &str) -> bool {
        let Ok((parent, name)) = split_stream_path(embedded) else {
            return false;
        };
        match self.open_dir_path(&parent) {
            Ok(dir) => dir.exists_stream(name),
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                let _ = ErrorPolicy::Ignore.apply::<()>("exists_stream_path", Err(e));
                false
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Write pending changes to disk
    pub fn commit(&self) -> Result<()> {
        let budget = self.inner.name_budget as u16;
        self.with_state(|state| state.commit(&self.inner.path, budget))
    }

    /// Change the share mode of the open container.
    ///
    /// Modes weaker than exclusive need `allow_shared_access`. Clears all
    /// cached stream states.
    ///
    /// If the new lock cannot be taken the previous one is restored and the
    /// mode is unchanged. If that also fails the container is closed.
    pub fn set_share_mode(&self, share: ShareMode) -> Result<()> {
        if share != ShareMode::Exclusive && !self.inner.registry.config().allow_shared_access {
            return Err(StgError::Config(format!(
                "{:?} needs allow_shared_access",
                share
            )));
        }

        let path = &self.inner.path;
        let mut lost_lock = None;
        let result = self.with_state(|state| {
            state.file.unlock()?;
            if let Err(e) = lock_file(&state.file, share, state.mode.access, path) {
                if let Err(relock) = lock_file(&state.file, state.mode.share, state.mode.access, path) {
                    lost_lock = Some(relock);
                }
                return Err(e);
            }
            state.mode.share = share;
            state.stream_states.clear();
            tracing::debug!(path = %path.display(), ?share, "share mode changed");
            Ok(())
        });

        if let Some(relock) = lost_lock {
            tracing::warn!(path = %path.display(), error = %relock, "previous lock lost, closing container");
            if let Err(e) = self.close() {
                tracing::warn!(path = %path.display(), error = %e, "close after lost lock failed");
            }
        }
        result
    }

    /// Commit, unregister, drop cached stream states and release the file.
    ///
    /// Idempotent. The container is closed even when the commit fails; the
    /// commit error is returned.
    pub fn close(&self) -> Result<()> {
        let state = self.inner.state.lock().take();
        let Some(mut state) = state else {
            return Ok(());
        };

        let result = state.commit(&self.inner.path, self.inner.name_budget as u16);
        if !state.writers.is_empty() {
            tracing::warn!(
                path = %self.inner.path.display(),
                writers = state.writers.len(),
                "closing container with open stream writers"
            );
        }
        state.stream_states.clear();
        drop(state);

        self.inner.registry.unregister(&self.inner.path, self.inner.id);
        tracing::info!(path = %self.inner.path.display(), "closed container");
        result
    }

    // =========================================================================
    // Error Policy
    // =========================================================================

    pub fn policy(&self) -> ErrorPolicy {
        *self.inner.policy.lock()
    }

    pub fn set_policy(&self, policy: ErrorPolicy) {
        *self.inner.policy.lock() = policy;
    }

    /// Apply the current policy to the result of `op`
    pub fn resolve<T>(&self, op: &str, result: Result<T>) -> Result<Option<T>> {
        self.policy().apply(op, result)
    }

    /// Run `f` with `policy` in effect, restoring the previous policy on
    /// every exit path, and resolve its result under `policy`.
    pub fn with_policy<T>(
        &self,
        policy: ErrorPolicy,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<Option<T>> {
        let _guard = PolicyGuard::push(&self.inner.policy, policy);
        let result = f(self);
        self.resolve("scoped operation", result)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Run `f` on the open state, failing with `Closed` after close
    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut OpenState) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.state.lock();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(self.closed_error()),
        }
    }

    /// Store a writer's bytes into the tree
    pub(crate) fn publish_stream(&self, dir: &[String], name: &str, key: &str, bytes: Bytes) -> Result<()> {
        self.with_state(|state| {
            state.require_writable(&self.inner.path)?;
            let parent = state.root.storage_mut(dir)?;
            let stream = parent.stream_mut(name)?;
            stream.data = super::tree::StreamData::Memory(bytes);
            stream.modified = std::time::SystemTime::now();
            parent.touch();

            state.invalidate(key);
            state.dirty = true;
            Ok(())
        })
    }

    pub(crate) fn release_writer(&self, key: &str) {
        if let Some(state) = self.inner.state.lock().as_mut() {
            state.writers.remove(key);
        }
    }

    fn closed_error(&self) -> StgError {
        StgError::Closed(self.inner.path.display().to_string())
    }
}

impl std::fmt::Debug for ContainerStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerStorage")
            .field("path", &self.inner.path)
            .field("open", &self.is_open())
            .field("name_budget", &self.inner.name_budget)
            .finish()
    }
}

// =============================================================================
// Free Helpers
// =============================================================================

/// Take the OS lock matching `share`
fn lock_file(file: &File, share: ShareMode, access: Access, path: &Path) -> Result<()> {
    let attempt = match share {
        ShareMode::DenyNone => return Ok(()),
        ShareMode::DenyWrite if !access.can_write() => file.try_lock_shared(),
        ShareMode::DenyWrite | ShareMode::Exclusive => file.try_lock(),
    };

    attempt.map_err(|e| match e {
        TryLockError::WouldBlock => StgError::SharingViolation(format!(
            "{} is locked by another opener",
            path.display()
        )),
        TryLockError::Error(e) => StgError::Io(e),
    })
}

fn open_error(e: io::Error, path: &Path) -> StgError {
    match e.kind() {
        io::ErrorKind::NotFound => StgError::NotFound(path.display().to_string()),
        io::ErrorKind::AlreadyExists => StgError::AlreadyExists(path.display().to_string()),
        _ => StgError::Io(e),
    }
}

fn embedded_segments(embedded: &str) -> Result<Vec<&str>> {
    if embedded.contains(SEPARATOR) {
        return Err(StgError::Malformed(format!(
            "'{}' inside embedded path {:?}",
            SEPARATOR, embedded
        )));
    }
    Ok(embedded
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect())
}

/// `a/b/c` → (`a/b`, `c`)
fn split_stream_path(embedded: &str) -> Result<(String, &str)> {
    let mut segments = embedded_segments(embedded)?;
    let name = segments
        .pop()
        .ok_or_else(|| StgError::Malformed(format!("no stream name in {:?}", embedded)))?;
    Ok((segments.join("/"), name))
}
