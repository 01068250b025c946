//! Open-Container Registry
//!
//! Tracks which containers are currently open, keyed by absolute physical
//! path, so components reuse an open handle instead of opening a second
//! (lock-conflicting) one.
//!
//! ## Concurrency
//! The map itself is guarded by an RwLock, but registering and unregistering
//! one physical path must be serialized by the caller: concurrently opening
//! and closing the *same* path from two threads is unsupported.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::StorageConfig;
use crate::error::{Result, StgError};

use super::container::{ContainerInner, ContainerStorage};

struct RegistryEntry {
    id: u64,
    storage: Weak<ContainerInner>,
}

/// Registry of open containers, shared by everything that opens them.
pub struct ContainerRegistry {
    config: StorageConfig,
    open: RwLock<HashMap<PathBuf, RegistryEntry>>,
}

impl ContainerRegistry {
    pub fn new(config: StorageConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            open: RwLock::new(HashMap::new()),
        })
    }

    /// Registry with the default storage configuration
    pub fn with_defaults() -> Arc<Self> {
        Self::new(StorageConfig::default())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Record `storage` as the open container for `path`.
    ///
    /// Fails with `SharingViolation` if a live container is already
    /// registered there.
    pub(crate) fn register(&self, path: PathBuf, id: u64, storage: Weak<ContainerInner>) -> Result<()> {
        let mut open = self.open.write();

        // Upgraded handles must outlive the guard: dropping the last one
        // unregisters, which takes the lock again.
        let existing = open.get(&path).and_then(|entry| entry.storage.upgrade());
        if existing.as_ref().is_some_and(|inner| inner.is_open()) {
            drop(open);
            return Err(StgError::SharingViolation(format!(
                "container already open: {}",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), id, "registering container");
        open.insert(path, RegistryEntry { id, storage });
        drop(open);
        drop(existing);
        Ok(())
    }

    /// Remove the registration of `path` if it still belongs to container `id`
    pub(crate) fn unregister(&self, path: &Path, id: u64) -> bool {
        let mut open = self.open.write();
        match open.get(path) {
            Some(entry) if entry.id == id => {
                open.remove(path);
                tracing::debug!(path = %path.display(), id, "unregistered container");
                true
            }
            _ => false,
        }
    }

    /// The open container registered for `path`, if any
    pub fn find(&self, path: impl AsRef<Path>) -> Option<ContainerStorage> {
        let key = normalize(path.as_ref());
        let open = self.open.read();
        let inner = open.get(&key).and_then(|entry| entry.storage.upgrade());
        drop(open);

        let inner = inner?;
        if inner.is_open() {
            Some(ContainerStorage::from_inner(inner))
        } else {
            None
        }
    }

    /// Physical paths of all live registrations
    pub fn open_paths(&self) -> Vec<PathBuf> {
        let open = self.open.read();
        let mut paths: Vec<PathBuf> = open
            .iter()
            .filter(|(_, entry)| entry.storage.strong_count() > 0)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.open_paths().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("config", &self.config)
            .field("open", &self.open_paths())
            .finish()
    }
}

/// Registry key for a physical path
pub(crate) fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
