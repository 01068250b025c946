//! Directory Handles
//!
//! A handle on one storage inside an open container. Every name given to a
//! handle is shortened with [`encode`](crate::path::encode) to the
//! container's name budget before it touches the tree; the original name is
//! kept next to the entry, so an encoded name that collides with a different
//! original is reported instead of silently aliasing.

use std::time::SystemTime;

use bytes::Bytes;

use crate::error::{Result, StgError};
use crate::path::{encode, SEPARATOR};

use super::container::{ContainerStorage, OpenState};
use super::policy::ErrorPolicy;
use super::stream::{StreamReader, StreamState, StreamWriter};
use super::tree::{Node, StorageNode, StreamNode};

/// Kind of a container entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Storage,
    Stream,
}

/// Listing record for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Name as stored in the container (possibly encoded)
    pub name: String,
    /// Name the entry was created with
    pub original_name: String,
    pub kind: EntryKind,
    /// Stream length in bytes; child count for storages
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryInfo {
    fn from_node(name: &str, node: &Node) -> Self {
        match node {
            Node::Storage(storage) => Self {
                name: name.to_string(),
                original_name: storage.original_name.clone(),
                kind: EntryKind::Storage,
                size: storage.children.len() as u64,
                modified: storage.modified,
            },
            Node::Stream(stream) => Self {
                name: name.to_string(),
                original_name: stream.original_name.clone(),
                kind: EntryKind::Stream,
                size: stream.len(),
                modified: stream.modified,
            },
        }
    }
}

/// Handle on one storage (directory) of an open container
#[derive(Debug, Clone)]
pub struct DirectoryHandle {
    storage: ContainerStorage,
    /// Encoded names from the root down to this storage
    segments: Vec<String>,
}

impl DirectoryHandle {
    pub(crate) fn new(storage: ContainerStorage, segments: Vec<String>) -> Self {
        Self { storage, segments }
    }

    pub fn storage(&self) -> &ContainerStorage {
        &self.storage
    }

    /// Encoded names from the root to this storage
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Fully-qualified encoded path of this storage (empty for the root)
    pub fn key(&self) -> String {
        self.segments.join("/")
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    // =========================================================================
    // Storages
    // =========================================================================

    /// Create a child storage; fails with `AlreadyExists` if the (encoded)
    /// name is taken.
    pub fn create_dir(&self, name: &str) -> Result<DirectoryHandle> {
        let encoded = self.encode_name(name)?;

        self.storage.with_state(|state| {
            state.require_writable(self.storage.path())?;
            let parent = state.root.storage_mut(&self.segments)?;
            if let Some(existing) = parent.children.get(&encoded) {
                return Err(taken_error(name, existing));
            }
            parent
                .children
                .insert(encoded.clone(), Node::Storage(StorageNode::new(name)));
            parent.touch();
            state.dirty = true;
            Ok(())
        })?;

        tracing::debug!(dir = %self.key(), name, %encoded, "created storage");
        Ok(self.child(encoded))
    }

    pub fn open_dir(&self, name: &str) -> Result<DirectoryHandle> {
        let encoded = self.encode_name(name)?;

        self.storage.with_state(|state| {
            let parent = state.root.storage(&self.segments)?;
            match parent.children.get(&encoded) {
                Some(Node::Storage(storage)) if storage.original_name == name => Ok(()),
                _ => Err(StgError::NotFound(format!("storage {:?} in {:?}", name, self.key()))),
            }
        })?;

        Ok(self.child(encoded))
    }

    pub fn open_or_create_dir(&self, name: &str) -> Result<DirectoryHandle> {
        match self.open_dir(name) {
            Err(e) if e.is_not_found() => self.create_dir(name),
            other => other,
        }
    }

    /// Delete a child storage and everything below it.
    ///
    /// Fails with `SharingViolation` while a stream below it has a writer.
    pub fn delete_dir(&self, name: &str) -> Result<()> {
        let encoded = self.encode_name(name)?;
        let key = self.child_key(&encoded);

        self.storage.with_state(|state| {
            state.require_writable(self.storage.path())?;
            if state.has_writer_under(&key) {
                return Err(StgError::SharingViolation(format!(
                    "storage {:?} has open stream writers",
                    name
                )));
            }

            let parent = state.root.storage_mut(&self.segments)?;
            match parent.children.get(&encoded) {
                Some(Node::Storage(storage)) if storage.original_name == name => {}
                _ => return Err(StgError::NotFound(format!("storage {:?}", name))),
            }
            parent.children.remove(&encoded);
            parent.touch();

            state.invalidate_under(&key);
            state.dirty = true;
            Ok(())
        })?;

        tracing::debug!(dir = %self.key(), name, "deleted storage");
        Ok(())
    }

    // =========================================================================
    // Streams
    // =========================================================================

    /// Create a stream, or truncate it if it exists, and open it for writing
    pub fn create_stream(&self, name: &str) -> Result<StreamWriter> {
        let encoded = self.encode_name(name)?;
        let key = self.child_key(&encoded);

        self.storage.with_state(|state| {
            state.require_writable(self.storage.path())?;
            claim_writer(state, &key, name)?;

            let parent = state.root.storage_mut(&self.segments)?;
            match parent.children.get(&encoded) {
                Some(Node::Stream(stream)) if stream.original_name == name => {}
                Some(existing) => return Err(taken_error(name, existing)),
                None => {}
            }
            parent
                .children
                .insert(encoded.clone(), Node::Stream(StreamNode::new(name, Bytes::new())));
            parent.touch();

            state.invalidate(&key);
            state.writers.insert(key.clone());
            state.dirty = true;
            Ok(())
        })?;

        tracing::debug!(stream = %key, name, "created stream");
        Ok(StreamWriter::new(
            self.storage.clone(),
            self.segments.clone(),
            encoded,
            key,
            Vec::new(),
        ))
    }

    /// Open a stream for reading.
    ///
    /// A stream already opened once is served from the container's cached
    /// stream state as a fresh, rewound reader over the same bytes.
    pub fn open_stream(&self, name: &str) -> Result<StreamReader> {
        let encoded = self.encode_name(name)?;
        let key = self.child_key(&encoded);

        self.storage.with_state(|state| {
            if let Some(cached) = state.stream_states.get(&key) {
                if cached.original_name() != name {
                    return Err(StgError::NotFound(format!("stream {:?}", name)));
                }
                tracing::trace!(stream = %key, "stream state hit");
                return Ok(cached.reader(&key));
            }

            let OpenState {
                file,
                root,
                stream_states,
                ..
            } = state;

            let stream = root.storage(&self.segments)?.stream(&encoded)?;
            if stream.original_name != name {
                return Err(StgError::NotFound(format!("stream {:?}", name)));
            }

            let bytes = stream.materialize(Some(file))?;
            let cached = StreamState::new(bytes, stream.modified, name);
            let reader = cached.reader(&key);
            stream_states.insert(key.clone(), cached);

            tracing::trace!(stream = %key, len = reader.len(), "stream state cached");
            Ok(reader)
        })
    }

    /// Open an existing stream for writing, positioned at the start and
    /// seeded with its current bytes. Drops the cached read state.
    pub fn open_stream_for_write(&self, name: &str) -> Result<StreamWriter> {
        let encoded = self.encode_name(name)?;
        let key = self.child_key(&encoded);

        let initial = self.storage.with_state(|state| {
            state.require_writable(self.storage.path())?;
            claim_writer(state, &key, name)?;

            let stream = state.root.storage(&self.segments)?.stream(&encoded)?;
            if stream.original_name != name {
                return Err(StgError::NotFound(format!("stream {:?}", name)));
            }
            let bytes = stream.materialize(Some(&mut state.file))?;

            state.invalidate(&key);
            state.writers.insert(key.clone());
            Ok(bytes.to_vec())
        })?;

        Ok(StreamWriter::new(
            self.storage.clone(),
            self.segments.clone(),
            encoded,
            key,
            initial,
        ))
    }

    pub fn delete_stream(&self, name: &str) -> Result<()> {
        let encoded = self.encode_name(name)?;
        let key = self.child_key(&encoded);

        self.storage.with_state(|state| {
            state.require_writable(self.storage.path())?;
            if state.writers.contains(&key) {
                return Err(StgError::SharingViolation(format!(
                    "stream {:?} is open for writing",
                    name
                )));
            }

            let parent = state.root.storage_mut(&self.segments)?;
            match parent.children.get(&encoded) {
                Some(Node::Stream(stream)) if stream.original_name == name => {}
                _ => return Err(StgError::NotFound(format!("stream {:?}", name))),
            }
            parent.children.remove(&encoded);
            parent.touch();

            state.invalidate(&key);
            state.dirty = true;
            Ok(())
        })?;

        tracing::debug!(stream = %key, "deleted stream");
        Ok(())
    }

    // =========================================================================
    // Probes and Listing
    // =========================================================================

    /// Metadata of one child entry
    pub fn stat(&self, name: &str) -> Result<EntryInfo> {
        let encoded = self.encode_name(name)?;

        self.storage.with_state(|state| {
            let parent = state.root.storage(&self.segments)?;
            match parent.children.get(&encoded) {
                Some(node) if node.original_name() == name => Ok(EntryInfo::from_node(&encoded, node)),
                _ => Err(StgError::NotFound(format!("{:?} in {:?}", name, self.key()))),
            }
        })
    }

    /// All child entries, ordered by stored name
    pub fn entries(&self) -> Result<Vec<EntryInfo>> {
        self.storage.with_state(|state| {
            let parent = state.root.storage(&self.segments)?;
            Ok(parent
                .children
                .iter()
                .map(|(name, node)| EntryInfo::from_node(name, node))
                .collect())
        })
    }

    /// Existence probe; never fails
    pub fn exists_dir(&self, name: &str) -> bool {
        probe("exists_dir", self.stat(name)).is_some_and(|info| info.kind == EntryKind::Storage)
    }

    /// Existence probe; never fails
    pub fn exists_stream(&self, name: &str) -> bool {
        probe("exists_stream", self.stat(name)).is_some_and(|info| info.kind == EntryKind::Stream)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn encode_name(&self, name: &str) -> Result<String> {
        if name.is_empty() || name.contains(['/', '\\', SEPARATOR]) {
            return Err(StgError::Malformed(format!("invalid entry name {:?}", name)));
        }
        Ok(encode(name, self.storage.name_budget()))
    }

    fn child_key(&self, encoded: &str) -> String {
        if self.segments.is_empty() {
            encoded.to_string()
        } else {
            format!("{}/{}", self.key(), encoded)
        }
    }

    fn child(&self, encoded: String) -> DirectoryHandle {
        let mut segments = self.segments.clone();
        segments.push(encoded);
        DirectoryHandle::new(self.storage.clone(), segments)
    }
}

fn claim_writer(state: &OpenState, key: &str, name: &str) -> Result<()> {
    if state.writers.contains(key) {
        return Err(StgError::SharingViolation(format!(
            "stream {:?} is already open for writing",
            name
        )));
    }
    Ok(())
}

fn taken_error(name: &str, existing: &Node) -> StgError {
    if existing.original_name() == name {
        StgError::AlreadyExists(name.to_string())
    } else {
        StgError::AlreadyExists(format!(
            "{:?} collides with {:?} after encoding",
            name,
            existing.original_name()
        ))
    }
}

/// Ignore-policy lookup: missing entries are a plain `None`, other failures
/// are reported and then treated as missing.
fn probe<T>(op: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_not_found() => None,
        Err(e) => ErrorPolicy::Ignore.apply(op, Err(e)).ok().flatten(),
    }
}
