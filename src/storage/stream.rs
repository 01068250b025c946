//! Stream Handles
//!
//! Readers are independent cursors over shared, immutable bytes. The first
//! read-open of a stream records a [`StreamState`] in its container; later
//! read-opens clone that state into a fresh, rewound reader without touching
//! the directory tree or the file.
//!
//! Writers buffer in memory and publish their bytes to the container on
//! `flush` and on drop.

use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use bytes::Bytes;

use crate::error::Result;

use super::container::ContainerStorage;

// =============================================================================
// Stream State
// =============================================================================

/// Cached metadata of a stream opened for reading, retaining its bytes so
/// readers can be cloned from it.
#[derive(Debug, Clone)]
pub struct StreamState {
    size: u64,
    modified: SystemTime,
    original_name: String,
    origin: Bytes,
}

impl StreamState {
    pub(crate) fn new(origin: Bytes, modified: SystemTime, original_name: &str) -> Self {
        Self {
            size: origin.len() as u64,
            modified,
            original_name: original_name.to_string(),
            origin,
        }
    }

    /// Name the stream was created with
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// New reader positioned at the start
    pub(crate) fn reader(&self, key: &str) -> StreamReader {
        StreamReader {
            key: key.to_string(),
            cursor: Cursor::new(self.origin.clone()),
            modified: self.modified,
        }
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Read cursor over a stream's bytes
#[derive(Debug)]
pub struct StreamReader {
    key: String,
    cursor: Cursor<Bytes>,
    modified: SystemTime,
}

impl StreamReader {
    /// Fully-qualified encoded path of the stream inside its container
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// All bytes of the stream, independent of the cursor position
    pub fn to_bytes(&self) -> Bytes {
        self.cursor.get_ref().clone()
    }

    /// Independent reader over the same bytes, positioned at the start
    pub fn rewound_clone(&self) -> StreamReader {
        StreamReader {
            key: self.key.clone(),
            cursor: Cursor::new(self.cursor.get_ref().clone()),
            modified: self.modified,
        }
    }

    pub fn rewind(&mut self) {
        self.cursor.set_position(0);
    }
}

impl Clone for StreamReader {
    fn clone(&self) -> Self {
        self.rewound_clone()
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl BufRead for StreamReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Buffered writer for one stream.
///
/// Holds the container's write slot for the stream until dropped; a second
/// writer on the same stream is refused with `SharingViolation`.
pub struct StreamWriter {
    storage: ContainerStorage,
    dir: Vec<String>,
    name: String,
    key: String,
    cursor: Cursor<Vec<u8>>,
    dirty: bool,
}

impl StreamWriter {
    pub(crate) fn new(
        storage: ContainerStorage,
        dir: Vec<String>,
        name: String,
        key: String,
        initial: Vec<u8>,
    ) -> Self {
        Self {
            storage,
            dir,
            name,
            key,
            cursor: Cursor::new(initial),
            dirty: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Drop everything past `len`
    pub fn truncate(&mut self, len: u64) {
        let len = len as usize;
        if len < self.cursor.get_ref().len() {
            self.cursor.get_mut().truncate(len);
            self.dirty = true;
        }
        if self.cursor.position() > len as u64 {
            self.cursor.set_position(len as u64);
        }
    }

    /// Publish pending bytes and release the write slot
    pub fn finish(mut self) -> Result<()> {
        self.publish()
    }

    fn publish(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let bytes = Bytes::copy_from_slice(self.cursor.get_ref());
        self.storage.publish_stream(&self.dir, &self.name, &self.key, bytes)?;
        self.dirty = false;
        Ok(())
    }
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.cursor.write(buf)?;
        if written > 0 {
            self.dirty = true;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish().map_err(io::Error::other)
    }
}

impl Seek for StreamWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if let Err(e) = self.publish() {
            tracing::warn!(stream = %self.key, error = %e, "dropping unpublished stream data");
        }
        self.storage.release_writer(&self.key);
    }
}

impl std::fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("key", &self.key)
            .field("len", &self.cursor.get_ref().len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
