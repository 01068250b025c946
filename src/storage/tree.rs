//! In-memory directory tree of an open container.
//!
//! Child maps are keyed by the encoded (on-disk) name; each node also keeps
//! the original name it was created with so listings can show it and
//! colliding encodings can be detected.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::error::{Result, StgError};

/// Where a stream's bytes currently live
#[derive(Debug, Clone)]
pub(crate) enum StreamData {
    /// Still in the container file at the last commit
    OnDisk { offset: u64, len: u64, crc: u32 },
    /// Written since the last commit
    Memory(Bytes),
}

#[derive(Debug, Clone)]
pub(crate) struct StreamNode {
    pub original_name: String,
    pub modified: SystemTime,
    pub data: StreamData,
}

#[derive(Debug, Clone)]
pub(crate) struct StorageNode {
    pub original_name: String,
    pub modified: SystemTime,
    pub children: BTreeMap<String, Node>,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Storage(StorageNode),
    Stream(StreamNode),
}

impl StreamNode {
    pub fn new(original_name: &str, data: Bytes) -> Self {
        Self {
            original_name: original_name.to_string(),
            modified: SystemTime::now(),
            data: StreamData::Memory(data),
        }
    }

    pub fn len(&self) -> u64 {
        match &self.data {
            StreamData::OnDisk { len, .. } => *len,
            StreamData::Memory(bytes) => bytes.len() as u64,
        }
    }

    /// Load the stream's bytes, verifying the recorded checksum for data
    /// still on disk.
    pub fn materialize(&self, file: Option<&mut File>) -> Result<Bytes> {
        match &self.data {
            StreamData::Memory(bytes) => Ok(bytes.clone()),
            StreamData::OnDisk { offset, len, crc } => {
                let file = file.ok_or_else(|| {
                    StgError::Corrupt("stream data on disk but no source file".to_string())
                })?;
                file.seek(SeekFrom::Start(*offset))?;
                let mut buf = vec![0u8; *len as usize];
                file.read_exact(&mut buf)?;

                let actual = crc32fast::hash(&buf);
                if actual != *crc {
                    return Err(StgError::Corrupt(format!(
                        "stream {:?} checksum mismatch: expected {:08x}, got {:08x}",
                        self.original_name, crc, actual
                    )));
                }
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl StorageNode {
    pub fn new(original_name: &str) -> Self {
        Self {
            original_name: original_name.to_string(),
            modified: SystemTime::now(),
            children: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.modified = SystemTime::now();
    }

    /// Descend through `segments` (encoded names), all of which must be storages
    pub fn storage(&self, segments: &[String]) -> Result<&StorageNode> {
        let mut current = self;
        for segment in segments {
            current = match current.children.get(segment) {
                Some(Node::Storage(storage)) => storage,
                _ => return Err(StgError::NotFound(format!("storage {:?}", segment))),
            };
        }
        Ok(current)
    }

    pub fn storage_mut(&mut self, segments: &[String]) -> Result<&mut StorageNode> {
        let mut current = self;
        for segment in segments {
            current = match current.children.get_mut(segment) {
                Some(Node::Storage(storage)) => storage,
                _ => return Err(StgError::NotFound(format!("storage {:?}", segment))),
            };
        }
        Ok(current)
    }

    pub fn stream(&self, name: &str) -> Result<&StreamNode> {
        match self.children.get(name) {
            Some(Node::Stream(stream)) => Ok(stream),
            _ => Err(StgError::NotFound(format!("stream {:?}", name))),
        }
    }

    pub fn stream_mut(&mut self, name: &str) -> Result<&mut StreamNode> {
        match self.children.get_mut(name) {
            Some(Node::Stream(stream)) => Ok(stream),
            _ => Err(StgError::NotFound(format!("stream {:?}", name))),
        }
    }
}

impl Node {
    pub fn original_name(&self) -> &str {
        match self {
            Node::Storage(s) => &s.original_name,
            Node::Stream(s) => &s.original_name,
        }
    }
}

// =============================================================================
// Timestamp Helpers
// =============================================================================

pub(crate) fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) fn from_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}
