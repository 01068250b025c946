//! Container File Format
//!
//! Reads and writes the whole-file image of a container.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (32 bytes)                                            │
//! │   Magic "STGC" (4) | Version u16 (2) | NameBudget u16 (2)    │
//! │   DirOffset u64 (8) | DirLen u64 (8) | DirCRC u32 (4) | (4)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Data Region (variable)                                       │
//! │   stream payloads, concatenated in directory order           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Directory Block (DirLen bytes)                               │
//! │   bincode(EntryRecord) rooted at an unnamed storage          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StgError};

use super::tree::{from_millis, to_millis, Node, StorageNode, StreamData, StreamNode};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes identifying a container file
pub(crate) const MAGIC: &[u8; 4] = b"STGC";

/// Current container format version
pub(crate) const VERSION: u16 = 1;

/// Header size in bytes
pub(crate) const HEADER_SIZE: u64 = 32;

// =============================================================================
// Header
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContainerHeader {
    pub name_budget: u16,
    pub dir_offset: u64,
    pub dir_len: u64,
    pub dir_crc: u32,
}

impl ContainerHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&VERSION.to_le_bytes());
        buf[6..8].copy_from_slice(&self.name_budget.to_le_bytes());
        buf[8..16].copy_from_slice(&self.dir_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.dir_len.to_le_bytes());
        buf[24..28].copy_from_slice(&self.dir_crc.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self> {
        if &buf[0..4] != MAGIC {
            return Err(StgError::Corrupt(format!(
                "Invalid container magic: expected STGC, got {:?}",
                &buf[0..4]
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != VERSION {
            return Err(StgError::Corrupt(format!(
                "Unsupported container version: {}",
                version
            )));
        }

        Ok(Self {
            name_budget: u16::from_le_bytes([buf[6], buf[7]]),
            dir_offset: u64::from_le_bytes(buf[8..16].try_into().unwrap_or_default()),
            dir_len: u64::from_le_bytes(buf[16..24].try_into().unwrap_or_default()),
            dir_crc: u32::from_le_bytes(buf[24..28].try_into().unwrap_or_default()),
        })
    }
}

// =============================================================================
// Directory Records
// =============================================================================

/// Serialized form of one directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum EntryRecord {
    Storage {
        name: String,
        original_name: String,
        modified_ms: u64,
        children: Vec<EntryRecord>,
    },
    Stream {
        name: String,
        original_name: String,
        modified_ms: u64,
        offset: u64,
        len: u64,
        crc: u32,
    },
}

impl EntryRecord {
    fn into_node(self) -> (String, Node) {
        match self {
            EntryRecord::Storage {
                name,
                original_name,
                modified_ms,
                children,
            } => {
                let storage = StorageNode {
                    original_name,
                    modified: from_millis(modified_ms),
                    children: children.into_iter().map(EntryRecord::into_node).collect(),
                };
                (name, Node::Storage(storage))
            }
            EntryRecord::Stream {
                name,
                original_name,
                modified_ms,
                offset,
                len,
                crc,
            } => {
                let stream = StreamNode {
                    original_name,
                    modified: from_millis(modified_ms),
                    data: StreamData::OnDisk { offset, len, crc },
                };
                (name, Node::Stream(stream))
            }
        }
    }
}

// =============================================================================
// Reading
// =============================================================================

/// Read header and directory tree from an open container file
pub(crate) fn read_container(file: &mut File) -> Result<(ContainerHeader, StorageNode)> {
    let file_len = file.metadata()?.len();
    if file_len < HEADER_SIZE {
        return Err(StgError::Corrupt(format!(
            "file too short for a container header: {} bytes",
            file_len
        )));
    }

    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; HEADER_SIZE as usize];
    file.read_exact(&mut buf)?;
    let header = ContainerHeader::decode(&buf)?;

    let dir_end = header.dir_offset.checked_add(header.dir_len);
    if header.dir_offset < HEADER_SIZE || dir_end.map_or(true, |end| end > file_len) {
        return Err(StgError::Corrupt(format!(
            "directory block out of bounds: offset {} len {} file {}",
            header.dir_offset, header.dir_len, file_len
        )));
    }

    file.seek(SeekFrom::Start(header.dir_offset))?;
    let mut dir_bytes = vec![0u8; header.dir_len as usize];
    file.read_exact(&mut dir_bytes)?;

    let actual = crc32fast::hash(&dir_bytes);
    if actual != header.dir_crc {
        return Err(StgError::Corrupt(format!(
            "directory checksum mismatch: expected {:08x}, got {:08x}",
            header.dir_crc, actual
        )));
    }

    let record: EntryRecord = bincode::deserialize(&dir_bytes)?;
    match record.into_node() {
        (_, Node::Storage(root)) => Ok((header, root)),
        (_, Node::Stream(_)) => Err(StgError::Corrupt("directory root is a stream".to_string())),
    }
}

// =============================================================================
// Writing
// =============================================================================

/// Write a complete container image to `out`.
///
/// Stream bytes still on disk are pulled from `source`. Returns the tree as
/// it now lives in `out` (every stream `OnDisk`).
pub(crate) fn write_image<W: Write + Seek>(
    out: &mut W,
    name_budget: u16,
    root: &StorageNode,
    mut source: Option<&mut File>,
) -> Result<StorageNode> {
    out.seek(SeekFrom::Start(0))?;
    out.write_all(&[0u8; HEADER_SIZE as usize])?;

    let mut offset = HEADER_SIZE;
    let record = write_storage(out, &mut offset, "", root, &mut source)?;

    let dir_bytes = bincode::serialize(&record)?;
    let header = ContainerHeader {
        name_budget,
        dir_offset: offset,
        dir_len: dir_bytes.len() as u64,
        dir_crc: crc32fast::hash(&dir_bytes),
    };
    out.write_all(&dir_bytes)?;

    out.seek(SeekFrom::Start(0))?;
    out.write_all(&header.encode())?;
    out.flush()?;

    match record.into_node() {
        (_, Node::Storage(tree)) => Ok(tree),
        (_, Node::Stream(_)) => Err(StgError::Corrupt("directory root is a stream".to_string())),
    }
}

fn write_storage<W: Write>(
    out: &mut W,
    offset: &mut u64,
    name: &str,
    storage: &StorageNode,
    source: &mut Option<&mut File>,
) -> Result<EntryRecord> {
    let mut children = Vec::with_capacity(storage.children.len());

    for (child_name, node) in &storage.children {
        let record = match node {
            Node::Storage(child) => write_storage(out, offset, child_name, child, source)?,
            Node::Stream(stream) => {
                let bytes = stream.materialize(source.as_deref_mut())?;
                out.write_all(&bytes)?;

                let record = EntryRecord::Stream {
                    name: child_name.clone(),
                    original_name: stream.original_name.clone(),
                    modified_ms: to_millis(stream.modified),
                    offset: *offset,
                    len: bytes.len() as u64,
                    crc: crc32fast::hash(&bytes),
                };
                *offset += bytes.len() as u64;
                record
            }
        };
        children.push(record);
    }

    Ok(EntryRecord::Storage {
        name: name.to_string(),
        original_name: storage.original_name.clone(),
        modified_ms: to_millis(storage.modified),
        children,
    })
}

/// Rewrite the container at `path` through a sibling temp file and rename it
/// into place. `source` is the currently open handle of `path`.
pub(crate) fn rewrite_container(
    path: &Path,
    name_budget: u16,
    root: &StorageNode,
    source: &mut File,
    lock: impl FnOnce(&File) -> Result<()>,
) -> Result<(StorageNode, File)> {
    let tmp = temp_path(path);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;

    let mut writer = BufWriter::new(file);
    let result = write_image(&mut writer, name_budget, root, Some(source)).and_then(|tree| {
        let file = writer
            .into_inner()
            .map_err(|e| StgError::Io(e.into_error()))?;
        file.sync_all()?;
        // The replacement is locked before it becomes visible under `path`
        lock(&file)?;
        fs::rename(&tmp, path)?;
        Ok((tree, file))
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
