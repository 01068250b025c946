//! Complex Path Sources
//!
//! Reads the bytes a [`ComplexPath`] points at, for use inside a cache
//! owner's loader. Embedded paths are served from the container already open
//! in the registry when there is one; otherwise the container is opened
//! read-only just for the read and closed again.

use std::fs;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::path::ComplexPath;
use crate::storage::{ContainerRegistry, ContainerStorage, OpenMode};

/// All bytes of the file or stream named by `path`
pub fn read_bytes(registry: &Arc<ContainerRegistry>, path: &ComplexPath) -> Result<Bytes> {
    let Some(embedded) = path.embedded() else {
        return Ok(Bytes::from(fs::read(path.physical())?));
    };

    if let Some(storage) = registry.find(path.physical()) {
        tracing::trace!(path = %path, "reading through open container");
        return Ok(storage.open_stream_path(embedded)?.to_bytes());
    }

    let storage = ContainerStorage::create_or_open(registry, path.physical(), OpenMode::read())?;
    let result = storage.open_stream_path(embedded).map(|reader| reader.to_bytes());
    storage.close()?;
    result
}

/// Existence probe for the file or stream named by `path`; never fails
pub fn exists(registry: &Arc<ContainerRegistry>, path: &ComplexPath) -> bool {
    let Some(embedded) = path.embedded() else {
        return path.physical_path().is_file();
    };

    if let Some(storage) = registry.find(path.physical()) {
        return storage.exists_stream_path(embedded);
    }

    match ContainerStorage::create_or_open(registry, path.physical(), OpenMode::read()) {
        Ok(storage) => {
            let found = storage.exists_stream_path(embedded);
            if let Err(e) = storage.close() {
                tracing::warn!(path = %path, error = %e, "closing probed container failed");
            }
            found
        }
        Err(_) => false,
    }
}
