//! Error types for stgcache
//!
//! Provides a unified error type for all operations.

use std::io;

use thiserror::Error;

/// Result type alias using StgError
pub type Result<T> = std::result::Result<T, StgError>;

/// Unified error type for stgcache operations
#[derive(Debug, Error)]
pub enum StgError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Path Errors
    // -------------------------------------------------------------------------
    #[error("Malformed path: {0}")]
    Malformed(String),

    // -------------------------------------------------------------------------
    // Container Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Sharing violation: {0}")]
    SharingViolation(String),

    #[error("Container is read-only: {0}")]
    ReadOnly(String),

    #[error("Container is closed: {0}")]
    Closed(String),

    #[error("Container corruption detected: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    #[error("Entry expired: {0}")]
    Expired(String),

    #[error("Backing file deleted: {0}")]
    Deleted(String),

    #[error("Load failed: {0}")]
    LoadFailure(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`StgError`] for callers that branch on the
/// failure kind rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    NotFound,
    AlreadyExists,
    Malformed,
    SharingViolation,
    ReadOnly,
    Closed,
    Corrupt,
    Expired,
    Deleted,
    LoadFailure,
    Serialization,
    Config,
}

impl StgError {
    /// Classify this error.
    ///
    /// I/O errors carrying `NotFound`, `AlreadyExists` or a locking conflict
    /// are reported under the matching container kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StgError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorKind::NotFound,
                io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
                io::ErrorKind::WouldBlock => ErrorKind::SharingViolation,
                _ => ErrorKind::Io,
            },
            StgError::Malformed(_) => ErrorKind::Malformed,
            StgError::NotFound(_) => ErrorKind::NotFound,
            StgError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StgError::SharingViolation(_) => ErrorKind::SharingViolation,
            StgError::ReadOnly(_) => ErrorKind::ReadOnly,
            StgError::Closed(_) => ErrorKind::Closed,
            StgError::Corrupt(_) => ErrorKind::Corrupt,
            StgError::Expired(_) => ErrorKind::Expired,
            StgError::Deleted(_) => ErrorKind::Deleted,
            StgError::LoadFailure(_) => ErrorKind::LoadFailure,
            StgError::Serialization(_) => ErrorKind::Serialization,
            StgError::Config(_) => ErrorKind::Config,
        }
    }

    /// True if this error means "the entry is not there"
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<bincode::Error> for StgError {
    fn from(e: bincode::Error) -> Self {
        StgError::Serialization(e.to_string())
    }
}
