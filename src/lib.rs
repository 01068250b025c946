//! # stgcache
//!
//! Storage and caching substrate for an image catalog:
//! - Compound-file containers holding nested storages and streams
//! - Fixed-budget entry names via deterministic short-name encoding
//! - Complex paths addressing entries inside containers
//! - Expiring object cache with a background prefetch worker
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Application                             │
//! │           (catalog views, thumbnails, decoders)              │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ acquire / enqueue            │ open / create
//!                ▼                              ▼
//!   ┌─────────────────────────┐      ┌─────────────────────────┐
//!   │      ObjectCache        │      │   ContainerRegistry     │
//!   │  + PrefetchQueue worker │      │  (open containers)      │
//!   └────────────┬────────────┘      └────────────┬────────────┘
//!                │ owner.load(ComplexPath)        │
//!                ▼                                ▼
//!   ┌─────────────────────────┐      ┌─────────────────────────┐
//!   │   source::read_bytes    │─────►│   ContainerStorage      │
//!   └─────────────────────────┘      │  storages / streams     │
//!                                    └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod path;
pub mod storage;
pub mod cache;
pub mod source;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, StgError};
pub use config::{CacheConfig, StorageConfig};
pub use path::ComplexPath;
pub use storage::{ContainerRegistry, ContainerStorage, ErrorPolicy, OpenMode};
pub use cache::{CacheKey, CacheOwner, CacheStatusFlags, EnqueueResult, ObjectCache};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of stgcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
