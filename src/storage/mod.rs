//! Storage Module
//!
//! Compound-file containers: one physical file holding a tree of named
//! storages (directories) and streams (files).
//!
//! ## Responsibilities
//! - Open/create containers with OS-enforced share modes
//! - Navigate, create and delete storages and streams by name
//! - Keep every stored name within the container's name budget
//! - Share read-opened streams as independent cursors over one buffer
//! - Track open containers in an injected [`ContainerRegistry`]
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ ContainerRegistry (physical path → handle)  │
//! └──────────────────────┬──────────────────────┘
//!                        │
//! ┌──────────────────────▼──────────────────────┐
//! │ ContainerStorage                            │
//! │   OpenState: file + lock, tree,             │
//! │              stream states, writer slots    │
//! └──────────────────────┬──────────────────────┘
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!   DirectoryHandle            StreamReader / StreamWriter
//! ```
//! The on-disk layout is described in `format.rs`.

mod container;
mod directory;
mod format;
mod mode;
mod policy;
mod registry;
mod stream;
mod tree;

pub use container::ContainerStorage;
pub use directory::{DirectoryHandle, EntryInfo, EntryKind};
pub use mode::{Access, CreateMode, OpenMode, ShareMode};
pub use policy::ErrorPolicy;
pub use registry::ContainerRegistry;
pub use stream::{StreamReader, StreamState, StreamWriter};
