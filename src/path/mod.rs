//! Path Module
//!
//! Names and paths as the container layer sees them.
//!
//! ## Responsibilities
//! - Shrink long logical names to the container's fixed name budget
//! - Split a filesystem path into drive / dir / basename / extension
//! - Model "complex" paths that point inside a container file
//!
//! ## Complex Path Form
//! ```text
//! C:\Images\fruit.stg > World\Europe\apple.jpg
//! └──── physical ────┘ │ └────── embedded ─────┘
//!                  SEPARATOR
//! ```
//! The physical part is a real filesystem path; the embedded part addresses
//! storages and streams inside the container named by the physical part.

mod codec;
mod complex;
mod parts;

pub use codec::{encode, is_encoded, name_hash, HASH_SUFFIX_LEN};
pub use complex::{join, split, ComplexPath, SEPARATOR};
pub use parts::PathParts;
