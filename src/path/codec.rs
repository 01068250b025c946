//! Name Codec
//!
//! Shrinks arbitrary-length names to a fixed character budget.
//!
//! ## Encoded Form
//! ```text
//! "This is a long filename ABCD.txt"  (32 chars, budget 31)
//!   → "This is a long fil_1a2b3c4d.txt"
//!      └── prefix ─────┘└ hash ─┘└ext┘
//! ```
//! The hash is CRC-32 over the full original name, so two long names that
//! share a truncated prefix still encode differently. Encoding is not
//! collision-free; the container layer checks for collisions on create.

use super::parts::PathParts;

/// Characters taken by `_` plus the 8 hex digits of the hash
pub const HASH_SUFFIX_LEN: usize = 9;

/// Hash of the full name used in the encoded suffix
pub fn name_hash(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

/// Shrink `name` to at most `budget` characters.
///
/// Names that already fit are returned unchanged. Lengths are counted in
/// characters, not bytes.
pub fn encode(name: &str, budget: usize) -> String {
    if name.chars().count() <= budget {
        return name.to_string();
    }

    let hash = format!("{:08x}", name_hash(name));
    if budget < HASH_SUFFIX_LEN {
        // hex digits are ASCII, byte slicing is safe
        return hash[hash.len() - budget..].to_string();
    }

    let parts = PathParts::parse(name);
    let ext_len = parts.extension.chars().count();

    // Keep the extension only if at least one prefix character survives
    let (stem, extension) = if ext_len > 0 && budget > HASH_SUFFIX_LEN + ext_len {
        (&name[..name.len() - parts.extension.len()], parts.extension.as_str())
    } else {
        (name, "")
    };

    let prefix_len = budget - HASH_SUFFIX_LEN - extension.chars().count();
    let prefix: String = stem.chars().take(prefix_len).collect();

    format!("{}_{}{}", prefix, hash, extension)
}

/// True if `name` has the shape produced by [`encode`] for a long name
pub fn is_encoded(name: &str) -> bool {
    let parts = PathParts::parse(name);
    let candidates = [parts.basename.as_str(), name];

    candidates.iter().any(|candidate| {
        let bytes = candidate.as_bytes();
        if bytes.len() < HASH_SUFFIX_LEN {
            return false;
        }
        let suffix = &bytes[bytes.len() - HASH_SUFFIX_LEN..];
        suffix[0] == b'_' && suffix[1..].iter().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
    })
}
