//! Tests for name encoding and path parts
//!
//! These tests verify:
//! - Names within the budget pass through unchanged
//! - Long names shrink to exactly the budget, keeping prefix and extension
//! - The hash suffix depends on the whole name
//! - Tiny budgets and oversized extensions
//! - Lengths are counted in characters
//! - Lexical path splitting

use stgcache::path::{encode, is_encoded, name_hash, PathParts, HASH_SUFFIX_LEN};

// =============================================================================
// Helper Functions
// =============================================================================

fn hash_hex(name: &str) -> String {
    format!("{:08x}", name_hash(name))
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_short_name_unchanged() {
    assert_eq!(encode("apple.jpg", 31), "apple.jpg");
    assert_eq!(encode("", 31), "");
}

#[test]
fn test_name_at_budget_unchanged() {
    let name = "a".repeat(27) + ".jpg";
    assert_eq!(name.chars().count(), 31);
    assert_eq!(encode(&name, 31), name);
}

#[test]
fn test_long_name_keeps_prefix_and_extension() {
    let name = "This is a long filename ABCD.txt";
    assert_eq!(name.chars().count(), 32);

    let encoded = encode(name, 31);

    assert_eq!(encoded.chars().count(), 31);
    assert_eq!(encoded, format!("This is a long fil_{}.txt", hash_hex(name)));
    assert!(is_encoded(&encoded));
}

#[test]
fn test_encoding_is_deterministic() {
    let name = "Summer holiday at the lake house, day three.jpeg";
    assert_eq!(encode(name, 31), encode(name, 31));
}

#[test]
fn test_shared_prefix_encodes_differently() {
    let a = "Summer holiday at the lake house 001.jpg";
    let b = "Summer holiday at the lake house 002.jpg";

    let ea = encode(a, 31);
    let eb = encode(b, 31);

    assert_ne!(ea, eb);
    assert_eq!(ea.chars().count(), 31);
    assert_eq!(eb.chars().count(), 31);
}

#[test]
fn test_tiny_budget_uses_hash_tail() {
    let name = "some fairly long name.png";
    let hex = hash_hex(name);

    for budget in 1..HASH_SUFFIX_LEN {
        let encoded = encode(name, budget);
        assert_eq!(encoded.len(), budget);
        assert!(hex.ends_with(&encoded));
    }
}

#[test]
fn test_oversized_extension_dropped() {
    let name = "a".repeat(40) + ".averyveryverylongextension";

    let encoded = encode(&name, 31);

    assert_eq!(encoded.chars().count(), 31);
    assert!(encoded.ends_with(&hash_hex(&name)));
    assert!(encoded.starts_with(&"a".repeat(22)));
}

#[test]
fn test_budget_counts_characters() {
    let name = "é".repeat(40) + ".jpg";

    let encoded = encode(&name, 31);

    assert_eq!(encoded.chars().count(), 31);
    assert!(encoded.starts_with(&"é".repeat(18)));
    assert!(encoded.ends_with(".jpg"));
}

#[test]
fn test_is_encoded_rejects_plain_names() {
    assert!(!is_encoded("apple.jpg"));
    assert!(!is_encoded("photo_2019.jpg"));
    assert!(!is_encoded("_1234567"));
}

// =============================================================================
// Path Parts Tests
// =============================================================================

#[test]
fn test_parts_drive_path() {
    let parts = PathParts::parse("C:\\Images\\photo.jpg");

    assert_eq!(parts.drive, "C:");
    assert_eq!(parts.dir, "\\Images\\");
    assert_eq!(parts.basename, "photo");
    assert_eq!(parts.extension, ".jpg");
    assert!(parts.has_drive());
    assert_eq!(parts.file_name(), "photo.jpg");
    assert_eq!(parts.to_string(), "C:\\Images\\photo.jpg");
}

#[test]
fn test_parts_unc_path() {
    let parts = PathParts::parse("\\\\server\\share\\album\\a.b.png");

    assert_eq!(parts.drive, "\\\\server\\share");
    assert_eq!(parts.dir, "\\album\\");
    assert_eq!(parts.basename, "a.b");
    assert_eq!(parts.extension, ".png");
}

#[test]
fn test_parts_relative_and_hidden() {
    let parts = PathParts::parse("notes/.hidden");
    assert!(!parts.has_drive());
    assert_eq!(parts.dir, "notes/");
    assert_eq!(parts.basename, ".hidden");
    assert_eq!(parts.extension, "");

    let bare = PathParts::parse("readme");
    assert_eq!(bare.dir, "");
    assert_eq!(bare.basename, "readme");
}
