//! Tests for complex paths
//!
//! These tests verify:
//! - Splitting and joining around the reserved separator
//! - Drive and share prefixes are never searched for the separator
//! - Malformed paths are rejected
//! - Ordering groups entries of one container
//! - Pretty formatting, segments and prefix tests
//! - Modify time of the backing file

use std::fs;
use std::path::MAIN_SEPARATOR;

use stgcache::path::{join, split, ComplexPath, SEPARATOR};
use stgcache::ErrorKind;
use tempfile::TempDir;

// =============================================================================
// Split / Join Tests
// =============================================================================

#[test]
fn test_split_complex() {
    let (physical, embedded) = split("C:\\Images\\album.stg>photos/a.jpg").unwrap();

    assert_eq!(physical, "C:\\Images\\album.stg");
    assert_eq!(embedded.as_deref(), Some("photos/a.jpg"));
}

#[test]
fn test_split_plain() {
    let (physical, embedded) = split("/var/images/a.jpg").unwrap();

    assert_eq!(physical, "/var/images/a.jpg");
    assert!(embedded.is_none());
}

#[test]
fn test_split_after_share_prefix() {
    let (physical, embedded) = split("\\\\server\\share\\album.stg>a.jpg").unwrap();
    assert_eq!(physical, "\\\\server\\share\\album.stg");
    assert_eq!(embedded.as_deref(), Some("a.jpg"));

    let (physical, embedded) = split("\\\\?\\C:\\album.stg>dir\\a.jpg").unwrap();
    assert_eq!(physical, "\\\\?\\C:\\album.stg");
    assert_eq!(embedded.as_deref(), Some("dir\\a.jpg"));
}

#[test]
fn test_split_empty_embedded_is_root() {
    let path = ComplexPath::parse("album.stg>").unwrap();

    assert!(path.is_complex());
    assert_eq!(path.embedded(), Some(""));
    assert!(path.embedded_segments().is_empty());
}

#[test]
fn test_split_rejects_two_separators() {
    let err = split("a.stg>b>c").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[test]
fn test_split_rejects_empty_physical() {
    let err = split(">a.jpg").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[test]
fn test_split_inverts_join() {
    let physicals = [
        r"C:",
        r"C:\Images\album.stg",
        r"\\server\share",
        r"\\server",
        r"\\server\share\album.stg",
        r"//server/share",
        r"\\?\C:",
        r"\\?\C:\album.stg",
        r"\\?\UNC\server\share",
        "album.stg",
        "../catalogs/album.stg",
    ];

    for physical in physicals {
        for embedded in ["", "a.jpg", "2019\\summer/a.jpg"] {
            let joined = join(physical, embedded).unwrap();
            let (p, e) = split(&joined).unwrap();
            assert_eq!(p, physical, "physical part of {joined:?}");
            assert_eq!(e.as_deref(), Some(embedded), "embedded part of {joined:?}");

            let path = ComplexPath::new(physical, embedded).unwrap();
            assert_eq!(path.to_string().parse::<ComplexPath>().unwrap(), path);
        }
    }
}

#[test]
fn test_join() {
    assert_eq!(join("album.stg", "a/b.jpg").unwrap(), format!("album.stg{}a/b.jpg", SEPARATOR));
    assert_eq!(join("", "a").unwrap_err().kind(), ErrorKind::Malformed);
    assert_eq!(join("a>b", "c").unwrap_err().kind(), ErrorKind::Malformed);
    assert_eq!(join("a", "b>c").unwrap_err().kind(), ErrorKind::Malformed);
}

// =============================================================================
// ComplexPath Tests
// =============================================================================

#[test]
fn test_display_and_parse_agree() {
    let path = ComplexPath::new("/data/album.stg", "2019/summer/a.jpg").unwrap();
    let text = path.to_string();

    assert_eq!(text, "/data/album.stg>2019/summer/a.jpg");
    assert_eq!(text.parse::<ComplexPath>().unwrap(), path);
}

#[test]
fn test_plain_rejects_separator() {
    assert!(ComplexPath::plain("/data/a.jpg").is_ok());
    assert_eq!(
        ComplexPath::plain("/data/a.stg>b").unwrap_err().kind(),
        ErrorKind::Malformed
    );
}

#[test]
fn test_ordering_groups_by_container() {
    let mut paths = vec![
        ComplexPath::parse("b.stg>a").unwrap(),
        ComplexPath::parse("a.stg>z").unwrap(),
        ComplexPath::plain("a.stg").unwrap(),
        ComplexPath::parse("a.stg>m").unwrap(),
    ];
    paths.sort();

    let text: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    assert_eq!(text, vec!["a.stg", "a.stg>m", "a.stg>z", "b.stg>a"]);
}

#[test]
fn test_embedded_segments() {
    let path = ComplexPath::parse("album.stg>a/b\\c//d").unwrap();
    assert_eq!(path.embedded_segments(), vec!["a", "b", "c", "d"]);

    let plain = ComplexPath::plain("album.stg").unwrap();
    assert!(plain.embedded_segments().is_empty());
}

#[test]
fn test_format_pretty() {
    let path = ComplexPath::new("C:/Images/album.stg", "photos\\a.jpg").unwrap();
    let s = MAIN_SEPARATOR;

    assert_eq!(
        path.format_pretty(),
        format!("C:{s}Images{s}album.stg > photos/a.jpg")
    );
}

#[test]
fn test_starts_with() {
    let container = ComplexPath::parse("album.stg>").unwrap();
    let folder = ComplexPath::parse("album.stg>2019").unwrap();
    let photo = ComplexPath::parse("album.stg>2019/a.jpg").unwrap();
    let other = ComplexPath::parse("other.stg>2019/a.jpg").unwrap();

    assert!(photo.starts_with(&container));
    assert!(photo.starts_with(&folder));
    assert!(!other.starts_with(&folder));
}

#[test]
fn test_starts_with_stops_at_component_boundary() {
    let container = ComplexPath::plain("C:\\fruit.stg").unwrap();
    let folder = ComplexPath::parse("C:\\fruit.stg>World").unwrap();

    assert!(container.starts_with(&container));
    assert!(ComplexPath::parse("C:\\fruit.stg>apple.jpg").unwrap().starts_with(&container));
    assert!(ComplexPath::parse("C:\\fruit.stg>World/Asia").unwrap().starts_with(&folder));
    assert!(!ComplexPath::parse("C:\\fruit.stg2>apple.jpg").unwrap().starts_with(&container));
    assert!(!ComplexPath::plain("C:\\fruit.stg.bak").unwrap().starts_with(&container));
    assert!(!ComplexPath::parse("C:\\fruit.stg>Worldwide/a.jpg").unwrap().starts_with(&folder));
}

#[test]
fn test_modified_uses_physical_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("album.stg");
    fs::write(&file, b"x").unwrap();

    let present = ComplexPath::new(file.to_string_lossy(), "a.jpg").unwrap();
    let missing = ComplexPath::plain(temp.path().join("gone.jpg").to_string_lossy()).unwrap();

    assert_eq!(present.modified(), fs::metadata(&file).unwrap().modified().ok());
    assert!(missing.modified().is_none());
}
