//! Tests for stream readers and writers
//!
//! These tests verify:
//! - Readers opened from the cached stream state are independent cursors
//! - Overwriting or deleting a stream drops its cached state
//! - One writer per stream; writers publish on flush and drop
//! - Read-modify-write through open_stream_for_write
//! - Share-mode changes clear cached stream states

use std::io::{BufRead, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use stgcache::storage::{ContainerRegistry, ContainerStorage, OpenMode, ShareMode};
use stgcache::{ErrorKind, StorageConfig};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf, ContainerStorage) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("streams.stg");
    let registry = ContainerRegistry::with_defaults();
    let storage = ContainerStorage::create_or_open(&registry, &path, OpenMode::create()).unwrap();
    (temp_dir, path, storage)
}

fn write_stream(storage: &ContainerStorage, embedded: &str, data: &[u8]) {
    let mut writer = storage.create_stream_path(embedded).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
}

fn read_all(reader: &mut impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).unwrap();
    buf
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_readers_are_independent() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "dir/a.txt", b"0123456789");

    let mut first = storage.open_stream_path("dir/a.txt").unwrap();
    let mut head = [0u8; 4];
    first.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"0123");
    assert_eq!(first.position(), 4);

    let mut second = storage.open_stream_path("dir/a.txt").unwrap();
    assert_eq!(second.position(), 0);
    assert_eq!(read_all(&mut second), b"0123456789");
    assert_eq!(read_all(&mut first), b"456789");

    assert_eq!(storage.cached_stream_count(), 1);
    assert_eq!(first.key(), "dir/a.txt");
    assert_eq!(first.len(), 10);
}

#[test]
fn test_clone_is_rewound() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "a.txt", b"abcdef");

    let mut reader = storage.open_stream_path("a.txt").unwrap();
    reader.seek(SeekFrom::Start(3)).unwrap();

    let mut clone = reader.clone();
    assert_eq!(clone.position(), 0);
    assert_eq!(read_all(&mut clone), b"abcdef");
    assert_eq!(read_all(&mut reader), b"def");

    reader.rewind();
    assert_eq!(read_all(&mut reader), b"abcdef");
}

#[test]
fn test_reader_seek_and_lines() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "notes.txt", b"first\nsecond\nthird\n");

    let mut reader = storage.open_stream_path("notes.txt").unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "first\n");

    reader.seek(SeekFrom::End(-6)).unwrap();
    line.clear();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "third\n");
}

#[test]
fn test_empty_stream() {
    let (_temp, _path, storage) = setup_temp_storage();
    drop(storage.create_stream_path("empty.bin").unwrap());

    let reader = storage.open_stream_path("empty.bin").unwrap();

    assert!(reader.is_empty());
    assert!(reader.to_bytes().is_empty());
}

#[test]
fn test_overwrite_drops_cached_state() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "a.txt", b"old");

    let old_reader = storage.open_stream_path("a.txt").unwrap();
    assert_eq!(storage.cached_stream_count(), 1);

    write_stream(&storage, "a.txt", b"new contents");
    assert_eq!(storage.cached_stream_count(), 0);

    let mut fresh = storage.open_stream_path("a.txt").unwrap();
    assert_eq!(read_all(&mut fresh), b"new contents");
    assert_eq!(old_reader.to_bytes().as_ref(), b"old");
}

#[test]
fn test_delete_drops_cached_state() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "a/b/c.txt", b"c");
    storage.open_stream_path("a/b/c.txt").unwrap();
    assert_eq!(storage.cached_stream_count(), 1);

    storage.root().unwrap().delete_dir("a").unwrap();

    assert_eq!(storage.cached_stream_count(), 0);
    assert_eq!(
        storage.open_stream_path("a/b/c.txt").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_reads_survive_commit() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "a.txt", b"before commit");
    let reader = storage.open_stream_path("a.txt").unwrap();

    storage.commit().unwrap();

    assert_eq!(reader.to_bytes().as_ref(), b"before commit");
    let mut after = storage.open_stream_path("a.txt").unwrap();
    assert_eq!(read_all(&mut after), b"before commit");
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_single_writer_per_stream() {
    let (_temp, _path, storage) = setup_temp_storage();
    let root = storage.root().unwrap();

    let writer = root.create_stream("a.txt").unwrap();
    assert_eq!(root.create_stream("a.txt").unwrap_err().kind(), ErrorKind::SharingViolation);
    assert_eq!(
        root.open_stream_for_write("a.txt").unwrap_err().kind(),
        ErrorKind::SharingViolation
    );
    assert_eq!(root.delete_stream("a.txt").unwrap_err().kind(), ErrorKind::SharingViolation);

    drop(writer);
    assert!(root.create_stream("a.txt").is_ok());
}

#[test]
fn test_flush_publishes() {
    let (_temp, _path, storage) = setup_temp_storage();
    let mut writer = storage.create_stream_path("log.txt").unwrap();

    writer.write_all(b"line one\n").unwrap();
    writer.flush().unwrap();
    let mut reader = storage.open_stream_path("log.txt").unwrap();
    assert_eq!(read_all(&mut reader), b"line one\n");

    writer.write_all(b"line two\n").unwrap();
    drop(writer);
    let mut reader = storage.open_stream_path("log.txt").unwrap();
    assert_eq!(read_all(&mut reader), b"line one\nline two\n");
}

#[test]
fn test_open_for_write_seeds_existing_bytes() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "a.txt", b"hello world");
    let root = storage.root().unwrap();

    let mut writer = root.open_stream_for_write("a.txt").unwrap();
    assert_eq!(writer.len(), 11);
    writer.write_all(b"HELLO").unwrap();
    writer.seek(SeekFrom::End(0)).unwrap();
    writer.write_all(b"!").unwrap();
    writer.finish().unwrap();

    let mut reader = root.open_stream("a.txt").unwrap();
    assert_eq!(read_all(&mut reader), b"HELLO world!");
}

#[test]
fn test_writer_truncate() {
    let (_temp, _path, storage) = setup_temp_storage();
    write_stream(&storage, "a.txt", b"0123456789");

    let mut writer = storage.root().unwrap().open_stream_for_write("a.txt").unwrap();
    writer.truncate(4);
    assert_eq!(writer.len(), 4);
    writer.finish().unwrap();

    let mut reader = storage.open_stream_path("a.txt").unwrap();
    assert_eq!(read_all(&mut reader), b"0123");
}

#[test]
fn test_streams_persist_across_reopen() {
    let (_temp, path, storage) = setup_temp_storage();
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    write_stream(&storage, "big.bin", &payload);
    write_stream(&storage, "x/small.bin", b"s");
    let registry = Arc::clone(storage.registry());
    storage.close().unwrap();

    let storage = ContainerStorage::create_or_open(&registry, &path, OpenMode::read()).unwrap();
    let mut reader = storage.open_stream_path("big.bin").unwrap();
    assert_eq!(read_all(&mut reader), payload);
    let info = storage.root().unwrap().stat("big.bin").unwrap();
    assert_eq!(info.size, 10_000);
}

// =============================================================================
// Share Mode Tests
// =============================================================================

#[test]
fn test_share_mode_change_clears_states() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("shared.stg");
    let config = StorageConfig::builder().allow_shared_access(true).build().unwrap();
    let registry = ContainerRegistry::new(config);
    let storage = ContainerStorage::create_or_open(&registry, &path, OpenMode::create()).unwrap();
    write_stream(&storage, "a.txt", b"a");
    storage.open_stream_path("a.txt").unwrap();
    assert_eq!(storage.cached_stream_count(), 1);

    storage.set_share_mode(ShareMode::DenyWrite).unwrap();

    assert_eq!(storage.cached_stream_count(), 0);
    assert_eq!(storage.mode().unwrap().share, ShareMode::DenyWrite);
    let mut reader = storage.open_stream_path("a.txt").unwrap();
    assert_eq!(read_all(&mut reader), b"a");
}
