//! Tests for path suppliers
//!
//! These tests verify:
//! - SequentialPaths naming, limits and discovery
//! - "existing only" mode for reading back
//! - Closures and ReplayPaths as suppliers

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use blockroll::{BlockSink, BlockSource, EngineConfig, PathSupplier, ReplayPaths, SequentialPaths};
use tempfile::TempDir;

// =============================================================================
// SequentialPaths Tests
// =============================================================================

#[test]
fn test_sequential_custom_naming() {
    let paths = SequentialPaths::new("/var/blocks")
        .with_prefix("segment")
        .with_extension("dat");

    assert_eq!(paths.next_path(), Some(PathBuf::from("/var/blocks/segment_000001.dat")));
    assert_eq!(paths.next_path(), Some(PathBuf::from("/var/blocks/segment_000002.dat")));
    assert_eq!(paths.dir(), PathBuf::from("/var/blocks").as_path());
}

#[test]
fn test_sequential_limit() {
    let paths = SequentialPaths::new("/tmp/x").with_limit(3);

    assert!(paths.next_path().is_some());
    assert!(paths.next_path().is_some());
    assert!(paths.next_path().is_some());
    assert_eq!(paths.next_path(), None);
    assert_eq!(paths.next_path(), None);
}

#[test]
fn test_existing_only_stops_at_gap() {
    let temp = TempDir::new().unwrap();
    let writer = SequentialPaths::new(temp.path());
    fs::write(writer.path_for(1), b"one").unwrap();
    fs::write(writer.path_for(2), b"two").unwrap();
    fs::write(writer.path_for(4), b"four").unwrap();

    let reader = SequentialPaths::existing(temp.path());
    assert_eq!(reader.next_path(), Some(writer.path_for(1)));
    assert_eq!(reader.next_path(), Some(writer.path_for(2)));
    assert_eq!(reader.next_path(), None);

    // The missing id is not consumed; it is picked up once it appears
    fs::write(writer.path_for(3), b"three").unwrap();
    assert_eq!(reader.next_path(), Some(writer.path_for(3)));
    assert_eq!(reader.next_path(), Some(writer.path_for(4)));
}

#[test]
fn test_discover_lists_matching_blocks_sorted() {
    let temp = TempDir::new().unwrap();
    let paths = SequentialPaths::new(temp.path());
    fs::write(paths.path_for(12), b"").unwrap();
    fs::write(paths.path_for(3), b"").unwrap();
    fs::write(temp.path().join("notes.txt"), b"").unwrap();
    fs::write(temp.path().join("block_xyz.blk"), b"").unwrap();

    assert_eq!(paths.discover().unwrap(), vec![3, 12]);
}

#[test]
fn test_discover_missing_directory_is_empty() {
    let temp = TempDir::new().unwrap();
    let paths = SequentialPaths::new(temp.path().join("nope"));

    assert!(paths.discover().unwrap().is_empty());
}

#[test]
fn test_sink_creates_block_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("deep").join("blocks");

    let sink = BlockSink::new(EngineConfig::default(), SequentialPaths::new(&dir)).unwrap();
    sink.write(b"hello").unwrap();
    sink.close();

    assert!(dir.join("block_000001.blk").exists());
}

// =============================================================================
// Other Supplier Tests
// =============================================================================

#[test]
fn test_replay_paths_in_order() {
    let paths = ReplayPaths::new(["b", "a"]);

    assert_eq!(paths.remaining(), 2);
    assert_eq!(paths.next_path(), Some(PathBuf::from("b")));
    assert_eq!(paths.next_path(), Some(PathBuf::from("a")));
    assert_eq!(paths.next_path(), None);
    assert_eq!(paths.remaining(), 0);
}

#[test]
fn test_closure_supplier_drives_sink_and_source() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let counter = Arc::new(AtomicU32::new(0));

    let write_dir = dir.clone();
    let write_counter = Arc::clone(&counter);
    let supplier = move || {
        let n = write_counter.fetch_add(1, Ordering::SeqCst);
        Some(write_dir.join(format!("part-{}", n)))
    };

    let config = EngineConfig::builder().block_capacity(1024).build();
    let sink = BlockSink::new(config.clone(), supplier).unwrap();
    sink.write(&[7u8; 3000]).unwrap();
    sink.close();

    let read_dir = dir.clone();
    let read_counter = Arc::new(AtomicU32::new(0));
    let source = BlockSource::new(config, move || {
        let n = read_counter.fetch_add(1, Ordering::SeqCst);
        let path = read_dir.join(format!("part-{}", n));
        if path.exists() {
            Some(path)
        } else {
            None
        }
    })
    .unwrap();

    let mut out = Vec::new();
    std::io::copy(&mut &source, &mut out).unwrap();
    assert_eq!(out, vec![7u8; 3000]);
}
