//! Tests for BlockSource
//!
//! These tests verify:
//! - End of stream when the supplier runs dry (not an error)
//! - Reads inside one block and across block boundaries
//! - Real open/read failures propagate as errors
//! - Pre-open dispatch for the read side
//! - Close semantics and io::Read integration

#[path = "../common/mod.rs"]
mod common;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use blockroll::{BlockError, BlockSource, EngineConfig, ReadStatus, ReplayPaths};
use common::{block_path, pattern, small_config, CountingPaths, Event, MemoryFactory};

// =============================================================================
// Helper Functions
// =============================================================================

/// Seed blocks of the given sizes and return the bytes they hold, in order
fn seed_blocks(factory: &MemoryFactory, sizes: &[usize]) -> Vec<u8> {
    let mut all = Vec::new();
    for (i, size) in sizes.iter().enumerate() {
        let data = pattern(*size, i as u32 + 100);
        factory.insert(block_path(i + 1), &data);
        all.extend_from_slice(&data);
    }
    all
}

fn setup_source(sizes: &[usize]) -> (MemoryFactory, CountingPaths, BlockSource<MemoryFactory>, Vec<u8>) {
    let factory = MemoryFactory::new();
    let expected = seed_blocks(&factory, sizes);
    let paths = CountingPaths::with_limit(sizes.len());
    let source =
        BlockSource::with_factory(small_config(), Arc::new(paths.clone()), factory.clone()).unwrap();
    (factory, paths, source, expected)
}

fn read_all(source: &BlockSource<MemoryFactory>, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        match source.read(&mut buf).unwrap() {
            ReadStatus::Bytes(n) => out.extend_from_slice(&buf[..n]),
            ReadStatus::EndOfStream => break,
        }
    }
    out
}

// =============================================================================
// End of Stream Tests
// =============================================================================

#[test]
fn test_empty_supplier_is_end_of_stream() {
    let (_factory, _paths, source, _) = setup_source(&[]);

    let mut buf = [0u8; 16];
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::EndOfStream);
    // Stays at end of stream
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::EndOfStream);
}

#[test]
fn test_blank_path_is_end_of_stream() {
    let factory = MemoryFactory::new();
    let source = BlockSource::with_factory(
        small_config(),
        Arc::new(ReplayPaths::new(["   "])),
        factory.clone(),
    )
    .unwrap();

    let mut buf = [0u8; 16];
    assert!(source.read(&mut buf).unwrap().is_end());
    assert!(factory.events().is_empty());
}

#[test]
fn test_end_of_stream_after_last_block() {
    let (_factory, _paths, source, expected) = setup_source(&[100]);

    let mut buf = [0u8; 100];
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(100));
    assert_eq!(&buf[..], &expected[..]);

    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::EndOfStream);
}

// =============================================================================
// Basic Reading Tests
// =============================================================================

#[test]
fn test_read_within_one_block() {
    let (_factory, paths, source, expected) = setup_source(&[1000]);

    let mut buf = [0u8; 10];
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(10));
    assert_eq!(&buf[..], &expected[..10]);
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(10));
    assert_eq!(&buf[..], &expected[10..20]);

    assert_eq!(paths.calls(), 1);
    assert_eq!(source.block_count(), 1);
}

#[test]
fn test_cross_block_read_in_one_call() {
    let (_factory, _paths, source, expected) = setup_source(&[1024, 1024, 512]);

    let mut buf = vec![0u8; 2560];
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(2560));
    assert_eq!(buf, expected);
    assert_eq!(source.block_count(), 3);

    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::EndOfStream);
}

#[test]
fn test_short_read_at_end_of_stream() {
    let (_factory, _paths, source, expected) = setup_source(&[300, 200]);

    let mut buf = vec![0u8; 1000];
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(500));
    assert_eq!(&buf[..500], &expected[..]);
}

#[test]
fn test_small_chunks_reassemble_stream() {
    let (_factory, _paths, source, expected) = setup_source(&[1024, 700, 1024, 3]);

    assert_eq!(read_all(&source, 37), expected);
}

#[test]
fn test_empty_block_is_skipped() {
    let (_factory, _paths, source, expected) = setup_source(&[200, 0, 200]);

    assert_eq!(read_all(&source, 64), expected);
    assert_eq!(source.block_count(), 3);
}

#[test]
fn test_rotate_skips_rest_of_block() {
    let (_factory, _paths, source, expected) = setup_source(&[100, 100]);

    let mut buf = [0u8; 10];
    source.read(&mut buf).unwrap();
    assert!(source.rotate().unwrap());

    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(10));
    assert_eq!(&buf[..], &expected[100..110]);

    // No third block
    assert!(!source.rotate().unwrap());
    assert_eq!(source.current_path(), Some(block_path(2)));
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_missing_block_is_an_error_not_end_of_stream() {
    let factory = MemoryFactory::new();
    let source = BlockSource::with_factory(
        small_config(),
        Arc::new(ReplayPaths::new([PathBuf::from("mem/missing")])),
        factory,
    )
    .unwrap();

    let mut buf = [0u8; 16];
    let err = source.read(&mut buf).unwrap_err();
    match err {
        BlockError::Channel { path, source } => {
            assert_eq!(path, PathBuf::from("mem/missing"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected Channel error, got {:?}", other),
    }
}

#[test]
fn test_failed_next_block_surfaces_error_on_cross_block_read() {
    let (factory, _paths, source, _) = setup_source(&[100, 100]);
    factory.fail_open(block_path(2));

    let mut buf = vec![0u8; 150];
    let err = source.read(&mut buf).unwrap_err();
    assert!(matches!(err, BlockError::PreOpen { .. }), "got {:?}", err);
}

#[test]
fn test_failed_block_is_retried_before_later_blocks() {
    let (factory, _paths, source, expected) = setup_source(&[100, 100, 100]);
    factory.fail_open(block_path(2));

    let mut buf = vec![0u8; 150];
    let err = source.read(&mut buf).unwrap_err();
    assert!(matches!(err, BlockError::PreOpen { .. }), "got {:?}", err);

    // Block 3 is never served in place of block 2
    let err = source.read(&mut buf).unwrap_err();
    match err {
        BlockError::Channel { path, .. } => assert_eq!(path, block_path(2)),
        other => panic!("expected Channel error, got {:?}", other),
    }

    factory.restore_open(block_path(2));
    let mut buf = vec![0u8; 100];
    assert_eq!(source.read(&mut buf).unwrap(), ReadStatus::Bytes(100));
    assert_eq!(&buf[..], &expected[100..200]);
    assert_eq!(source.current_path(), Some(block_path(2)));
}

// =============================================================================
// Pre-open Tests
// =============================================================================

#[test]
fn test_pre_open_dispatched_once_per_block() {
    let (factory, paths, source, _) = setup_source(&[1000, 1000]);

    // 95 reads of 10 bytes; the threshold is crossed around byte 800
    let mut buf = [0u8; 10];
    for _ in 0..95 {
        source.read(&mut buf).unwrap();
    }
    source.close();

    assert_eq!(paths.calls(), 2);
    assert_eq!(factory.count(|e| matches!(e, Event::Open(_))), 2);
    // Read-side blocks are never discarded
    assert_eq!(factory.count(|e| matches!(e, Event::Discard(_))), 0);
}

#[test]
fn test_pre_open_not_dispatched_far_from_end() {
    let (_factory, paths, source, _) = setup_source(&[1000, 1000]);

    let mut buf = [0u8; 100];
    source.read(&mut buf).unwrap();
    source.close();

    assert_eq!(paths.calls(), 1);
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_is_idempotent_and_rejects_reads() {
    let (factory, paths, source, _) = setup_source(&[100]);

    let mut buf = [0u8; 10];
    source.read(&mut buf).unwrap();
    source.close();
    source.close();

    let events = factory.events();
    let calls = paths.calls();

    assert!(source.is_closed());
    assert!(source.read(&mut buf).unwrap_err().is_closed());
    assert!(source.rotate().unwrap_err().is_closed());

    assert_eq!(factory.events(), events);
    assert_eq!(paths.calls(), calls);
    assert_eq!(factory.count(|e| *e == Event::Close(block_path(1))), 1);
}

#[test]
fn test_read_side_never_syncs() {
    let (factory, _paths, source, _) = setup_source(&[1024, 1024]);

    read_all(&source, 100);
    source.close();

    assert_eq!(factory.count(|e| matches!(e, Event::Sync(_))), 0);
}

// =============================================================================
// io::Read Tests
// =============================================================================

#[test]
fn test_io_read_to_end() {
    let (_factory, _paths, source, expected) = setup_source(&[1024, 1024, 17]);

    let mut out = Vec::new();
    (&source).read_to_end(&mut out).unwrap();

    assert_eq!(out, expected);
}

#[test]
fn test_config_is_normalized() {
    let factory = MemoryFactory::new();
    let config = EngineConfig::builder()
        .block_capacity(10)
        .pre_open_threshold(2.0)
        .build();
    let source = BlockSource::with_factory(
        config,
        Arc::new(CountingPaths::with_limit(0)),
        factory,
    )
    .unwrap();

    assert_eq!(source.config().block_capacity, blockroll::config::DEFAULT_BLOCK_CAPACITY);
    assert_eq!(source.config().pre_open_threshold, 0.2);
}
