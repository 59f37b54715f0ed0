//! # blockroll
//!
//! Sequential disk I/O over an unbounded stream of fixed-capacity block
//! files, with:
//! - One continuous write surface (`BlockSink`) and read surface (`BlockSource`)
//! - Background pre-open of the next block so rotation doesn't stall callers
//! - Configurable fsync period
//! - Bounded waits everywhere a caller can block
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                BlockSink / BlockSource                       │
//! │              (one lock per engine instance)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Rotator                                  │
//! │     RotationState { active, offset, pending, countdown }     │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ write / read / sync              │ PreOpen, Close
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ Channel (active)│                │  PreOpenWorker  │
//!   └─────────────────┘                │ (single thread) │
//!                                      └────────┬────────┘
//!                                               │
//!                                  PathSupplier → ChannelFactory
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use blockroll::{BlockSink, BlockSource, EngineConfig, SequentialPaths};
//!
//! # fn main() -> blockroll::Result<()> {
//! let config = EngineConfig::builder().block_capacity(64 * 1024).build();
//!
//! let sink = BlockSink::new(config.clone(), SequentialPaths::new("/tmp/blocks"))?;
//! sink.write(b"hello, blocks")?;
//! sink.close();
//!
//! let source = BlockSource::new(config, SequentialPaths::existing("/tmp/blocks"))?;
//! let mut buf = [0u8; 13];
//! source.read(&mut buf)?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod channel;
pub mod supplier;
mod rotation;
pub mod sink;
pub mod source;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BlockError, Result};
pub use config::{EngineConfig, SyncStrategy};
pub use channel::{Channel, ChannelFactory, FileChannel, FileChannelFactory, Mode};
pub use supplier::{PathSupplier, ReplayPaths, SequentialPaths};
pub use sink::BlockSink;
pub use source::{BlockSource, ReadStatus};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blockroll
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
