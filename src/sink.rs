//! Block Sink
//!
//! Write half of the engine: one continuous append surface over a stream
//! of fixed-capacity block files.
//!
//! ## Write Path
//! 1. Take the engine lock (fail fast if closed)
//! 2. Open the first block synchronously on the very first write
//! 3. Pre-open the next block once the free fraction reaches the threshold
//! 4. Append if the payload fits; otherwise rotate and retry
//! 5. Sync every `sync_period` writes, including the blocks a split
//!    payload filled on the way
//!
//! Payloads that fit in one block are never split across blocks. A
//! payload larger than a whole block fills blocks front to back.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::channel::{ChannelFactory, FileChannelFactory, Mode};
use crate::config::EngineConfig;
use crate::error::{BlockError, Result};
use crate::rotation::Rotator;
use crate::supplier::PathSupplier;

/// Appends bytes across rotating block files
///
/// Safe to share between threads; every operation runs under one lock.
pub struct BlockSink<F: ChannelFactory = FileChannelFactory> {
    rotator: Rotator<F>,
}

impl BlockSink<FileChannelFactory> {
    /// Create a sink writing plain files named by `supplier`
    ///
    /// No block is opened until the first write.
    pub fn new(config: EngineConfig, supplier: impl PathSupplier + 'static) -> Result<Self> {
        Self::with_factory(config, Arc::new(supplier), FileChannelFactory)
    }
}

impl<F: ChannelFactory> BlockSink<F> {
    /// Create a sink over a custom channel factory
    pub fn with_factory(
        config: EngineConfig,
        supplier: Arc<dyn PathSupplier>,
        factory: F,
    ) -> Result<Self> {
        let rotator = Rotator::new(Mode::Write, config, supplier, Arc::new(factory))?;
        Ok(Self { rotator })
    }

    /// Append `bytes` to the stream, rotating blocks as needed
    ///
    /// Returns the number of bytes written, always `bytes.len()` on success.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut session = self.rotator.lock()?;
        if bytes.is_empty() {
            return Ok(0);
        }

        if !session.ensure_active()? {
            return Err(BlockError::Exhausted);
        }
        // Decided once, so every block this write touches is synced alike
        let sync_due = session.sync_due()?;

        let capacity = session.capacity();
        let mut rest = bytes;
        loop {
            if !session.ensure_active()? {
                return Err(BlockError::Exhausted);
            }

            let remaining = capacity - session.offset()?;
            session.pre_open_if_due(remaining as f64 / capacity as f64)?;

            let len = rest.len() as u64;
            if len <= remaining {
                session.append(rest)?;
                break;
            }

            // Only payloads bigger than a whole block are split
            if len > capacity && remaining > 0 {
                let (head, tail) = rest.split_at(remaining as usize);
                session.append(head)?;
                rest = tail;
                // The retired block's close runs in the background
                if sync_due {
                    session.sync()?;
                }
            }

            if !session.rotate()? {
                return Err(BlockError::Exhausted);
            }
        }

        session.finish_write(sync_due)?;
        Ok(bytes.len())
    }

    /// Retire the active block now, even if it has room left
    ///
    /// Before the first write there is nothing to retire and this is a
    /// no-op.
    pub fn rotate(&self) -> Result<()> {
        let mut session = self.rotator.lock()?;
        if !session.has_active() {
            return Ok(());
        }
        if session.rotate()? {
            Ok(())
        } else {
            Err(BlockError::Exhausted)
        }
    }

    /// Force a durability sync of the active block
    pub fn sync(&self) -> Result<()> {
        self.rotator.lock()?.sync()
    }

    /// Sync and release every block and stop the background worker
    ///
    /// Idempotent; later writes fail with `BlockError::Closed`.
    pub fn close(&self) {
        self.rotator.close();
    }

    pub fn is_closed(&self) -> bool {
        self.rotator.is_closed()
    }

    /// Blocks opened so far, including the active one
    pub fn block_count(&self) -> u64 {
        self.rotator.blocks_opened()
    }

    /// Path of the block currently being written
    pub fn current_path(&self) -> Option<PathBuf> {
        self.rotator.current_path()
    }

    /// Effective (normalized) configuration
    pub fn config(&self) -> &EngineConfig {
        self.rotator.config()
    }
}

impl<F: ChannelFactory> io::Write for &BlockSink<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BlockSink::<F>::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        BlockSink::<F>::sync(self).map_err(io::Error::from)
    }
}

impl<F: ChannelFactory> io::Write for BlockSink<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BlockSink::<F>::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        BlockSink::<F>::sync(self).map_err(io::Error::from)
    }
}
