//! Block Source
//!
//! Read half of the engine: one continuous read surface over the block
//! files a supplier names, in order.
//!
//! A read that runs off the end of a block keeps filling the caller's
//! buffer from the next one. The supplier running out of paths is the
//! normal end of the stream, reported as [`ReadStatus::EndOfStream`];
//! only real I/O failures come back as errors.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::channel::{ChannelFactory, FileChannelFactory, Mode};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::rotation::Rotator;
use crate::supplier::PathSupplier;

/// Result of a successful `BlockSource::read`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were copied into the buffer (possibly fewer than
    /// requested when the last block ends)
    Bytes(usize),

    /// Nothing was read and the supplier has no further blocks
    EndOfStream,
}

impl ReadStatus {
    /// Bytes read, treating end of stream as zero
    pub fn bytes(self) -> usize {
        match self {
            ReadStatus::Bytes(n) => n,
            ReadStatus::EndOfStream => 0,
        }
    }

    pub fn is_end(self) -> bool {
        self == ReadStatus::EndOfStream
    }
}

/// Reads bytes across rotating block files
pub struct BlockSource<F: ChannelFactory = FileChannelFactory> {
    rotator: Rotator<F>,
}

impl BlockSource<FileChannelFactory> {
    /// Create a source over plain files named by `supplier`
    pub fn new(config: EngineConfig, supplier: impl PathSupplier + 'static) -> Result<Self> {
        Self::with_factory(config, Arc::new(supplier), FileChannelFactory)
    }
}

impl<F: ChannelFactory> BlockSource<F> {
    /// Create a source over a custom channel factory
    pub fn with_factory(
        config: EngineConfig,
        supplier: Arc<dyn PathSupplier>,
        factory: F,
    ) -> Result<Self> {
        let rotator = Rotator::new(Mode::Read, config, supplier, Arc::new(factory))?;
        Ok(Self { rotator })
    }

    /// Fill `buf` from the stream, crossing block boundaries as needed
    ///
    /// Any read failure is returned as an error, even if bytes were already
    /// copied from an earlier block.
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadStatus> {
        let mut session = self.rotator.lock()?;
        if !session.ensure_active()? {
            return Ok(ReadStatus::EndOfStream);
        }
        if buf.is_empty() {
            return Ok(ReadStatus::Bytes(0));
        }

        let mut filled = 0;
        loop {
            let size = session.active_size()?;
            let remaining = size.saturating_sub(session.offset()?);
            let wanted = (buf.len() - filled) as u64;

            // Fraction of the block still unread once this request is served
            let left_after = remaining.saturating_sub(wanted);
            let fraction_left = if size == 0 {
                0.0
            } else {
                left_after as f64 / size as f64
            };
            session.pre_open_if_due(fraction_left)?;

            if remaining >= wanted {
                filled += session.read_active(&mut buf[filled..])?;
                break;
            }

            if remaining > 0 {
                let end = filled + remaining as usize;
                filled += session.read_active(&mut buf[filled..end])?;
            }

            if !session.rotate()? {
                break;
            }
        }

        if filled == 0 {
            Ok(ReadStatus::EndOfStream)
        } else {
            Ok(ReadStatus::Bytes(filled))
        }
    }

    /// Skip the rest of the active block and move to the next one
    ///
    /// Returns false when there is no next block. Before the first read
    /// there is nothing to skip and this returns true without I/O.
    pub fn rotate(&self) -> Result<bool> {
        let mut session = self.rotator.lock()?;
        if !session.has_active() {
            return Ok(true);
        }
        session.rotate()
    }

    /// Release every block and stop the background worker
    ///
    /// Idempotent; later reads fail with `BlockError::Closed`.
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

    /// Path of the block currently being read
    pub fn current_path(&self) -> Option<PathBuf> {
        self.rotator.current_path()
    }

    /// Effective (normalized) configuration
    pub fn config(&self) -> &EngineConfig {
        self.rotator.config()
    }
}

impl<F: ChannelFactory> io::Read for &BlockSource<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BlockSource::<F>::read(self, buf)
            .map(ReadStatus::bytes)
            .map_err(io::Error::from)
    }
}

impl<F: ChannelFactory> io::Read for BlockSource<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BlockSource::<F>::read(self, buf)
            .map(ReadStatus::bytes)
            .map_err(io::Error::from)
    }
}
