//! Channel Module
//!
//! The I/O primitive a block file is accessed through.
//!
//! ## Responsibilities
//! - Sequential write/read against one block file
//! - Explicit durability sync
//! - Idempotent close
//!
//! The engines are generic over [`ChannelFactory`], so tests can swap in
//! fault-injecting channels without touching the rotation logic.

mod file;

use std::io;
use std::path::Path;

pub use file::{FileChannel, FileChannelFactory};

/// Whether an engine is producing or consuming block files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Blocks are created (or truncated) and appended to
    Write,

    /// Existing blocks are opened read-only
    Read,
}

/// An open, durable-capable handle on one block file
///
/// Channels are owned exclusively by an engine (or, while being opened or
/// retired, by its pre-open worker) and never shared.
pub trait Channel: Send + 'static {
    /// Write bytes at the current position, returning how many were written
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read into `buf` from the current position; `Ok(0)` means end of file
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Force written bytes to stable storage
    fn sync(&mut self) -> io::Result<()>;

    /// Release the underlying handle; closing twice is a no-op
    fn close(&mut self) -> io::Result<()>;

    fn is_open(&self) -> bool;

    /// Current length of the block file in bytes
    fn size(&self) -> io::Result<u64>;

    /// Byte offset of the next read or write
    ///
    /// Must equal the bytes moved since open; debug builds check it
    /// against the engine's own offset after every transfer.
    fn position(&self) -> u64;
}

/// Opens channels for paths produced by a `PathSupplier`
///
/// Called from the caller's thread for the first block and from the
/// pre-open worker for every block after that.
pub trait ChannelFactory: Send + Sync + 'static {
    type Channel: Channel;

    fn open(&self, path: &Path, mode: Mode) -> io::Result<Self::Channel>;

    /// Remove a write block that was pre-opened but never written to
    fn discard(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Write the whole buffer, looping over short writes
pub(crate) fn write_all<C: Channel>(channel: &mut C, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match channel.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "channel accepted zero bytes",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Fill as much of `buf` as the channel can supply before end of file
pub(crate) fn read_up_to<C: Channel>(channel: &mut C, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match channel.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
