//! Error types for blockroll
//!
//! Provides a unified error type for sink and source operations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using BlockError
pub type Result<T> = std::result::Result<T, BlockError>;

/// Unified error type for blockroll operations
#[derive(Debug, Error)]
pub enum BlockError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("block stream is closed")]
    Closed,

    #[error("path supplier has no further blocks")]
    Exhausted,

    // -------------------------------------------------------------------------
    // Rotation Errors
    // -------------------------------------------------------------------------
    #[error("timed out after {waited:?} waiting for the next block to open")]
    PreOpenTimeout { waited: Duration },

    #[error("background open of block {path:?} failed: {source}")]
    PreOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pre-open worker error: {0}")]
    Worker(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("I/O error on block {path:?}: {source}")]
    Channel {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BlockError {
    /// Wrap a channel failure with the block path it happened on
    pub(crate) fn channel(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BlockError::Channel {
            path: path.into(),
            source,
        }
    }

    /// True for errors produced by `close()` having been called
    pub fn is_closed(&self) -> bool {
        matches!(self, BlockError::Closed)
    }
}

impl From<BlockError> for io::Error {
    fn from(err: BlockError) -> Self {
        let kind = match &err {
            BlockError::Closed => io::ErrorKind::BrokenPipe,
            BlockError::Exhausted => io::ErrorKind::WriteZero,
            BlockError::PreOpenTimeout { .. } => io::ErrorKind::TimedOut,
            BlockError::Channel { source, .. } => source.kind(),
            BlockError::PreOpen { source, .. } => source.kind(),
            BlockError::Io(source) => source.kind(),
            BlockError::Worker(_) => io::ErrorKind::Other,
            BlockError::Config(_) => io::ErrorKind::InvalidInput,
        };
        match err {
            BlockError::Io(source) => source,
            other => io::Error::new(kind, other),
        }
    }
}
