//! Path Supplier Module
//!
//! Names successive block files. The engines never decide file names
//! themselves; they ask a `PathSupplier` each time a block is needed.
//!
//! ## Contract
//! - `next_path` may be called from the pre-open worker thread
//! - The engine never calls one supplier concurrently with itself
//! - `None`, an empty path, or a whitespace-only path all mean
//!   "no further blocks"

mod sequential;

use std::collections::VecDeque;
use std::path::PathBuf;

use parking_lot::Mutex;

pub use sequential::SequentialPaths;

/// Yields the path of the next block file on demand
pub trait PathSupplier: Send + Sync {
    fn next_path(&self) -> Option<PathBuf>;
}

impl<F> PathSupplier for F
where
    F: Fn() -> Option<PathBuf> + Send + Sync,
{
    fn next_path(&self) -> Option<PathBuf> {
        self()
    }
}

/// Ask the supplier for a path, treating blank paths as exhaustion
pub(crate) fn next_usable_path(supplier: &dyn PathSupplier) -> Option<PathBuf> {
    let path = supplier.next_path()?;
    let blank = match path.to_str() {
        Some(s) => s.trim().is_empty(),
        None => path.as_os_str().is_empty(),
    };
    if blank {
        None
    } else {
        Some(path)
    }
}

/// Replays a fixed list of paths in order, then reports exhaustion
///
/// Typically fed the paths a `BlockSink` wrote so a `BlockSource` can read
/// them back in rotation order.
#[derive(Debug, Default)]
pub struct ReplayPaths {
    paths: Mutex<VecDeque<PathBuf>>,
}

impl ReplayPaths {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: Mutex::new(paths.into_iter().map(Into::into).collect()),
        }
    }

    /// Paths not yet handed out
    pub fn remaining(&self) -> usize {
        self.paths.lock().len()
    }
}

impl PathSupplier for ReplayPaths {
    fn next_path(&self) -> Option<PathBuf> {
        self.paths.lock().pop_front()
    }
}
