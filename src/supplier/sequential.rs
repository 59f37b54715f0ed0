//! Counter-based block naming
//!
//! "{dir}/{prefix}_{id:06}.{extension}", ids starting at 1.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::PathSupplier;

/// Names blocks `block_000001.blk`, `block_000002.blk`, ... in a directory
#[derive(Debug)]
pub struct SequentialPaths {
    /// Directory the blocks live in
    dir: PathBuf,

    prefix: String,
    extension: String,

    /// Next id to hand out
    next_id: AtomicU64,

    /// Paths handed out so far
    issued: AtomicU64,

    /// Stop after this many blocks
    limit: Option<u64>,

    /// Only yield paths that already exist (reading back)
    existing_only: bool,
}

impl SequentialPaths {
    pub const DEFAULT_PREFIX: &'static str = "block";
    pub const DEFAULT_EXTENSION: &'static str = "blk";

    /// Supplier for writing new blocks into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: Self::DEFAULT_PREFIX.to_string(),
            extension: Self::DEFAULT_EXTENSION.to_string(),
            next_id: AtomicU64::new(1),
            issued: AtomicU64::new(0),
            limit: None,
            existing_only: false,
        }
    }

    /// Supplier for reading back blocks from `dir`
    ///
    /// Reports exhaustion at the first id with no file on disk. The id is
    /// not consumed, so a later call picks the block up once it appears.
    pub fn existing(dir: impl Into<PathBuf>) -> Self {
        Self {
            existing_only: true,
            ..Self::new(dir)
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Hand out at most `count` paths
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Start numbering at `id` instead of 1
    pub fn starting_at(self, id: u64) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    /// Directory the blocks live in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a given block id
    pub fn path_for(&self, id: u64) -> PathBuf {
        self.dir
            .join(format!("{}_{:06}.{}", self.prefix, id, self.extension))
    }

    /// Parse the block id from a file name
    /// "block_000042.blk" → Some(42)
    pub fn parse_id(&self, path: &Path) -> Option<u64> {
        if path.extension()?.to_string_lossy() != self.extension {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        id_str.parse().ok()
    }

    /// Ids of matching block files already present in the directory, sorted
    pub fn discover(&self) -> std::io::Result<Vec<u64>> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                if let Some(id) = self.parse_id(&path) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl PathSupplier for SequentialPaths {
    fn next_path(&self) -> Option<PathBuf> {
        if let Some(limit) = self.limit {
            if self.issued.load(Ordering::SeqCst) >= limit {
                return None;
            }
        }

        let id = self.next_id.load(Ordering::SeqCst);

        let path = self.path_for(id);
        if self.existing_only && !path.is_file() {
            return None;
        }

        self.next_id.fetch_add(1, Ordering::SeqCst);
        self.issued.fetch_add(1, Ordering::SeqCst);
        Some(path)
    }
}
