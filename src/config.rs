//! Configuration for blockroll engines
//!
//! Every knob here is a tuning knob: invalid values never fail
//! construction, they fall back to the documented default with a warning.

use std::time::Duration;

/// Smallest block capacity accepted (bytes)
pub const MIN_BLOCK_CAPACITY: u64 = 1024;

/// Default block capacity (8 MiB)
pub const DEFAULT_BLOCK_CAPACITY: u64 = 8 * 1024 * 1024;

/// Default fraction of a block left when the next block is pre-opened
pub const DEFAULT_PRE_OPEN_THRESHOLD: f64 = 0.2;

/// Default bound on waiting for a pre-opened block (milliseconds)
pub const DEFAULT_PRE_OPEN_TIMEOUT_MS: u64 = 5000;

/// Default bound on waiting for the worker to drain at close (milliseconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Configuration shared by `BlockSink` and `BlockSource`
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // -------------------------------------------------------------------------
    // Block Configuration
    // -------------------------------------------------------------------------
    /// Maximum bytes written to a single block file
    pub block_capacity: u64,

    /// Fraction of the block still free (sink) or unread (source) at which
    /// the next block is opened in the background
    pub pre_open_threshold: f64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the active block
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// How long a rotation waits for the pre-opened block (milliseconds)
    pub pre_open_timeout_ms: u64,

    /// How long `close()` waits for the background worker to drain (milliseconds)
    pub shutdown_timeout_ms: u64,
}

/// Block sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after every N writes; a crash may lose up to N-1 writes
    EveryNWrites { count: u32 },
}

impl SyncStrategy {
    /// Number of writes between forced syncs
    pub fn period(&self) -> u32 {
        match *self {
            SyncStrategy::EveryWrite => 1,
            SyncStrategy::EveryNWrites { count } => count.max(1),
        }
    }
}

impl Default for SyncStrategy {
    fn default() -> Self {
        SyncStrategy::EveryWrite
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            pre_open_threshold: DEFAULT_PRE_OPEN_THRESHOLD,
            sync_strategy: SyncStrategy::EveryWrite,
            pre_open_timeout_ms: DEFAULT_PRE_OPEN_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Replace every out-of-range value with its default
    ///
    /// Each replacement is logged at warn level with the rejected value.
    pub fn normalized(mut self) -> Self {
        if self.block_capacity < MIN_BLOCK_CAPACITY {
            tracing::warn!(
                "block_capacity {} is below the minimum of {}, using default {}",
                self.block_capacity,
                MIN_BLOCK_CAPACITY,
                DEFAULT_BLOCK_CAPACITY
            );
            self.block_capacity = DEFAULT_BLOCK_CAPACITY;
        }

        // NaN fails both comparisons and falls back too
        if !(self.pre_open_threshold > 0.0 && self.pre_open_threshold < 1.0) {
            tracing::warn!(
                "pre_open_threshold {} is outside (0, 1), using default {}",
                self.pre_open_threshold,
                DEFAULT_PRE_OPEN_THRESHOLD
            );
            self.pre_open_threshold = DEFAULT_PRE_OPEN_THRESHOLD;
        }

        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            tracing::warn!("sync period of 0 writes is invalid, syncing after every write");
            self.sync_strategy = SyncStrategy::EveryWrite;
        }

        if self.pre_open_timeout_ms == 0 {
            tracing::warn!(
                "pre_open_timeout_ms of 0 is invalid, using default {}",
                DEFAULT_PRE_OPEN_TIMEOUT_MS
            );
            self.pre_open_timeout_ms = DEFAULT_PRE_OPEN_TIMEOUT_MS;
        }

        if self.shutdown_timeout_ms == 0 {
            tracing::warn!(
                "shutdown_timeout_ms of 0 is invalid, using default {}",
                DEFAULT_SHUTDOWN_TIMEOUT_MS
            );
            self.shutdown_timeout_ms = DEFAULT_SHUTDOWN_TIMEOUT_MS;
        }

        self
    }

    /// Number of writes between forced syncs
    pub fn sync_period(&self) -> u32 {
        self.sync_strategy.period()
    }

    pub fn pre_open_timeout(&self) -> Duration {
        Duration::from_millis(self.pre_open_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Builder for EngineConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    /// Set the block capacity (in bytes)
    pub fn block_capacity(mut self, bytes: u64) -> Self {
        self.config.block_capacity = bytes;
        self
    }

    /// Set the pre-open threshold (fraction of the block)
    pub fn pre_open_threshold(mut self, fraction: f64) -> Self {
        self.config.pre_open_threshold = fraction;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Sync after every `count` writes
    pub fn sync_every(mut self, count: u32) -> Self {
        self.config.sync_strategy = if count == 1 {
            SyncStrategy::EveryWrite
        } else {
            SyncStrategy::EveryNWrites { count }
        };
        self
    }

    /// Set the pre-open handoff timeout (in milliseconds)
    pub fn pre_open_timeout_ms(mut self, ms: u64) -> Self {
        self.config.pre_open_timeout_ms = ms;
        self
    }

    /// Set the shutdown drain timeout (in milliseconds)
    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_timeout_ms = ms;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
