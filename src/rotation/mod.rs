//! Rotation Module
//!
//! The engine shared by `BlockSink` and `BlockSource`.
//!
//! ## Responsibilities
//! - Lazily open the first block on the caller's thread
//! - Dispatch the pre-open of the next block once the active one crosses
//!   the threshold (at most once per block)
//! - Swap the pre-opened block in, waiting at most `pre_open_timeout`
//! - Retire the old block in the background
//! - Tear everything down exactly once on close
//!
//! ## Locking
//! ```text
//!   caller ──lock──▶ Shared { open, state, worker }
//!                        │            │
//!                        │      PreOpen / Close tasks (FIFO)
//!                        │            ▼
//!                        │     ┌──────────────┐
//!                        └─◀───│ worker thread│── PathSupplier ──▶ ChannelFactory
//!                 one-shot slot└──────────────┘
//! ```
//! The worker never touches `Shared`; it only fills the one-shot slot the
//! caller later consumes under the lock.

mod state;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam::channel::{RecvTimeoutError, TryRecvError};
use parking_lot::{Mutex, MutexGuard};

use crate::channel::{self, Channel, ChannelFactory, Mode};
use crate::config::EngineConfig;
use crate::error::{BlockError, Result};
use crate::supplier::PathSupplier;

use state::RotationState;
use worker::{
    close_block, drop_unused, open_next, open_path, Block, OpenFailure, PreOpenSlot, PreOpenWorker,
};

/// Rotation engine, parameterized over the channel type and I/O mode
pub(crate) struct Rotator<F: ChannelFactory> {
    mode: Mode,

    /// Normalized configuration
    config: EngineConfig,

    supplier: Arc<dyn PathSupplier>,
    factory: Arc<F>,

    /// Everything mutable, behind the single engine lock
    shared: Mutex<Shared<F::Channel>>,
}

struct Shared<C: Channel> {
    open: bool,

    /// `None` until the first I/O call, and again after close
    state: Option<RotationState<C>>,

    worker: PreOpenWorker<C>,

    /// Blocks opened over the engine's lifetime
    blocks_opened: u64,
}

impl<F: ChannelFactory> Rotator<F> {
    pub fn new(
        mode: Mode,
        config: EngineConfig,
        supplier: Arc<dyn PathSupplier>,
        factory: Arc<F>,
    ) -> Result<Self> {
        let config = config.normalized();
        let name = match mode {
            Mode::Write => "blockroll-sink",
            Mode::Read => "blockroll-source",
        };
        let worker = PreOpenWorker::spawn(name, mode, Arc::clone(&supplier), Arc::clone(&factory))?;

        Ok(Self {
            mode,
            config,
            supplier,
            factory,
            shared: Mutex::new(Shared {
                open: true,
                state: None,
                worker,
                blocks_opened: 0,
            }),
        })
    }

    /// Take the engine lock, failing fast once closed
    pub fn lock(&self) -> Result<Session<'_, F>> {
        let shared = self.shared.lock();
        if !shared.open {
            return Err(BlockError::Closed);
        }
        Ok(Session {
            rotator: self,
            shared,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.lock().open
    }

    pub fn blocks_opened(&self) -> u64 {
        self.shared.lock().blocks_opened
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        let shared = self.shared.lock();
        shared.state.as_ref().map(|state| state.active.path.clone())
    }

    /// Release every block and stop the worker; later calls are no-ops
    ///
    /// Best-effort: failures are logged, never returned.
    pub fn close(&self) {
        let mut shared = self.shared.lock();
        if !shared.open {
            return;
        }
        shared.open = false;

        let pending = match shared.state.take() {
            Some(state) => {
                tracing::debug!("closing active block {}", state.active.path.display());
                close_block(state.active, self.mode == Mode::Write);
                state.pending
            }
            None => None,
        };

        // Queued behind the pre-open that fills it, so even a detached
        // worker reclaims the block once its open completes
        let leftover = match pending {
            Some(slot) => shared.worker.release(slot).err(),
            None => None,
        };

        shared.worker.shutdown(self.config.shutdown_timeout());

        if let Some(slot) = leftover {
            if let Ok(Ok(Some(block))) = slot.try_recv() {
                drop_unused(block, self.mode, self.factory.as_ref());
            }
        }

        tracing::debug!(
            "{:?} engine closed after {} block(s)",
            self.mode,
            shared.blocks_opened
        );
    }
}

impl<F: ChannelFactory> Drop for Rotator<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The engine lock, held for the duration of one public operation
pub(crate) struct Session<'a, F: ChannelFactory> {
    rotator: &'a Rotator<F>,
    shared: MutexGuard<'a, Shared<F::Channel>>,
}

impl<'a, F: ChannelFactory> Session<'a, F> {
    pub fn capacity(&self) -> u64 {
        self.rotator.config.block_capacity
    }

    pub fn has_active(&self) -> bool {
        self.shared.state.is_some()
    }

    /// Open the first block synchronously if none is open yet
    ///
    /// Returns false when the supplier has no path to give.
    pub fn ensure_active(&mut self) -> Result<bool> {
        if self.shared.state.is_some() {
            return Ok(true);
        }

        let rotator = self.rotator;
        match open_next(rotator.mode, rotator.supplier.as_ref(), rotator.factory.as_ref()) {
            Ok(Some(block)) => {
                let state = RotationState::new(block, rotator.config.sync_period());
                self.shared.state = Some(state);
                self.shared.blocks_opened += 1;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(OpenFailure { path, source }) => Err(BlockError::channel(path, source)),
        }
    }

    /// The rotation state, opening the first block if needed
    fn state(&mut self) -> Result<&mut RotationState<F::Channel>> {
        if !self.ensure_active()? {
            return Err(BlockError::Exhausted);
        }
        self.shared.state.as_mut().ok_or(BlockError::Exhausted)
    }

    /// Bytes moved through the active block so far
    pub fn offset(&mut self) -> Result<u64> {
        Ok(self.state()?.offset)
    }

    /// Current on-disk length of the active block
    pub fn active_size(&mut self) -> Result<u64> {
        let state = self.state()?;
        state
            .active
            .channel
            .size()
            .map_err(|e| BlockError::channel(&state.active.path, e))
    }

    /// Dispatch the pre-open of the next block if `fraction_left` has
    /// reached the threshold and it hasn't been dispatched for this block
    pub fn pre_open_if_due(&mut self, fraction_left: f64) -> Result<()> {
        let threshold = self.rotator.config.pre_open_threshold;
        let shared = &mut *self.shared;
        let Some(state) = shared.state.as_mut() else {
            return Ok(());
        };
        if state.pre_open_triggered || fraction_left > threshold {
            return Ok(());
        }

        let slot = shared.worker.request_open()?;
        state.pending = Some(slot);
        state.pre_open_triggered = true;
        tracing::debug!(
            "pre-opening successor of {} ({:.3} of block left)",
            state.active.path.display(),
            fraction_left
        );
        Ok(())
    }

    /// Append to the active block without counting a write
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let state = self.state()?;
        channel::write_all(&mut state.active.channel, bytes)
            .map_err(|e| BlockError::channel(&state.active.path, e))?;
        state.offset += bytes.len() as u64;
        debug_assert_eq!(state.active.channel.position(), state.offset);
        Ok(())
    }

    /// True when the write in progress will end a sync period
    pub fn sync_due(&mut self) -> Result<bool> {
        Ok(self.state()?.sync_due())
    }

    /// Count one completed write, syncing when the period runs out or
    /// `force` is set
    pub fn finish_write(&mut self, force: bool) -> Result<()> {
        let period = self.rotator.config.sync_period();
        let state = self.state()?;
        if state.count_write() || force {
            state
                .active
                .channel
                .sync()
                .map_err(|e| BlockError::channel(&state.active.path, e))?;
            state.sync_countdown = period;
            tracing::trace!("synced block {} at offset {}", state.active.path.display(), state.offset);
        }
        Ok(())
    }

    /// Force a sync of the active block, if any
    pub fn sync(&mut self) -> Result<()> {
        let period = self.rotator.config.sync_period();
        if let Some(state) = self.shared.state.as_mut() {
            state
                .active
                .channel
                .sync()
                .map_err(|e| BlockError::channel(&state.active.path, e))?;
            state.sync_countdown = period;
        }
        Ok(())
    }

    /// Read from the active block until `buf` is full or the block ends
    pub fn read_active(&mut self, buf: &mut [u8]) -> Result<usize> {
        let state = self.state()?;
        let n = channel::read_up_to(&mut state.active.channel, buf)
            .map_err(|e| BlockError::channel(&state.active.path, e))?;
        state.offset += n as u64;
        debug_assert_eq!(state.active.channel.position(), state.offset);
        Ok(n)
    }

    /// Retire the active block and promote the next one
    ///
    /// A path whose earlier open failed is retried first. Otherwise the
    /// pre-opened block is used when one was dispatched, or the next path is
    /// opened synchronously. Returns false, leaving the active block in
    /// place, when the supplier is exhausted.
    pub fn rotate(&mut self) -> Result<bool> {
        let rotator = self.rotator;
        let state = self.state()?;
        let next = if let Some(path) = state.failed.take() {
            match open_path(rotator.mode, path, rotator.factory.as_ref()) {
                Ok(block) => Some(block),
                Err(OpenFailure { path, source }) => {
                    state.failed = Some(path.clone());
                    return Err(BlockError::channel(path, source));
                }
            }
        } else {
            match state.pending.take() {
                Some(slot) => self.await_pending(slot)?,
                None => {
                    open_next(rotator.mode, rotator.supplier.as_ref(), rotator.factory.as_ref())
                        .map_err(|OpenFailure { path, source }| BlockError::channel(path, source))?
                }
            }
        };

        let shared = &mut *self.shared;
        let Some(state) = shared.state.as_mut() else {
            return Err(BlockError::Closed);
        };

        let Some(next) = next else {
            state.pre_open_triggered = false;
            tracing::debug!("no block after {}", state.active.path.display());
            return Ok(false);
        };

        tracing::debug!(
            "rotating {} -> {} after {} bytes",
            state.active.path.display(),
            next.path.display(),
            state.offset
        );
        let retired = state.promote(next, rotator.config.sync_period());
        shared.worker.retire(retired, rotator.mode == Mode::Write);
        shared.blocks_opened += 1;
        Ok(true)
    }

    /// Wait for a pre-open to hand over its block
    ///
    /// On timeout the slot is put back, so a retry keeps waiting on the same
    /// block instead of skipping a path.
    fn await_pending(
        &mut self,
        slot: PreOpenSlot<F::Channel>,
    ) -> Result<Option<Block<F::Channel>>> {
        let timeout = self.rotator.config.pre_open_timeout();
        let outcome = match slot.try_recv() {
            Ok(outcome) => Ok(outcome),
            Err(TryRecvError::Empty) => slot.recv_timeout(timeout),
            Err(TryRecvError::Disconnected) => Err(RecvTimeoutError::Disconnected),
        };

        let state = self.state()?;
        match outcome {
            Ok(Ok(next)) => Ok(next),
            Ok(Err(OpenFailure { path, source })) => {
                // Keep the trigger set so no new path is drawn before the retry
                state.failed = Some(path.clone());
                tracing::warn!("pre-open of {} failed: {}", path.display(), source);
                Err(BlockError::PreOpen { path, source })
            }
            Err(RecvTimeoutError::Timeout) => {
                state.pending = Some(slot);
                tracing::warn!("next block not ready after {:?}", timeout);
                Err(BlockError::PreOpenTimeout { waited: timeout })
            }
            Err(RecvTimeoutError::Disconnected) => {
                state.pre_open_triggered = false;
                Err(BlockError::Worker(
                    "worker exited before handing over the next block".to_string(),
                ))
            }
        }
    }
}
