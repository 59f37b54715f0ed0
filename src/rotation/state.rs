//! Rotation State
//!
//! The mutable record behind one engine. Only ever touched with the
//! engine lock held.

use std::path::PathBuf;

use crate::channel::Channel;

use super::worker::{Block, PreOpenSlot};

/// Active block plus the bookkeeping needed to rotate away from it
pub(crate) struct RotationState<C: Channel> {
    /// Block currently receiving (sink) or serving (source) data
    pub active: Block<C>,

    /// Bytes written to / read from `active` since it was opened
    pub offset: u64,

    /// Result slot of the in-flight or completed pre-open, if dispatched
    pub pending: Option<PreOpenSlot<C>>,

    /// Set from pre-open dispatch until a rotation consumes `pending`
    pub pre_open_triggered: bool,

    /// Writes left before the next forced sync
    pub sync_countdown: u32,

    /// Path the supplier already handed out whose open failed; the next
    /// rotation retries it before asking the supplier again
    pub failed: Option<PathBuf>,
}

impl<C: Channel> RotationState<C> {
    pub fn new(active: Block<C>, sync_period: u32) -> Self {
        Self {
            active,
            offset: 0,
            pending: None,
            pre_open_triggered: false,
            sync_countdown: sync_period,
            failed: None,
        }
    }

    /// Swap in a freshly opened block, returning the one it replaces
    pub fn promote(&mut self, next: Block<C>, sync_period: u32) -> Block<C> {
        let retired = std::mem::replace(&mut self.active, next);
        self.offset = 0;
        self.pending = None;
        self.pre_open_triggered = false;
        self.sync_countdown = sync_period;
        self.failed = None;
        retired
    }

    /// True when the next completed write ends a sync period
    pub fn sync_due(&self) -> bool {
        self.sync_countdown <= 1
    }

    /// Count one completed write; true when a sync is now due
    pub fn count_write(&mut self) -> bool {
        self.sync_countdown = self.sync_countdown.saturating_sub(1);
        self.sync_countdown == 0
    }
}
