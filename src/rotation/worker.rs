//! Pre-open Worker
//!
//! One background thread per engine that opens the next block ahead of
//! need and closes retired blocks off the caller's thread.
//!
//! All tasks share a single FIFO queue, so a close dispatched at
//! rotation time is never reordered against the pre-open for the block
//! after it.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::channel::{Channel, ChannelFactory, Mode};
use crate::error::{BlockError, Result};
use crate::supplier::{self, PathSupplier};

/// Depth of the task queue; at most one pre-open plus the closes of recent
/// rotations are ever queued
const TASK_QUEUE_DEPTH: usize = 32;

/// An opened block file and the path it came from
pub(crate) struct Block<C> {
    pub path: PathBuf,
    pub channel: C,
}

/// A block path the factory failed to open
#[derive(Debug)]
pub(crate) struct OpenFailure {
    pub path: PathBuf,
    pub source: io::Error,
}

/// Outcome of an open: a block, exhaustion (`None`), or the open failure
pub(crate) type PreOpenOutcome<C> = std::result::Result<Option<Block<C>>, OpenFailure>;

/// One-shot handoff slot for a single pre-open result
pub(crate) type PreOpenSlot<C> = Receiver<PreOpenOutcome<C>>;

enum Task<C> {
    /// Ask the supplier for the next path and open it
    PreOpen { reply: Sender<PreOpenOutcome<C>> },

    /// Retire a block, syncing it first when it was written to
    Close { block: Block<C>, sync: bool },

    /// Reclaim whatever an earlier pre-open left in a slot nobody will read
    Release { slot: PreOpenSlot<C> },
}

/// Handle on the background worker thread
pub(crate) struct PreOpenWorker<C: Channel> {
    /// `None` after shutdown; dropping it lets the worker drain and exit
    tasks: Option<Sender<Task<C>>>,

    /// Disconnects when the worker thread exits
    exited: Receiver<()>,

    handle: Option<JoinHandle<()>>,
}

impl<C: Channel> PreOpenWorker<C> {
    /// Spawn the worker thread
    pub fn spawn<F>(
        name: &str,
        mode: Mode,
        supplier: Arc<dyn PathSupplier>,
        factory: Arc<F>,
    ) -> Result<Self>
    where
        F: ChannelFactory<Channel = C>,
    {
        let (task_tx, task_rx) = channel::bounded::<Task<C>>(TASK_QUEUE_DEPTH);
        let (exited_tx, exited_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Held until the loop ends so the receiver sees a disconnect
                let _exited = exited_tx;

                for task in task_rx.iter() {
                    match task {
                        Task::PreOpen { reply } => {
                            let outcome = open_next(mode, supplier.as_ref(), factory.as_ref());
                            if let Err(unclaimed) = reply.send(outcome) {
                                // The engine stopped waiting; don't leak the handle
                                if let Ok(Some(block)) = unclaimed.into_inner() {
                                    tracing::debug!(
                                        "closing unclaimed pre-opened block {}",
                                        block.path.display()
                                    );
                                    drop_unused(block, mode, factory.as_ref());
                                }
                            }
                        }
                        Task::Close { block, sync } => close_block(block, sync),
                        Task::Release { slot } => {
                            // FIFO: the pre-open that fills this slot already ran
                            if let Ok(Ok(Some(block))) = slot.try_recv() {
                                drop_unused(block, mode, factory.as_ref());
                            }
                        }
                    }
                }

                tracing::trace!("pre-open worker drained");
            })
            .map_err(|e| BlockError::Worker(format!("failed to spawn {}: {}", name, e)))?;

        Ok(Self {
            tasks: Some(task_tx),
            exited: exited_rx,
            handle: Some(handle),
        })
    }

    /// Dispatch an asynchronous open of the next block
    ///
    /// Returns the one-shot slot the result will arrive on.
    pub fn request_open(&self) -> Result<PreOpenSlot<C>> {
        let tasks = self.tasks.as_ref().ok_or(BlockError::Closed)?;
        let (reply_tx, reply_rx) = channel::bounded(1);

        tasks
            .send(Task::PreOpen { reply: reply_tx })
            .map_err(|_| BlockError::Worker("pre-open worker has exited".to_string()))?;

        Ok(reply_rx)
    }

    /// Close a block in the background (fire-and-forget)
    ///
    /// Falls back to closing inline if the queue is full or gone.
    pub fn retire(&self, block: Block<C>, sync: bool) {
        let Some(tasks) = self.tasks.as_ref() else {
            close_block(block, sync);
            return;
        };

        if let Err(rejected) = tasks.try_send(Task::Close { block, sync }) {
            if let Task::Close { block, sync } = rejected.into_inner() {
                close_block(block, sync);
            }
        }
    }

    /// Hand an unconsumed pre-open slot back to the worker for cleanup
    ///
    /// The release is queued behind the pre-open that fills the slot, so the
    /// block is reclaimed even when that open is still running. Returns the
    /// slot if the worker can no longer take it.
    pub fn release(&self, slot: PreOpenSlot<C>) -> std::result::Result<(), PreOpenSlot<C>> {
        let Some(tasks) = self.tasks.as_ref() else {
            return Err(slot);
        };

        if let Err(rejected) = tasks.try_send(Task::Release { slot }) {
            if let Task::Release { slot } = rejected.into_inner() {
                return Err(slot);
            }
        }
        Ok(())
    }

    /// Stop accepting tasks, let queued ones finish, and join the thread
    ///
    /// Waits at most `timeout`; a worker still busy after that is detached
    /// and cleans up after itself.
    pub fn shutdown(&mut self, timeout: Duration) {
        let Some(tasks) = self.tasks.take() else {
            return;
        };
        drop(tasks);

        match self.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "pre-open worker did not drain within {:?}, detaching it",
                    timeout
                );
                self.handle.take();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::warn!("pre-open worker panicked");
                    }
                }
            }
        }
    }
}

impl<C: Channel> Drop for PreOpenWorker<C> {
    fn drop(&mut self) {
        // Detach rather than block in drop; queued closes still run
        self.tasks.take();
    }
}

/// Open the block for the supplier's next path
///
/// Shared by the worker and the synchronous first-open path.
pub(crate) fn open_next<F: ChannelFactory>(
    mode: Mode,
    supplier: &dyn PathSupplier,
    factory: &F,
) -> PreOpenOutcome<F::Channel> {
    match supplier::next_usable_path(supplier) {
        Some(path) => open_path(mode, path, factory).map(Some),
        None => Ok(None),
    }
}

/// Open the block at a known path, typically one whose earlier open failed
pub(crate) fn open_path<F: ChannelFactory>(
    mode: Mode,
    path: PathBuf,
    factory: &F,
) -> std::result::Result<Block<F::Channel>, OpenFailure> {
    let channel = match factory.open(&path, mode) {
        Ok(channel) => channel,
        Err(source) => return Err(OpenFailure { path, source }),
    };
    tracing::debug!("opened block {} ({:?})", path.display(), mode);

    Ok(Block { path, channel })
}

/// Best-effort close; failures are logged and swallowed
pub(crate) fn close_block<C: Channel>(mut block: Block<C>, sync: bool) {
    if sync && block.channel.is_open() {
        if let Err(e) = block.channel.sync() {
            tracing::warn!("failed to sync block {} before close: {}", block.path.display(), e);
        }
    }
    if let Err(e) = block.channel.close() {
        tracing::warn!("failed to close block {}: {}", block.path.display(), e);
    } else {
        tracing::trace!("closed block {}", block.path.display());
    }
}

/// Close a pre-opened block nobody claimed; unused write blocks are removed
pub(crate) fn drop_unused<F: ChannelFactory>(block: Block<F::Channel>, mode: Mode, factory: &F) {
    let path = block.path.clone();
    close_block(block, false);
    if mode == Mode::Write {
        if let Err(e) = factory.discard(&path) {
            tracing::warn!("failed to discard unused block {}: {}", path.display(), e);
        }
    }
}
