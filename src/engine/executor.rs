//! Dispatch loop and worker pool.
//!
//! The calling thread walks the plan and feeds a bounded channel; a fixed set
//! of scoped workers drains it. Dropping the sender is the only termination
//! signal: it is dropped when the plan is exhausted or the run is cancelled.
//! If every worker has exited, `send` fails instead of blocking forever.

use crossbeam::channel::{Receiver, Sender, bounded};
use std::path::PathBuf;
use std::thread;
use tracing::{debug, error, info, warn};

use super::control::{Checkpoint, RunControl};
use super::progress::{ProgressSink, ProgressStatus, ProgressTracker, display_name};
use super::Relocate;
use crate::errors::ClassifyError;
use crate::fs_ops::MoveOutcome;
use crate::planner::{MoveEntry, MovePlan};

// Upper bound on the automatic worker count.
const MAX_AUTO_WORKERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_settings(0, 0)
    }
}

impl EngineOptions {
    /// Build options from settings values; 0 means "pick automatically".
    pub fn from_settings(workers: usize, queue_capacity: usize) -> Self {
        let workers = if workers == 0 {
            let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
            (cpus * 2).min(MAX_AUTO_WORKERS)
        } else {
            workers
        };
        let queue_capacity = if queue_capacity == 0 {
            workers.saturating_mul(4)
        } else {
            queue_capacity
        };
        Self {
            workers,
            queue_capacity,
        }
    }
}

/// A file that could not be moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Moved, but the journal append failed; also counted in `moved`.
    pub unlogged: usize,
    pub cancelled: bool,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    /// Entries that were never attempted (cancellation).
    pub fn not_processed(&self) -> usize {
        self.total.saturating_sub(self.moved + self.skipped + self.failed)
    }

    fn absorb(&mut self, other: RunSummary) {
        self.moved += other.moved;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.unlogged += other.unlogged;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    options: EngineOptions,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let options = EngineOptions {
            workers: options.workers.max(1),
            queue_capacity: options.queue_capacity.max(1),
        };
        Self { options }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Run every entry of `plan` through `mover`.
    ///
    /// Per-file problems are counted in the summary; only engine-level failures
    /// (a worker that cannot start or panics) return an error.
    pub fn execute<M: Relocate>(
        &self,
        plan: &MovePlan,
        mover: &M,
        control: &RunControl,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, ClassifyError> {
        control.start();
        let total = plan.len();
        let workers = self.options.workers.min(total.max(1));
        info!(
            total,
            workers,
            queue_capacity = self.options.queue_capacity,
            "Executing plan"
        );

        let tracker = ProgressTracker::new(total, sink);
        let (tx, rx) = bounded::<&MoveEntry>(self.options.queue_capacity);

        let joined = thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            let mut spawn_error = None;
            for idx in 0..workers {
                let rx = rx.clone();
                let tracker = &tracker;
                let spawned = thread::Builder::new()
                    .name(format!("filesort-worker-{idx}"))
                    .spawn_scoped(s, move || worker_loop(rx, mover, control, tracker));
                match spawned {
                    Ok(h) => handles.push(h),
                    Err(e) => {
                        spawn_error = Some(e);
                        break;
                    }
                }
            }
            drop(rx);

            if spawn_error.is_none() {
                dispatch(plan.entries(), &tx, control);
            }
            drop(tx);

            let mut summary = RunSummary::default();
            let mut panicked = 0usize;
            for h in handles {
                match h.join() {
                    Ok(part) => summary.absorb(part),
                    Err(_) => panicked += 1,
                }
            }
            (summary, spawn_error, panicked)
        });

        let (mut summary, spawn_error, panicked) = joined;
        summary.total = total;
        summary.cancelled = control.is_cancelled();

        if let Some(e) = spawn_error {
            error!(error = %e, "could not start worker thread");
            control.finish(false);
            return Err(ClassifyError::Engine(format!("could not start worker thread: {e}")));
        }
        if panicked > 0 {
            error!(panicked, "worker thread panicked");
            control.finish(false);
            return Err(ClassifyError::Engine(format!("{panicked} worker thread(s) panicked")));
        }

        control.finish(true);
        info!(
            moved = summary.moved,
            skipped = summary.skipped,
            failed = summary.failed,
            unlogged = summary.unlogged,
            cancelled = summary.cancelled,
            "Plan finished"
        );
        Ok(summary)
    }
}

fn dispatch<'p>(entries: &'p [MoveEntry], tx: &Sender<&'p MoveEntry>, control: &RunControl) {
    for entry in entries {
        if control.checkpoint() == Checkpoint::Cancelled {
            debug!("dispatch stopped by cancellation");
            return;
        }
        // Blocks while the queue is full; fails once every worker has exited.
        if tx.send(entry).is_err() {
            debug!("no workers left to receive; dispatch stopped");
            return;
        }
    }
}

fn worker_loop<M: Relocate>(
    rx: Receiver<&MoveEntry>,
    mover: &M,
    control: &RunControl,
    tracker: &ProgressTracker<'_>,
) -> RunSummary {
    let mut tally = RunSummary::default();
    loop {
        if control.checkpoint() == Checkpoint::Cancelled {
            break;
        }
        let Ok(entry) = rx.recv() else {
            break;
        };
        // A pause requested while this worker waited on the queue still holds it here.
        if control.checkpoint() == Checkpoint::Cancelled {
            break;
        }

        let name = display_name(&entry.source);
        match mover.relocate(entry) {
            MoveOutcome::Moved(_) => {
                tally.moved += 1;
                tracker.record(name, ProgressStatus::Moved, None);
            }
            MoveOutcome::Unlogged(warning) => {
                tally.moved += 1;
                tally.unlogged += 1;
                tracker.record(name, ProgressStatus::Moved, Some(warning.to_string()));
            }
            MoveOutcome::Skipped(reason) => {
                tally.skipped += 1;
                tracker.record(name, ProgressStatus::Skipped, Some(reason.to_string()));
            }
            MoveOutcome::Failed(err) => {
                warn!(src = %entry.source.display(), error = %err, "entry failed");
                tally.failed += 1;
                let error = err.to_string();
                tally.failures.push(FileFailure {
                    path: entry.source.clone(),
                    error: error.clone(),
                });
                tracker.record(name, ProgressStatus::Error, Some(error));
            }
        }
    }
    tally
}
