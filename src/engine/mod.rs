//! Execution engine: runs a [`MovePlan`](crate::planner::MovePlan) with a
//! bounded producer/consumer pipeline that can be paused, resumed and cancelled.

mod control;
mod executor;
mod progress;

pub use control::{Checkpoint, OperationState, RunControl};
pub use executor::{Engine, EngineOptions, FileFailure, RunSummary};
pub use progress::{NoProgress, ProgressEvent, ProgressSink, ProgressStatus};
pub(crate) use progress::{ProgressTracker, display_name, percent};

use crate::fs_ops::{MoveOutcome, Mover};
use crate::planner::MoveEntry;

/// Performs one planned move. Implemented by the journaled [`Mover`].
pub trait Relocate: Sync {
    fn relocate(&self, entry: &MoveEntry) -> MoveOutcome;
}

impl Relocate for Mover<'_> {
    fn relocate(&self, entry: &MoveEntry) -> MoveOutcome {
        Mover::relocate(self, entry)
    }
}
