//! Core library for `filesort`.
//!
//! Sorts the files of a source tree into `destination/<category>/<extension>/`
//! using an extension → category mapping. A run is planned first (dry runs
//! stop there), executed by a pausable, cancellable worker pool, and recorded
//! in a journal so the last run can be undone.
//!
//! Typical use:
//!
//! ```no_run
//! use filesort::{Classifier, DuplicatePolicy, EngineOptions, Mapping, NoProgress, RunControl};
//! use std::path::Path;
//! # fn main() -> Result<(), filesort::ClassifyError> {
//! let classifier = Classifier::new(Mapping::builtin()?, "/tmp/journal.jsonl", EngineOptions::default());
//! let run = classifier.prepare(Path::new("/data/inbox"), Path::new("/data/sorted"), DuplicatePolicy::AppendNumber)?;
//! let summary = classifier.execute(&run, &RunControl::new(), &NoProgress)?;
//! println!("moved {} files", summary.moved);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs_ops;
pub mod journal;
pub mod mapping;
pub mod output;
pub mod planner;
pub mod platform;
pub mod scanner;
pub mod undo;

pub use classify::{Classifier, PreparedRun};
pub use config::{Config, LogLevel, default_config_path, default_journal_path, default_log_path, path_has_symlink_ancestor};
pub use engine::{
    Engine, EngineOptions, NoProgress, OperationState, ProgressEvent, ProgressSink, ProgressStatus, RunControl,
    RunSummary,
};
pub use errors::{ClassifyError, LogInconsistency, MoveError};
pub use journal::{Journal, TransactionRecord};
pub use mapping::{Category, Mapping};
pub use planner::{DuplicatePolicy, MoveEntry, MovePlan, Planner};
pub use scanner::{FileDescriptor, scan};
pub use undo::{UndoManager, UndoReport};
