//! Typed error definitions for filesort.
//! Fatal errors abort an operation before any file is touched; per-file errors
//! are recorded by the engine and the batch continues.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::journal::TransactionRecord;

/// Operation-level failures. Any of these aborts the whole command.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Invalid mapping {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("{role} directory is unusable: {path} ({reason})")]
    NotFound {
        role: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("No previous operation to undo (no journal at {0})")]
    NoLog(PathBuf),

    #[error("Journal {path} is unusable: {source}")]
    Journal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Another filesort operation is using the journal at {0}")]
    Busy(PathBuf),

    #[error("Engine failure: {0}")]
    Engine(String),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl ClassifyError {
    /// Stable numeric code for structured logs.
    pub fn code(&self) -> u16 {
        match self {
            ClassifyError::Config { .. } => 10,
            ClassifyError::NotFound { .. } => 11,
            ClassifyError::NoLog(_) => 12,
            ClassifyError::Journal { .. } => 13,
            ClassifyError::Busy(_) => 14,
            ClassifyError::Engine(_) => 15,
            ClassifyError::Interrupted => 16,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ClassifyError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(role: &'static str, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ClassifyError::NotFound {
            role,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn journal(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ClassifyError::Journal {
            path: path.into(),
            source,
        }
    }
}

/// A single entry could not be moved. Recorded, never fatal to the batch.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Source vanished before it could be moved: {0}")]
    SourceVanished(PathBuf),

    #[error("Permission denied on {path}: {context}")]
    PermissionDenied { path: PathBuf, context: String },

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Insufficient disk space for destination {dest}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        required: u64,
        available: u64,
        dest: PathBuf,
    },

    #[error("{0}")]
    Io(String),
}

impl MoveError {
    /// Entries that were deliberately left alone are reported as skipped, not failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, MoveError::DestinationExists(_))
    }
}

/// A move succeeded but its journal record could not be made durable.
/// Undo will not know about this file.
#[derive(Debug, Error)]
#[error("Moved {} -> {} but the journal append failed: {source}", .record.original_path.display(), .record.new_path.display())]
pub struct LogInconsistency {
    pub record: TransactionRecord,
    #[source]
    pub source: io::Error,
}
