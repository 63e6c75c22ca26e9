//! Undo of the last real run.
//!
//! Replays the journal newest-first, moving every file back to where it came
//! from. Undo is best-effort: a record that cannot be restored is reported
//! and the rest continue. The journal is deleted afterwards, so a second undo
//! reports that there is nothing to undo.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::engine::{Checkpoint, FileFailure, ProgressSink, ProgressStatus, ProgressTracker, RunControl, display_name};
use crate::errors::{ClassifyError, MoveError};
use crate::fs_ops::relocate_file;
use crate::journal::{self, Journal, TransactionRecord};
use crate::planner::next_free_name;

/// Result of an undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoReport {
    pub total: usize,
    pub restored: usize,
    pub failed: usize,
    /// Restored under a numbered name because the original path was occupied.
    pub renamed: usize,
    pub cancelled: bool,
    pub failures: Vec<FileFailure>,
}

pub struct UndoManager {
    journal_path: PathBuf,
}

impl UndoManager {
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: journal_path.into(),
        }
    }

    /// Whether there is a journal to undo.
    pub fn has_log(&self) -> bool {
        self.journal_path.is_file()
    }

    pub fn undo(&self, control: &RunControl, sink: &dyn ProgressSink) -> Result<UndoReport, ClassifyError> {
        let path = &self.journal_path;
        let _lock = journal::lock(path)?;
        let contents = Journal::read(path)?;
        let records = contents.records;

        control.start();
        info!(records = records.len(), journal = %path.display(), "Undoing last operation");

        let tracker = ProgressTracker::new(records.len(), sink);
        let mut report = UndoReport {
            total: records.len(),
            ..UndoReport::default()
        };
        let mut touched_dirs: BTreeSet<PathBuf> = BTreeSet::new();

        for (idx, record) in records.iter().enumerate().rev() {
            if control.checkpoint() == Checkpoint::Cancelled {
                // Keep what is still to be undone, in original order.
                report.cancelled = true;
                if let Err(e) = Journal::rewrite(path, contents.header.as_ref(), &records[..=idx]) {
                    control.finish(false);
                    return Err(e);
                }
                info!(remaining = idx + 1, "Undo cancelled; journal keeps the remaining records");
                break;
            }

            let name = display_name(&record.new_path);
            match restore(record) {
                Ok(renamed) => {
                    report.restored += 1;
                    if renamed {
                        report.renamed += 1;
                    }
                    if let Some(parent) = record.new_path.parent() {
                        touched_dirs.insert(parent.to_path_buf());
                    }
                    tracker.record(name, ProgressStatus::Undone, None);
                }
                Err(e) => {
                    warn!(path = %record.new_path.display(), error = %e, "could not restore file");
                    report.failed += 1;
                    let error = e.to_string();
                    report.failures.push(FileFailure {
                        path: record.new_path.clone(),
                        error: error.clone(),
                    });
                    tracker.record(name, ProgressStatus::Error, Some(error));
                }
            }
        }

        if let Some(header) = &contents.header {
            prune_empty_dirs(&touched_dirs, &header.destination_root);
        }

        if !report.cancelled {
            if let Err(e) = Journal::clear(path) {
                control.finish(false);
                return Err(e);
            }
        }
        control.finish(true);

        info!(
            restored = report.restored,
            renamed = report.renamed,
            failed = report.failed,
            cancelled = report.cancelled,
            "Undo finished"
        );
        Ok(report)
    }
}

/// Move one file back. Returns whether it had to take a numbered name.
fn restore(record: &TransactionRecord) -> Result<bool, MoveError> {
    let occupied = |p: &Path| fs::symlink_metadata(p).is_ok();
    let target = if occupied(&record.original_path) {
        next_free_name(&record.original_path, occupied)
    } else {
        record.original_path.clone()
    };
    let renamed = target != record.original_path;
    if renamed {
        info!(
            original = %record.original_path.display(),
            restored_as = %target.display(),
            "Original path is occupied; restoring under a new name"
        );
    }
    relocate_file(&record.new_path, &target, false)?;
    debug!(from = %record.new_path.display(), to = %target.display(), "restored");
    Ok(renamed)
}

/// Remove directories left empty by the undo, up to (not including) `root`.
fn prune_empty_dirs(dirs: &BTreeSet<PathBuf>, root: &Path) {
    // Deepest first, so parents are empty by the time they are visited.
    for dir in dirs.iter().rev() {
        let mut current = dir.as_path();
        while current != root && current.starts_with(root) {
            if fs::remove_dir(current).is_err() {
                break;
            }
            debug!(dir = %current.display(), "removed empty directory");
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoProgress;

    fn journal_with(td: &Path, records: &[(PathBuf, PathBuf)]) -> PathBuf {
        let path = td.join("journal.jsonl");
        let j = Journal::begin(&path, &td.join("src"), &td.join("dst")).unwrap();
        for (from, to) in records {
            j.append(&TransactionRecord::now(from, to)).unwrap();
        }
        path
    }

    #[test]
    fn restores_and_prunes() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        let original = root.join("src/report.pdf");
        let moved = root.join("dst/Documents/pdf/report.pdf");
        fs::create_dir_all(moved.parent().unwrap()).unwrap();
        fs::create_dir_all(original.parent().unwrap()).unwrap();
        fs::write(&moved, b"pdf").unwrap();
        let jp = journal_with(root, &[(original.clone(), moved.clone())]);

        let report = UndoManager::new(&jp).undo(&RunControl::new(), &NoProgress).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(fs::read(&original).unwrap(), b"pdf");
        assert!(!root.join("dst/Documents").exists());
        assert!(root.join("dst").exists());
        assert!(!jp.exists());
    }

    #[test]
    fn occupied_original_gets_numbered_name() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        let original = root.join("src/a.txt");
        let moved = root.join("dst/Documents/txt/a.txt");
        fs::create_dir_all(moved.parent().unwrap()).unwrap();
        fs::create_dir_all(original.parent().unwrap()).unwrap();
        fs::write(&moved, b"moved").unwrap();
        fs::write(&original, b"newcomer").unwrap();
        let jp = journal_with(root, &[(original.clone(), moved)]);

        let report = UndoManager::new(&jp).undo(&RunControl::new(), &NoProgress).unwrap();
        assert_eq!(report.renamed, 1);
        assert_eq!(fs::read(&original).unwrap(), b"newcomer");
        assert_eq!(fs::read(root.join("src/a_1.txt")).unwrap(), b"moved");
    }

    #[test]
    fn missing_file_is_a_failure_not_an_abort() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        let jp = journal_with(root, &[(root.join("src/x"), root.join("dst/gone/x"))]);
        let report = UndoManager::new(&jp).undo(&RunControl::new(), &NoProgress).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!jp.exists());
    }

    #[test]
    fn second_undo_has_no_log() {
        let td = tempfile::tempdir().unwrap();
        let jp = journal_with(td.path(), &[]);
        UndoManager::new(&jp).undo(&RunControl::new(), &NoProgress).unwrap();
        let err = UndoManager::new(&jp).undo(&RunControl::new(), &NoProgress).unwrap_err();
        assert!(matches!(err, ClassifyError::NoLog(_)));
    }

    #[test]
    fn cancelled_undo_keeps_remaining_records() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        let mut pairs = Vec::new();
        for i in 0..3 {
            let moved = root.join(format!("dst/T/txt/f{i}.txt"));
            fs::create_dir_all(moved.parent().unwrap()).unwrap();
            fs::write(&moved, b"x").unwrap();
            pairs.push((root.join(format!("src/f{i}.txt")), moved));
        }
        let jp = journal_with(root, &pairs);
        let control = RunControl::new();
        control.cancel();

        let report = UndoManager::new(&jp).undo(&control, &NoProgress).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.restored, 0);
        assert_eq!(Journal::read(&jp).unwrap().records.len(), 3);
    }
}
