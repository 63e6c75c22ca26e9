//! Single-file move.
//! Attempts an atomic rename; only a cross-filesystem failure falls back to a
//! safe copy+rename followed by removal of the source. A successful move is
//! then recorded in the journal.

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use super::atomic::try_atomic_move;
use super::copy::safe_copy_and_rename;
use super::helpers::describe_io_error;
use super::meta::preserve_metadata;
use super::space::ensure_space_for_copy;
use super::util::is_cross_device;
use crate::errors::{LogInconsistency, MoveError};
use crate::journal::{Journal, TransactionRecord};
use crate::planner::MoveEntry;

/// Result of one journaled move.
#[derive(Debug)]
pub enum MoveOutcome {
    /// Moved and durably recorded.
    Moved(TransactionRecord),
    /// Moved, but undo will not know about it.
    Unlogged(LogInconsistency),
    /// Deliberately left alone (destination occupied).
    Skipped(MoveError),
    Failed(MoveError),
}

fn classify_io(op: &str, path: &Path, e: io::Error) -> MoveError {
    let message = describe_io_error(op, path, &e);
    match e.kind() {
        io::ErrorKind::PermissionDenied => MoveError::PermissionDenied {
            path: path.to_path_buf(),
            context: message,
        },
        _ => MoveError::Io(message),
    }
}

/// Move `src` to `dst` without touching any journal.
///
/// With `overwrite == false` an existing destination is refused with
/// [`MoveError::DestinationExists`]. The parent of `dst` is created.
pub fn relocate_file(src: &Path, dst: &Path, overwrite: bool) -> Result<(), MoveError> {
    let src_meta = match fs::symlink_metadata(src) {
        Ok(md) => md,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(MoveError::SourceVanished(src.to_path_buf()));
        }
        Err(e) => return Err(classify_io("stat source", src, e)),
    };

    let dest_dir = dst
        .parent()
        .ok_or_else(|| MoveError::Io(format!("destination has no parent: {}", dst.display())))?;
    fs::create_dir_all(dest_dir).map_err(|e| classify_io("create destination directory", dest_dir, e))?;

    // Check-then-rename: planned destinations are distinct within a run, so
    // this only races with other processes writing into the destination tree.
    if !overwrite && fs::symlink_metadata(dst).is_ok() {
        return Err(MoveError::DestinationExists(dst.to_path_buf()));
    }

    match try_atomic_move(src, dst, overwrite) {
        Ok(()) => {
            debug!(src = %src.display(), dest = %dst.display(), "renamed atomically");
            Ok(())
        }
        Err(e) if is_cross_device(&e) => {
            debug!(src = %src.display(), dest = %dst.display(), "cross-filesystem; copying instead");
            copy_then_remove(src, dst, &src_meta, overwrite)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound && fs::symlink_metadata(src).is_err() => {
            Err(MoveError::SourceVanished(src.to_path_buf()))
        }
        Err(e) => Err(classify_io("rename", src, e)),
    }
}

fn copy_then_remove(src: &Path, dst: &Path, src_meta: &fs::Metadata, overwrite: bool) -> Result<(), MoveError> {
    let dest_dir = dst.parent().unwrap_or_else(|| Path::new("."));
    ensure_space_for_copy(dest_dir, src_meta.len())?;

    match safe_copy_and_rename(src, dst, overwrite) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && !overwrite => {
            return Err(MoveError::DestinationExists(dst.to_path_buf()));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound && fs::symlink_metadata(src).is_err() => {
            return Err(MoveError::SourceVanished(src.to_path_buf()));
        }
        Err(e) => return Err(classify_io("copy", src, e)),
    }

    if let Err(e) = preserve_metadata(dst, src_meta) {
        warn!(dest = %dst.display(), error = %e, "could not preserve timestamps/permissions");
    }

    // Never leave the file in two places: if the source stays, the copy goes.
    if let Err(e) = fs::remove_file(src) {
        let err = classify_io("remove original after copy", src, e);
        if let Err(cleanup) = fs::remove_file(dst) {
            warn!(dest = %dst.display(), error = %cleanup, "could not remove copy after failed source removal");
        }
        return Err(err);
    }
    Ok(())
}

/// Journaled mover used by the execution engine.
pub struct Mover<'j> {
    journal: &'j Journal,
}

impl<'j> Mover<'j> {
    pub fn new(journal: &'j Journal) -> Self {
        Self { journal }
    }

    /// Move one planned entry and record it.
    pub fn relocate(&self, entry: &MoveEntry) -> MoveOutcome {
        if let Err(e) = relocate_file(&entry.source, &entry.destination, entry.overwrite) {
            return if e.is_skip() {
                debug!(src = %entry.source.display(), reason = %e, "Skipped");
                MoveOutcome::Skipped(e)
            } else {
                warn!(src = %entry.source.display(), error = %e, "Move failed");
                MoveOutcome::Failed(e)
            };
        }

        let record = TransactionRecord::now(&entry.source, &entry.destination);
        match self.journal.append(&record) {
            Ok(()) => {
                debug!(src = %entry.source.display(), dest = %entry.destination.display(), "Moved");
                MoveOutcome::Moved(record)
            }
            Err(source) => {
                let inconsistency = LogInconsistency { record, source };
                warn!(error = %inconsistency, "journal append failed after a successful move");
                MoveOutcome::Unlogged(inconsistency)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_occupied_destination_without_overwrite() {
        let td = tempfile::tempdir().unwrap();
        let src = td.path().join("a.txt");
        let dst = td.path().join("out/a.txt");
        fs::write(&src, b"new").unwrap();
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::write(&dst, b"old").unwrap();

        let err = relocate_file(&src, &dst, false).unwrap_err();
        assert!(matches!(err, MoveError::DestinationExists(_)));
        assert!(src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"old");
    }

    #[test]
    fn overwrite_replaces_destination() {
        let td = tempfile::tempdir().unwrap();
        let src = td.path().join("a.txt");
        let dst = td.path().join("a2.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        relocate_file(&src, &dst, true).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }

    #[test]
    fn vanished_source_is_reported() {
        let td = tempfile::tempdir().unwrap();
        let err = relocate_file(&td.path().join("gone"), &td.path().join("x/gone"), false).unwrap_err();
        assert!(matches!(err, MoveError::SourceVanished(_)));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let td = tempfile::tempdir().unwrap();
        let src = td.path().join("a.pdf");
        fs::write(&src, b"%PDF").unwrap();
        let dst = td.path().join("Documents/pdf/a.pdf");
        relocate_file(&src, &dst, false).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"%PDF");
    }
}
