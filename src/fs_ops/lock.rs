//! Advisory operation lock.
//! Uses a sidecar lock file so only one filesort process works with a journal at a time.
//!
//! Design:
//! - The lock is an exclusive `fs2` lock on `<journal>.lock`, taken without blocking.
//! - The lock is released when the guard is dropped. The lock file itself stays on
//!   disk; deleting it while another process waits on the old inode would let two
//!   holders coexist.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// RAII guard held while the operation lock is active.
#[derive(Debug)]
pub struct OperationLock {
    file: File,
    path: PathBuf,
}

impl OperationLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        // Best-effort; closing the descriptor releases the lock anyway.
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.path.display(), "operation lock released");
    }
}

/// Sidecar lock path for `target`: `<target>.lock`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "filesort".into());
    name.push(".lock");
    target.with_file_name(name)
}

/// Non-blocking attempt to lock `target`'s sidecar.
/// Returns Ok(None) if another process holds the lock.
pub fn try_lock_operation(target: &Path) -> io::Result<Option<OperationLock>> {
    let path = lock_path_for(target);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    opts.mode(0o600);
    let file = opts.open(&path)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            trace!(path = %path.display(), "operation lock acquired");
            Ok(Some(OperationLock { file, path }))
        }
        Err(e) if e.kind() == fs2::lock_contended_error().kind() || e.kind() == io::ErrorKind::WouldBlock => {
            trace!(path = %path.display(), "operation lock is held elsewhere");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
