//! I/O error enrichment.
//!
//! Adds the operation, the path and a platform-aware hint to an io::Error so
//! per-file failures read well in the run summary.
//!
//! Usage:
//!   fs::create_dir_all(dir).map_err(io_error_with_help_io("create directory", dir))?;

use std::io;
use std::path::Path;

/// Short hint for a raw OS error code, when one is known.
fn os_hint(code: i32) -> Option<&'static str> {
    #[cfg(unix)]
    {
        let hint = match code {
            libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
            libc::EXDEV => "cross-filesystem; atomic rename not possible",
            libc::EBUSY => "resource busy; ensure no other process is writing",
            libc::ENOENT => "path not found; it may have been moved or deleted",
            libc::EEXIST => "already exists",
            libc::ENOSPC => "insufficient space on device",
            libc::EROFS => "read-only filesystem; cannot write here",
            libc::ELOOP => "too many symbolic link levels; possible symlink cycle",
            libc::ENAMETOOLONG => "filename or path too long",
            libc::EMFILE | libc::ENFILE => "too many open files",
            _ => return None,
        };
        Some(hint)
    }
    #[cfg(windows)]
    {
        let hint = match code {
            5 => "access denied; check permissions",
            17 => "not same device; cross-filesystem move",
            32 => "sharing violation; file is in use",
            2 | 3 => "path not found; it may have been moved or deleted",
            80 | 183 => "already exists",
            112 => "insufficient disk space",
            19 => "write protected media",
            206 => "filename or path too long",
            4 => "too many open files",
            _ => return None,
        };
        Some(hint)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        None
    }
}

/// Format a human-friendly message with op/path plus platform-aware hints.
pub(crate) fn describe_io_error(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);

    if let Some(code) = e.raw_os_error() {
        if let Some(hint) = os_hint(code) {
            msg.push_str(" (");
            msg.push_str(hint);
            msg.push(')');
        }
        msg.push_str(&format!(" [os code: {code}]"));
    } else {
        let hint = match e.kind() {
            io::ErrorKind::PermissionDenied => Some("permission denied"),
            io::ErrorKind::NotFound => Some("path not found"),
            io::ErrorKind::AlreadyExists => Some("already exists"),
            _ => None,
        };
        if let Some(hint) = hint {
            msg.push_str(&format!(" ({hint})"));
        }
    }
    msg
}

/// Adapter for io::Result code: enrich the message, keep the ErrorKind and OS code visible.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), describe_io_error(op, path, &e))
}
