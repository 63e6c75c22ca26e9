//! Free-space check for the copy fallback.

use std::io;
use std::path::Path;
use tracing::warn;

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
#[cfg(windows)]
use std::os::windows::ffi::OsStrExt;

use crate::errors::MoveError;

// Headroom kept free on the destination volume.
const CUSHION: u64 = 4 * 1024 * 1024;

fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.1} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{n} B")
    }
}

/// Refuse a copy of `required` bytes into `dst_dir` when the volume cannot hold it.
/// An unreadable free-space figure does not block the copy.
pub(super) fn ensure_space_for_copy(dst_dir: &Path, required: u64) -> Result<(), MoveError> {
    let free = match free_space_bytes(dst_dir) {
        Ok(free) => free,
        Err(e) => {
            warn!(dir = %dst_dir.display(), error = %e, "cannot query free space; copying anyway");
            return Ok(());
        }
    };
    if free < required.saturating_add(CUSHION) {
        warn!(
            dir = %dst_dir.display(),
            need = %format_bytes(required),
            free = %format_bytes(free),
            "not enough free space for copy"
        );
        return Err(MoveError::InsufficientSpace {
            required,
            available: free,
            dest: dst_dir.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn free_space_bytes(path: &Path) -> io::Result<u64> {
    let mut s: libc::statvfs = unsafe { std::mem::zeroed() };
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut s) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((s.f_bavail as u64).saturating_mul(s.f_frsize as u64))
}

#[cfg(windows)]
fn free_space_bytes(path: &Path) -> io::Result<u64> {
    use std::iter::once;
    use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;
    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(once(0)).collect();
    let mut free_avail: u64 = 0;
    let mut total: u64 = 0;
    let mut total_free: u64 = 0;
    let ok = unsafe { GetDiskFreeSpaceExW(wide.as_ptr(), &mut free_avail, &mut total, &mut total_free) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(free_avail)
}

#[cfg(not(any(unix, windows)))]
fn free_space_bytes(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "free space query not supported"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[cfg(unix)]
    #[test]
    fn absurd_request_is_refused() {
        let td = tempfile::tempdir().unwrap();
        let err = ensure_space_for_copy(td.path(), u64::MAX / 2).unwrap_err();
        assert!(matches!(err, MoveError::InsufficientSpace { .. }));
    }
}
