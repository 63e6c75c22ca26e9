//! Metadata preservation after a copy: timestamps and (Unix) permission bits.

use filetime::{FileTime, set_file_times};
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// Apply `src_meta`'s access/modification times and permissions to `dest`.
pub(super) fn preserve_metadata(dest: &Path, src_meta: &Metadata) -> io::Result<()> {
    let (at, mt) = {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            (
                Some(FileTime::from_unix_time(src_meta.atime(), src_meta.atime_nsec() as u32)),
                Some(FileTime::from_unix_time(src_meta.mtime(), src_meta.mtime_nsec() as u32)),
            )
        }
        #[cfg(not(unix))]
        {
            (
                src_meta.accessed().ok().map(FileTime::from_system_time),
                src_meta.modified().ok().map(FileTime::from_system_time),
            )
        }
    };
    if let (Some(at), Some(mt)) = (at, mt) {
        set_file_times(dest, at, mt)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = src_meta.permissions().mode() & 0o777;
        fs::set_permissions(dest, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    fs::set_permissions(dest, src_meta.permissions())?;

    Ok(())
}
