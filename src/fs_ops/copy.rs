//! Safe copy-and-rename used when a plain rename crosses filesystems:
//! - copy to a hidden temp file in the destination directory (fsynced)
//! - atomically rename temp -> dest (fsyncs the directory on Unix)
//! - the temp file is removed on any failure

use std::fs;
use std::io;
use std::path::Path;

use super::atomic::try_atomic_move;
use super::helpers::io_error_with_help_io;
use super::{io_copy, util};

pub(super) fn safe_copy_and_rename(src: &Path, dest: &Path, overwrite: bool) -> io::Result<u64> {
    let dest_dir = dest.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination has no parent: {}", dest.display()),
        )
    })?;

    let tmp_path = util::unique_temp_path(dest_dir);
    let bytes = match io_copy::copy_to_new(src, &tmp_path) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_error_with_help_io("copy to temporary file", &tmp_path)(e));
        }
    };

    if !overwrite && fs::symlink_metadata(dest).is_ok() {
        let _ = fs::remove_file(&tmp_path);
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination appeared during copy: {}", dest.display()),
        ));
    }

    if let Err(e) = try_atomic_move(&tmp_path, dest, overwrite) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_error_with_help_io("rename temporary file into place", dest)(e));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_no_temp_files_behind() {
        let td = tempfile::tempdir().unwrap();
        let src = td.path().join("a.txt");
        fs::write(&src, b"payload").unwrap();
        let out = td.path().join("out");
        fs::create_dir(&out).unwrap();
        let dest = out.join("a.txt");

        assert_eq!(safe_copy_and_rename(&src, &dest, false).unwrap(), 7);
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        let names: Vec<_> = fs::read_dir(&out).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn existing_destination_is_kept_without_overwrite() {
        let td = tempfile::tempdir().unwrap();
        let src = td.path().join("a.txt");
        let dest = td.path().join("b.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = safe_copy_and_rename(&src, &dest, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");

        safe_copy_and_rename(&src, &dest, true).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }
}
