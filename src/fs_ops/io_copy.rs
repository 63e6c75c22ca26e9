//! Streaming copy into a brand-new file.
//!
//! - The destination is created with `create_new(true)`; an existing file is never clobbered.
//! - Linux tries `copy_file_range` first and falls back to buffered streaming.
//! - The destination is `sync_all`-ed before returning.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;

/// Copy `src` into a new file at `dst`; returns the number of bytes written.
pub(super) fn copy_to_new(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_f = File::open(src)?;
    let dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;

    #[cfg(target_os = "linux")]
    if let Some(bytes) = kernel_copy(&src_f, &dst_f)? {
        dst_f.sync_all()?;
        return Ok(bytes);
    }

    let mut reader = BufReader::with_capacity(BUF_SIZE, src_f);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(bytes)
}

/// In-kernel copy. `Ok(None)` means unsupported here and nothing was written.
#[cfg(target_os = "linux")]
fn kernel_copy(src: &File, dst: &File) -> io::Result<Option<u64>> {
    use std::os::unix::io::AsRawFd;
    const CHUNK: usize = 16 * 1024 * 1024;

    let mut total: u64 = 0;
    loop {
        let rc = unsafe {
            libc::copy_file_range(
                src.as_raw_fd(),
                std::ptr::null_mut(),
                dst.as_raw_fd(),
                std::ptr::null_mut(),
                CHUNK,
                0,
            )
        };
        match rc {
            n if n > 0 => total += n as u64,
            0 => return Ok(Some(total)),
            _ => {
                let err = io::Error::last_os_error();
                let unsupported = matches!(
                    err.raw_os_error(),
                    Some(libc::EXDEV | libc::ENOSYS | libc::EINVAL | libc::EPERM | libc::EOPNOTSUPP)
                );
                // Partial copy then error: surface it; the caller removes the temp file.
                if total == 0 && unsupported {
                    return Ok(None);
                }
                return Err(err);
            }
        }
    }
}
