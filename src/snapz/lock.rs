//! Host-wide run lock.
//!
//! A `take`/`prune` run holds an exclusive `flock(2)` on a well-known file for
//! its whole duration. The lock is non-blocking: a second run fails right away
//! with [`SnapzError::MutexAcquisitionFailed`] instead of queueing up.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{Result, SnapzError};

#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Any failure on the way to the lock, including creating or opening the
    /// lock file, is reported as `MutexAcquisitionFailed` with the OS errno.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let failed = |e: std::io::Error| SnapzError::MutexAcquisitionFailed {
            name: path.display().to_string(),
            code: e.raw_os_error().unwrap_or(1),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(failed)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(failed)?;

        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(failed(std::io::Error::last_os_error()));
        }

        tracing::debug!(lock = %path.display(), "run lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // SAFETY: see `acquire`. Closing the file would release it as well.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        tracing::debug!(lock = %self.path.display(), "run lock released");
    }
}
