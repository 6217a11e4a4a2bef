//! Advisory lock around the blobstore cache files.
//!
//! Uses file locking (flock) so that launches sharing an output directory
//! take turns checking, converting and committing the cached image.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use emulite_shared::errors::{EmuliteError, EmuliteResult};

use super::constants::blobstore::LOCK_FILE;

/// A guard holding an exclusive lock on a cache directory.
///
/// The lock is released when this guard is dropped, or when the process
/// exits/crashes.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock for `cache_dir`, blocking until it is available.
    pub fn acquire(cache_dir: &Path) -> EmuliteResult<Self> {
        std::fs::create_dir_all(cache_dir).map_err(|e| {
            EmuliteError::Storage(format!(
                "Failed to create cache dir {}: {}",
                cache_dir.display(),
                e
            ))
        })?;

        let lock_path = cache_dir.join(LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| EmuliteError::Storage(format!("Failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            loop {
                let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
                if result == 0 {
                    break;
                }
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::Interrupted {
                    return Err(EmuliteError::Storage(format!(
                        "Failed to lock {}: {}",
                        lock_path.display(),
                        err
                    )));
                }
            }
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired cache lock");

        Ok(CacheLock {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released cache lock");
    }
}
