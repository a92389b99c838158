//! # File Lock Implementation
//!
//! `fs2` advisory locks (flock on Unix). The lock file holds the owner's PID.

use crate::domain::errors::StorageError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Errors from metadata directory locking
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Failed to create lock file {}: {source}", path.display())]
    CreateFailed { path: PathBuf, source: io::Error },

    #[error("Metadata directory {} already in use{}", path.display(), pid.map(|p| format!(" by process {}", p)).unwrap_or_default())]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },

    #[error("Lock path {} escapes the metadata directory", path.display())]
    OutsideDirectory { path: PathBuf },

    #[error("Failed to write PID to lock file: {0}")]
    WriteFailed(io::Error),
}

impl From<LockError> for StorageError {
    fn from(e: LockError) -> Self {
        StorageError::DatabaseLocked {
            message: e.to_string(),
        }
    }
}

/// Exclusive lock on a metadata directory, released on drop.
pub struct MetaDirLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl MetaDirLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Acquire the lock, waiting up to the default timeout.
    pub fn acquire(meta_dir: &Path) -> Result<Self, LockError> {
        Self::acquire_with_timeout(meta_dir, super::security::DEFAULT_LOCK_TIMEOUT)
    }

    /// Acquire the lock, retrying with backoff until `timeout` passes.
    ///
    /// A lock whose owner process is gone, or whose file is older than the
    /// maximum lock age, is taken over.
    pub fn acquire_with_timeout(meta_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        use super::security::{is_process_running, is_lock_file_stale, validate_lock_path};

        let deadline = Instant::now() + timeout;
        let lock_path = meta_dir.join(Self::LOCK_FILE);
        let mut retry_delay = Duration::from_millis(20);

        std::fs::create_dir_all(meta_dir).map_err(|source| LockError::CreateFailed {
            path: meta_dir.to_path_buf(),
            source,
        })?;

        loop {
            if lock_path.exists() && !validate_lock_path(meta_dir, &lock_path) {
                return Err(LockError::OutsideDirectory { path: lock_path });
            }

            if is_lock_file_stale(&lock_path) {
                tracing::warn!("[lock] removing stale lock {}", lock_path.display());
                let _ = std::fs::remove_file(&lock_path);
            }

            // Truncation happens only once the lock is ours.
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&lock_path)
                .map_err(|source| LockError::CreateFailed {
                    path: lock_path.clone(),
                    source,
                })?;

            if file.try_lock_exclusive().is_ok() {
                let pid = std::process::id();
                let mut locked = file;
                locked.set_len(0).map_err(LockError::WriteFailed)?;
                writeln!(locked, "{}", pid).map_err(LockError::WriteFailed)?;
                locked.sync_all().map_err(LockError::WriteFailed)?;

                tracing::debug!("[lock] acquired {}", lock_path.display());
                return Ok(Self {
                    file: locked,
                    path: lock_path,
                    pid,
                });
            }

            let holder = read_pid(&lock_path);
            drop(file);

            if let Some(pid) = holder {
                if pid != std::process::id() && !is_process_running(pid) {
                    let _ = std::fs::remove_file(&lock_path);
                    continue;
                }
            }

            if Instant::now() >= deadline {
                return Err(LockError::AlreadyLocked {
                    pid: holder,
                    path: lock_path,
                });
            }

            std::thread::sleep(retry_delay);
            retry_delay = (retry_delay * 2).min(Duration::from_millis(500));
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

impl Drop for MetaDirLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
