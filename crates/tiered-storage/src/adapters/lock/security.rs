//! # Lock Security
//!
//! ## Security Invariants
//!
//! - Stale locks are detected via PID check and file age
//! - Lock acquisition never blocks indefinitely

use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Lock files older than this are considered abandoned.
pub const MAX_LOCK_AGE: Duration = Duration::from_secs(7 * 86400);

/// Checks if a process with the given PID is still running.
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        true
    }
}

/// Lock file exists and has not been touched for `MAX_LOCK_AGE`.
pub fn is_lock_file_stale(lock_path: &Path) -> bool {
    lock_path
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.elapsed().ok())
        .is_some_and(|age| age > MAX_LOCK_AGE)
}

/// Lock file resolves to a location inside the metadata directory.
///
/// # Security
///
/// A symlinked `LOCK` pointing elsewhere is refused.
pub fn validate_lock_path(meta_dir: &Path, lock_path: &Path) -> bool {
    match (lock_path.canonicalize(), meta_dir.canonicalize()) {
        (Ok(lock), Ok(dir)) => lock.starts_with(dir),
        _ => false,
    }
}
