use crate::domain::errors::FSError;
use crate::ports::outbound::FileSystemAdapter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reported statistics for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathStats {
    available_bytes: u64,
    available_inodes: u64,
    writable: bool,
}

/// Controllable filesystem adapter for unit tests.
///
/// Every path reports the defaults (1TB free, 1M inodes, writable) unless
/// overridden. Overrides apply to the path and everything below it.
pub struct MockFileSystemAdapter {
    default: PathStats,
    overrides: RwLock<HashMap<PathBuf, PathStats>>,
}

impl Default for MockFileSystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystemAdapter {
    pub fn new() -> Self {
        Self {
            default: PathStats {
                available_bytes: 1_000_000_000_000,
                available_inodes: 1_000_000,
                writable: true,
            },
            overrides: RwLock::new(HashMap::new()),
        }
    }

    fn update(&self, path: &Path, f: impl FnOnce(&mut PathStats)) {
        let mut overrides = self.overrides.write();
        let stats = overrides.entry(path.to_path_buf()).or_insert(self.default);
        f(stats);
    }

    pub fn set_available_bytes(&self, path: &Path, bytes: u64) {
        self.update(path, |s| s.available_bytes = bytes);
    }

    pub fn set_available_inodes(&self, path: &Path, inodes: u64) {
        self.update(path, |s| s.available_inodes = inodes);
    }

    pub fn set_writable(&self, path: &Path, writable: bool) {
        self.update(path, |s| s.writable = writable);
    }

    /// Stats of the closest overridden ancestor of `path`.
    fn stats(&self, path: &Path) -> PathStats {
        let overrides = self.overrides.read();
        path.ancestors()
            .find_map(|p| overrides.get(p).copied())
            .unwrap_or(self.default)
    }
}

impl FileSystemAdapter for MockFileSystemAdapter {
    fn available_bytes(&self, path: &Path) -> Result<u64, FSError> {
        Ok(self.stats(path).available_bytes)
    }

    fn available_inodes(&self, path: &Path) -> Result<u64, FSError> {
        Ok(self.stats(path).available_inodes)
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.stats(path).writable
    }
}
