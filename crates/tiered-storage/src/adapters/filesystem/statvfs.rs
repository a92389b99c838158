use crate::domain::errors::FSError;
use crate::ports::outbound::FileSystemAdapter;
use nix::sys::statvfs::statvfs;
use nix::unistd::{access, AccessFlags};
use std::path::Path;

/// Production filesystem adapter.
///
/// Free bytes come from `fs2`, free inodes from `statvfs(2)`, writability
/// from `access(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsFileSystemAdapter;

impl FileSystemAdapter for StatvfsFileSystemAdapter {
    fn available_bytes(&self, path: &Path) -> Result<u64, FSError> {
        fs2::available_space(path).map_err(|e| FSError::IOError {
            message: format!("{}: {}", path.display(), e),
        })
    }

    fn available_inodes(&self, path: &Path) -> Result<u64, FSError> {
        let stat = statvfs(path).map_err(|e| FSError::IOError {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(stat.files_available() as u64)
    }

    fn is_writable(&self, path: &Path) -> bool {
        access(path, AccessFlags::W_OK).is_ok()
    }
}
