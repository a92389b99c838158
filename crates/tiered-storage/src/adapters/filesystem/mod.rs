//! Filesystem Adapters
//!
//! Implementations of the `FileSystemAdapter` trait.

mod mock;
mod statvfs;

pub use mock::MockFileSystemAdapter;
pub use statvfs::StatvfsFileSystemAdapter;
