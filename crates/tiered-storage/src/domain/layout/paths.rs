use super::BLOCK_FILE_EXT;
use crate::domain::records::security::validate_block_hash;
use std::path::{Path, PathBuf};

/// Directory prefix and Directory Content Limit of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirLayout {
    pub prefix: &'static str,
    pub dcl: u64,
}

impl DirLayout {
    pub const HOT: DirLayout = DirLayout::new("HK", 2000);
    pub const WARM: DirLayout = DirLayout::new("WK", 1000);
    pub const COLD: DirLayout = DirLayout::new("CK", 10000);
    pub const CACHE: DirLayout = DirLayout::new("ChK", 2000);

    pub const fn new(prefix: &'static str, dcl: u64) -> Self {
        Self { prefix, dcl }
    }

    /// Same prefix, different limit. Small limits make sharding testable.
    pub const fn with_dcl(self, dcl: u64) -> Self {
        Self::new(self.prefix, dcl)
    }

    pub fn k_dir(&self, root: &Path, k_index: u64) -> PathBuf {
        root.join(format!("{}{}", self.prefix, k_index))
    }

    pub fn shard_dir(&self, root: &Path, k_index: u64, dir_index: u64) -> PathBuf {
        self.k_dir(root, k_index).join(dir_index.to_string())
    }

    pub fn block_path(&self, root: &Path, k_index: u64, dir_index: u64, hash: &str) -> PathBuf {
        self.shard_dir(root, k_index, dir_index)
            .join(block_file_name(hash))
    }

    /// Parse `"{prefix}{k}"` into `k`, ignoring anything out of range.
    pub fn parse_k_dir(&self, name: &str) -> Option<u64> {
        let k = name.strip_prefix(self.prefix)?.parse::<u64>().ok()?;
        (k < self.dcl).then_some(k)
    }

    /// Parse a leaf directory name into its index.
    pub fn parse_shard_dir(&self, name: &str) -> Option<u64> {
        let dir = name.parse::<u64>().ok()?;
        (dir < self.dcl).then_some(dir)
    }
}

pub fn block_file_name(hash: &str) -> String {
    format!("{}.{}", hash, BLOCK_FILE_EXT)
}

/// Hash encoded in a block file name, if the name is one.
pub fn hash_from_file_name(name: &str) -> Option<&str> {
    let hash = name.strip_suffix(BLOCK_FILE_EXT)?.strip_suffix('.')?;
    validate_block_hash(hash).ok()?;
    Some(hash)
}

/// Volume root of a block path (`{root}/{K}/{dir}/{file}`).
pub fn volume_root_of(block_path: &Path) -> Option<&Path> {
    block_path.parent()?.parent()?.parent()
}
