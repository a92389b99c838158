//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the storage engine.

use crate::domain::errors::{FSError, KVStoreError, StorageError};
use std::path::Path;

/// Bucketed key-value store holding the metadata indexes.
///
/// Production: `FileBackedKVStore`, or `RocksDbStore` with the `rocksdb` feature
/// Testing: `InMemoryKVStore`
pub trait KeyValueStore: Send + Sync {
    /// Create a bucket. Creating an existing bucket is a no-op.
    fn create_bucket(&mut self, bucket: &str) -> Result<(), KVStoreError>;

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch succeed, or NONE are applied.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Entries with `start <= key <= end`, in key order, at most `limit`.
    fn range_scan(
        &self,
        bucket: &str,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    Put {
        bucket: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        bucket: String,
        key: Vec<u8>,
    },
}

impl BatchOperation {
    pub fn put(bucket: &str, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            bucket: bucket.to_string(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(bucket: &str, key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete {
            bucket: bucket.to_string(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        match self {
            BatchOperation::Put { bucket, .. } | BatchOperation::Delete { bucket, .. } => bucket,
        }
    }
}

/// Filesystem statistics used by volume admission.
pub trait FileSystemAdapter: Send + Sync {
    /// Free bytes on the filesystem holding `path`.
    fn available_bytes(&self, path: &Path) -> Result<u64, FSError>;

    /// Free inodes on the filesystem holding `path`.
    fn available_inodes(&self, path: &Path) -> Result<u64, FSError>;

    fn is_writable(&self, path: &Path) -> bool;
}

/// An archival backend blocks are migrated to.
///
/// Production: `ColdDisk`. Object storage backends implement the same
/// contract.
pub trait ColdStorage: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &str;

    /// True if `cold_path` was produced by this backend.
    fn owns(&self, cold_path: &str) -> bool;

    /// Copy the block stored at `local_path` into this backend.
    ///
    /// Returns the cold path to record for the block.
    fn move_block(&self, hash: &str, local_path: &Path) -> Result<String, StorageError>;

    fn get_block(&self, hash: &str, cold_path: &str) -> Result<Vec<u8>, StorageError>;

    /// Read several blocks given as `(hash, cold_path)` pairs.
    fn get_blocks(&self, blocks: &[(String, String)]) -> Result<Vec<Vec<u8>>, StorageError> {
        blocks
            .iter()
            .map(|(hash, cold_path)| self.get_block(hash, cold_path))
            .collect()
    }

    fn delete_block(&self, hash: &str, cold_path: &str) -> Result<(), StorageError>;

    /// Admission check for the next `move_block`.
    fn is_able_to_store_block(&self) -> bool;

    fn used_bytes(&self) -> u64;

    fn available_bytes(&self) -> u64;

    fn block_count(&self) -> u64;
}

/// Clock abstraction (for testability).
pub trait TimeSource: Send + Sync {
    /// Nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u64;
}
