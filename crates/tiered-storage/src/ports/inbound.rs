//! # Inbound Ports (Driving Ports)
//!
//! The API the block producer uses. Blocks are opaque bytes keyed by their
//! hex hash.

use crate::domain::errors::StorageError;
use std::path::PathBuf;

/// Primary API of the storage engine.
///
/// Implementations are shared between threads; every method takes `&self`.
pub trait BlockStoreApi: Send + Sync {
    /// Persist a block.
    ///
    /// Returns the path of the file written. The block is indexed before
    /// this returns; on error nothing is left behind.
    ///
    /// ## Errors
    ///
    /// - `InvalidHash`: hash is not usable as a file name
    /// - `NoVolumeAvailable`: no volume of the target tier can take the block
    /// - `Io` / `Compression`: the write failed and was rolled back
    /// - `Database`: the metadata upsert failed and the file was removed
    fn write(&self, hash: &str, data: &[u8]) -> Result<PathBuf, StorageError>;

    /// Read a block, preferring Hot, then Warm, then Cold.
    ///
    /// `round_hint` is the producer's round number for the block, if known.
    /// It is only used for logging.
    ///
    /// ## Errors
    ///
    /// - `BlockNotFound`: no record, or the record pointed at nothing
    fn read(&self, hash: &str, round_hint: Option<u64>) -> Result<Vec<u8>, StorageError>;

    /// Delete a block's local and cached copies, and its location record.
    ///
    /// Cold copies are archival and are left in place.
    fn delete(&self, hash: &str) -> Result<(), StorageError>;
}
