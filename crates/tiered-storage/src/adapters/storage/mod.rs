//! Storage Adapters
//!
//! Implementations of the `KeyValueStore` trait.

mod buckets;
mod file;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb;

pub use file::FileBackedKVStore;
pub use memory::{InMemoryKVStore, WriteFailures};
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbStore};
