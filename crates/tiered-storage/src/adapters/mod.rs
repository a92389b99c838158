//! # Adapters Module
//!
//! Implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `storage`: metadata key-value stores (file-backed, in-memory, RocksDB)
//! - `filesystem`: free space, free inodes and writability
//! - `cold`: cold storage backends
//! - `infra`: clocks
//! - `lock`: metadata directory lock (singleton guard)

pub mod cold;
pub mod filesystem;
pub mod infra;
pub mod lock;
pub mod storage;

pub use cold::ColdDisk;
pub use filesystem::{MockFileSystemAdapter, StatvfsFileSystemAdapter};
pub use infra::{MockTimeSource, SystemTimeSource};
pub use lock::{LockError, MetaDirLock};
pub use storage::{FileBackedKVStore, InMemoryKVStore, WriteFailures};
