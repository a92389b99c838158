//! # Tiered Block Storage Engine
//!
//! Stores content-addressed blocks on local Hot and Warm disk tiers, moves
//! aged blocks to a Cold tier in the background and optionally fronts
//! everything with a disk cache.
//!
//! ## Architecture
//!
//! ```text
//!                  BlockStoreApi (write / read / delete)
//!                              │
//!                        [SmartStore] ──── CacheTier (write-through | write-back)
//!              ┌───────────────┼───────────────┐
//!          DiskTier (Hot)  DiskTier (Warm)  ColdTier ── ColdStorage backends
//!              │               │               ▲
//!           Volume ...      Volume ...         │ MigrationWorker
//!              └───────┬───────┘               │
//!               MetadataStore ─────────────────┘
//!          (location index + migration queue)
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Single record | One location record per block hash |
//! | Bounded directories | At most `dcl` block files per shard directory |
//! | Counted writes | Volume counters move only for completed writes and deletes |
//! | Write or nothing | A failed write leaves no file and no record behind |
//! | Ordered migration | Queue keys sort by creation time, oldest moved first |
//! | Single owner | One engine per metadata directory |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Configuration, records, layout, placement strategies, errors
//! - `ports/` - Inbound API and outbound SPI traits
//! - `adapters/` - Key-value stores, filesystem stats, cold backends, lock
//! - `volume/` - One mount point: cursor, counters, block files
//! - `tier/` - Hot/Warm disk tiers, the cold tier and the cache
//! - `metadata/` - Location index and migration queue
//! - `migration/` - Background mover to the cold tier
//! - `service/` - The Smart Store facade
//! - `bootstrap/` - Boot modes and engine assembly
//!
//! ## Usage
//!
//! ```ignore
//! use tiered_storage::{BlockStoreApi, Engine, EngineConfig};
//!
//! let config = EngineConfig::from_json_file("storage.json")?;
//! let engine = Engine::open(config)?;
//!
//! let store = engine.store();
//! store.write(&hash, &data)?;
//! let data = store.read(&hash, Some(round))?;
//! ```

pub mod adapters;
pub mod bootstrap;
pub mod domain;
pub mod metadata;
pub mod migration;
pub mod ports;
pub mod service;
pub mod tier;
pub mod volume;

#[cfg(test)]
mod test_utils;

// Re-export key types for convenience
pub use bootstrap::{Engine, EngineDeps};
pub use domain::errors::{AdmissionFailure, ConfigError, StorageError};
pub use domain::tiering::TierKind;
pub use domain::types::{
    BootMode, CacheConfig, CacheWritePolicy, ColdTierConfig, DiskTierConfig, EngineConfig,
    TieringMode, VolumeConfig,
};
pub use metadata::MetadataStore;
pub use migration::{MigrationWorker, TickReport, WorkerState};
pub use ports::inbound::BlockStoreApi;
pub use ports::outbound::{ColdStorage, FileSystemAdapter, KeyValueStore, TimeSource};
pub use service::SmartStore;
