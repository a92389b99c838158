//! # Types Module
//!
//! Configuration and immutable value types.

mod config;
mod modes;
pub mod quantity;
pub mod security;


pub use config::{
    CacheConfig, ColdTierConfig, DiskTierConfig, EngineConfig, VolumeConfig, VolumeLimits,
    DEFAULT_MIGRATION_CONCURRENCY, DEFAULT_MIN_FREE_BYTES, DEFAULT_POLL_INTERVAL_HOURS, GIB,
};
pub use modes::{BootMode, CacheWritePolicy, TieringMode};
