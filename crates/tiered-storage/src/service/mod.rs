//! # Smart Store
//!
//! Facade implementing `BlockStoreApi` over the configured tier
//! combination.
//!
//! | mode                | write                    | read order      | delete          |
//! |---------------------|--------------------------|-----------------|-----------------|
//! | `hot`               | Hot                      | Hot             | Hot             |
//! | `warm`              | Warm                     | Warm            | Warm            |
//! | `hot_and_warm`      | Hot, Warm if Hot is full | Hot, Warm       | both            |
//! | `hot_and_cold`      | Hot, queued              | Hot, Cold       | Hot + record    |
//! | `warm_and_cold`     | Warm, queued             | Warm, Cold      | Warm + record   |
//! | `hot_warm_and_cold` | Hot, Warm if Hot is full | Hot, Warm, Cold | local + record  |
//!
//! An optional cache tier sits in front of every mode. Write-through caches
//! after the durable write; write-back caches first and leaves the durable
//! write to `flush_write_back`.

mod store;

#[cfg(test)]
mod tests;

pub use store::SmartStore;
