//! # Tiers
//!
//! A tier owns a pool of volumes (or cold backends) and the placement
//! strategy that picks among them. The pool is the tier's only mutable
//! shared state and lives behind the tier's own lock; block I/O happens
//! outside it.
//!
//! - `DiskTier`: Hot and Warm. Writes index the block in the location index
//!   and, when the cold tier is configured, queue it for migration.
//! - `ColdTier`: cold backends with failover.
//! - `CacheTier`: volume-backed cache in front of the durable tiers.

mod cache;
mod cold;
mod disk;
mod rotation;


pub use cache::CacheTier;
pub use cold::ColdTier;
pub use disk::DiskTier;
