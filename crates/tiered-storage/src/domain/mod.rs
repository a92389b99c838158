//! # Domain Layer
//!
//! Pure domain logic for the tiered storage engine. No I/O beyond reading a
//! config file.
//!
//! ## Modules
//!
//! - `errors` - Domain error types
//! - `tiering` - Tier kinds and the tiering bitmask
//! - `records` - Location records and migration queue entries
//! - `layout` - K/dir sharding and the directory cursor
//! - `strategy` - Placement strategies and the per-tier candidate pool
//! - `compression` - Zlib block compression
//! - `types` - Configuration and value types

pub mod compression;
pub mod errors;
pub mod layout;
pub mod records;
pub mod strategy;
pub mod tiering;
pub mod types;
