//! # Bootstrap
//!
//! Turns an [`EngineConfig`](crate::domain::types::EngineConfig) into a
//! running engine: metadata lock, metadata store, tiers and the Smart Store.
//!
//! ## Boot modes
//!
//! | Mode      | Metadata        | Volumes                                   |
//! |-----------|-----------------|-------------------------------------------|
//! | `start`   | removed         | wiped and recreated empty                 |
//! | `restart` | kept            | counters and cursor restored from disk    |
//! | `recover` | kept and merged | restored, every block file re-indexed     |
//! | `repair*` | -               | rejected with `UnsupportedMode`           |
//!
//! Cache volumes are wiped in every mode; the cache index lives in memory.
//!
//! ## Admission
//!
//! Each volume must pass the filesystem check (free bytes, free inodes,
//! writability) to join its tier's rotation. A volume that fails it but
//! still holds blocks stays readable and can be readmitted later. Fewer
//! than half of a tier's volumes admitted aborts startup.

mod admission;
mod engine;
mod recover;


pub use engine::{Engine, EngineDeps};
