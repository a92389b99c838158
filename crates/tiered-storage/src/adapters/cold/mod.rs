//! Cold Storage Adapters
//!
//! Implementations of the `ColdStorage` trait.

mod disk;

pub use disk::ColdDisk;
