//! # Volume
//!
//! One physical mount point of a tier: directory cursor, usage counters and
//! the raw write/read/delete primitives.
//!
//! ## Write protocol
//!
//! ```text
//! reserve_slot()          [volume lock] admission + select_dir + count++
//!   write_reserved()      [no lock]     compress, create_new, write, fsync
//!     ok  -> commit       [volume lock] block_count/bytes += file size
//!     err -> release      [volume lock] undo reservation, remove file
//! ```
//!
//! Counters only ever change under the volume lock, and only for completed
//! writes and deletes.

mod admission;
mod scan;
mod store;

#[cfg(test)]
mod tests;

pub(crate) use admission::check_filesystem;
pub use scan::ScannedBlock;
pub use store::{SlotReservation, Volume, VolumeUsage};
