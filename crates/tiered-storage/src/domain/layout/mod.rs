//! # Directory Layout
//!
//! K/dir sharding of block files inside a volume:
//!
//! ```text
//! {volume_root}/{prefix}{k}/{dir}/{hash}.dat      0 <= k, dir < DCL
//! {volume_root}/index.state                        "{k}\n{dir}"
//! ```
//!
//! Each leaf directory holds at most `DCL` block files, so a volume holds at
//! most `DCL^3` blocks before the K index wraps around.

mod cursor;
mod paths;


pub use cursor::DirCursor;
pub use paths::{block_file_name, hash_from_file_name, volume_root_of, DirLayout};

/// Extension of every block file.
pub const BLOCK_FILE_EXT: &str = "dat";

/// Name of the persisted cursor file at the root of a volume.
pub const INDEX_STATE_FILE: &str = "index.state";
