//! # Metadata Records
//!
//! Records persisted by the metadata store.
//!
//! - `BlockWhereRecord` - which tiers hold a block, and where
//! - `UnmovedBlockRecord` - migration queue entry, ordered by creation time

mod unmoved;
mod where_record;
pub mod security;

#[cfg(test)]
mod tests;

pub use unmoved::UnmovedBlockRecord;
pub use where_record::BlockWhereRecord;
