//! # Metadata Store
//!
//! Location index and migration queue, kept in two key-value databases.
//!
//! | File     | Bucket | Contents                                  |
//! |----------|--------|-------------------------------------------|
//! | `bmr.db` | `bwb`  | hash -> `BlockWhereRecord` (JSON)         |
//! | `bmr.db` | `bub`  | access usage (created, not yet populated) |
//! | `qmr.db` | `ubb`  | `{nanos:020}:{hash}` -> hash              |
//!
//! Every operation is atomic on its own key. There is no transaction
//! spanning the location index and the queue; recovery and the migration
//! worker reconcile the two.

mod store;


pub use store::{
    MetadataStore, BLOCK_DB_FILE, BLOCK_USAGE_BUCKET, BLOCK_WHERE_BUCKET, QUERY_DB_FILE,
    UNMOVED_BLOCK_BUCKET,
};
