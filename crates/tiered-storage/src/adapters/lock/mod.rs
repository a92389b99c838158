//! # Metadata Directory Locking
//!
//! One engine per metadata directory. The lock is held for the lifetime of
//! the engine.
//!
//! ## Modules
//!
//! - `flock`: exclusive `LOCK` file using fs2
//! - `security`: stale lock detection and path checks

mod flock;
mod security;

pub use flock::{LockError, MetaDirLock};
pub use security::DEFAULT_LOCK_TIMEOUT;
