//! # Migration Worker
//!
//! Moves aged blocks from Hot/Warm into the cold tier.
//!
//! ```text
//! Idle --tick--> Scanning --> Moving --> Updating --> Idle
//!                 queue scan   copies to   records, local
//!                 up to cutoff cold, in    deletes, queue
//!                              parallel    removal
//! ```
//!
//! `cutoff = now - poll_interval`. A failed block keeps its queue entry and
//! is retried on the next tick. Cancellation is only observed between
//! ticks; a tick in progress always runs to completion.

mod state;
mod worker;

#[cfg(test)]
mod tests;

pub use state::{TickReport, WorkerState};
pub use worker::{MigrationWorker, DEFAULT_MIGRATION_BATCH};
