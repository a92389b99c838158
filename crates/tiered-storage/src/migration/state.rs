use std::fmt;

/// Phase of the current migration tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    /// Reading due entries from the migration queue.
    Scanning,
    /// Copying block files to cold backends.
    Moving,
    /// Persisting location records and removing queue entries.
    Updating,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Scanning => "scanning",
            WorkerState::Moving => "moving",
            WorkerState::Updating => "updating",
        };
        f.write_str(name)
    }
}

/// Outcome counts of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Due queue entries read.
    pub scanned: usize,
    /// Blocks copied to cold storage and recorded.
    pub migrated: usize,
    /// Entries removed without a move (orphaned or already cold).
    pub dropped: usize,
    /// Entries left in the queue for the next tick.
    pub failed: usize,
}
