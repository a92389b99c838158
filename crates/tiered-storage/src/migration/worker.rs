use super::state::{TickReport, WorkerState};
use crate::domain::errors::StorageError;
use crate::domain::records::{BlockWhereRecord, UnmovedBlockRecord};
use crate::domain::tiering::TierKind;
use crate::metadata::MetadataStore;
use crate::ports::outbound::TimeSource;
use crate::tier::{ColdTier, DiskTier};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Queue entries handled per tick at most.
pub const DEFAULT_MIGRATION_BATCH: usize = 10_000;

/// A due block whose file has been copied (or failed to copy) to cold.
struct MoveResult {
    entry: UnmovedBlockRecord,
    cold_path: Result<String, StorageError>,
}

pub struct MigrationWorker {
    metadata: Arc<MetadataStore>,
    cold: Arc<ColdTier>,
    hot: Option<Arc<DiskTier>>,
    warm: Option<Arc<DiskTier>>,
    time: Arc<dyn TimeSource>,
    batch_limit: usize,
    state: RwLock<WorkerState>,
}

impl MigrationWorker {
    pub fn new(
        metadata: Arc<MetadataStore>,
        cold: Arc<ColdTier>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            metadata,
            cold,
            hot: None,
            warm: None,
            time,
            batch_limit: DEFAULT_MIGRATION_BATCH,
            state: RwLock::new(WorkerState::Idle),
        }
    }

    /// Local tier whose copies are removed after migration with `delete_local`.
    pub fn with_local_tier(mut self, tier: Arc<DiskTier>) -> Self {
        match tier.kind() {
            TierKind::Hot => self.hot = Some(tier),
            TierKind::Warm => self.warm = Some(tier),
            TierKind::Cold => {}
        }
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
    }

    fn local_tier(&self, kind: TierKind) -> Option<&Arc<DiskTier>> {
        match kind {
            TierKind::Hot => self.hot.as_ref(),
            TierKind::Warm => self.warm.as_ref(),
            TierKind::Cold => None,
        }
    }

    // =========================================================================
    // LOOP
    // =========================================================================

    /// Tick every poll interval until `shutdown` changes or its sender is
    /// dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.cold.poll_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "[migration] worker started: every {:?}, concurrency {}, delete_local {}",
            period,
            self.cold.migration_concurrency(),
            self.cold.delete_local()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("[migration] shutdown signal received");
                    break;
                }
            }
        }
    }

    /// One full pass over the due part of the migration queue.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        self.set_state(WorkerState::Scanning);
        let poll_nanos = u64::try_from(self.cold.poll_interval().as_nanos()).unwrap_or(u64::MAX);
        let cutoff = self.time.now_nanos().saturating_sub(poll_nanos);

        let entries = match self.metadata.unmoved_until(cutoff, self.batch_limit) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("[migration] queue scan failed: {}", e);
                self.set_state(WorkerState::Idle);
                return report;
            }
        };
        report.scanned = entries.len();

        let mut due = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.resolve(entry) {
                Ok(Some(job)) => due.push(job),
                Ok(None) => report.dropped += 1,
                Err(e) => {
                    tracing::error!("[migration] {}", e);
                    report.failed += 1;
                }
            }
        }

        self.set_state(WorkerState::Moving);
        let moved = self.move_all(due, &mut report).await;

        self.set_state(WorkerState::Updating);
        for result in moved {
            let hash = result.entry.hash.clone();
            match self.apply(result) {
                Ok(true) => report.migrated += 1,
                Ok(false) => report.dropped += 1,
                Err(e) => {
                    tracing::error!("[migration] {} not migrated: {}", hash, e);
                    report.failed += 1;
                }
            }
        }
        self.cold.readmit_backends();

        self.set_state(WorkerState::Idle);
        if report.scanned > 0 {
            tracing::info!(
                "[migration] tick done: {} due, {} migrated, {} dropped, {} failed",
                report.scanned,
                report.migrated,
                report.dropped,
                report.failed
            );
        }
        report
    }

    /// Load the record behind a queue entry.
    ///
    /// Entries without a record, or whose block is already cold, are
    /// finished here and yield `None`.
    fn resolve(
        &self,
        entry: UnmovedBlockRecord,
    ) -> Result<Option<(UnmovedBlockRecord, BlockWhereRecord, PathBuf)>, StorageError> {
        let Some(record) = self.metadata.get(&entry.hash)? else {
            tracing::warn!("[migration] {} has no location record, dropping", entry.hash);
            self.metadata.dequeue(&entry)?;
            return Ok(None);
        };

        if record.is_in(TierKind::Cold) {
            tracing::debug!("[migration] {} is already cold", entry.hash);
            self.finish(&entry, record)?;
            return Ok(None);
        }

        match record.local_path() {
            Some(path) => {
                let path = path.to_path_buf();
                Ok(Some((entry, record, path)))
            }
            None => {
                tracing::warn!("[migration] {} has no local copy, dropping", entry.hash);
                self.metadata.dequeue(&entry)?;
                Ok(None)
            }
        }
    }

    /// Copy every due block to cold storage, `migration_concurrency` at a time.
    async fn move_all(
        &self,
        due: Vec<(UnmovedBlockRecord, BlockWhereRecord, PathBuf)>,
        report: &mut TickReport,
    ) -> Vec<MoveResult> {
        let permits = Arc::new(Semaphore::new(self.cold.migration_concurrency()));
        let mut tasks = JoinSet::new();

        for (entry, record, local_path) in due {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let cold = Arc::clone(&self.cold);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let cold_path = cold.move_block(&record.hash, &local_path);
                MoveResult { entry, cold_path }
            });
        }

        let mut moved = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => moved.push(result),
                Err(e) => {
                    tracing::error!("[migration] move task failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        moved
    }

    /// Record the cold copy on the current record.
    ///
    /// A block deleted while its copy was in flight stays deleted: the copy
    /// is removed and `false` returned.
    fn apply(&self, result: MoveResult) -> Result<bool, StorageError> {
        let MoveResult { entry, cold_path } = result;
        let cold_path = cold_path?;

        let updated = self
            .metadata
            .update(&entry.hash, |record| record.set_cold(cold_path.clone()))?;

        let Some(record) = updated else {
            tracing::info!(
                "[migration] {} was deleted during its move, discarding cold copy",
                entry.hash
            );
            let mut orphan = BlockWhereRecord::cold(entry.hash.as_str(), cold_path);
            if let Err(e) = self.cold.delete(&mut orphan) {
                tracing::warn!("[migration] cold copy of {} not removed: {}", entry.hash, e);
            }
            self.metadata.dequeue(&entry)?;
            return Ok(false);
        };

        tracing::debug!("[migration] {} moved to cold", record.hash);
        self.finish(&entry, record)?;
        Ok(true)
    }

    /// Drop the local copy if configured, then remove the queue entry.
    fn finish(
        &self,
        entry: &UnmovedBlockRecord,
        mut record: BlockWhereRecord,
    ) -> Result<(), StorageError> {
        if self.cold.delete_local() {
            if let Some(kind) = record.tiering.local_tier() {
                match self.local_tier(kind) {
                    Some(tier) => {
                        tier.delete(&mut record)?;
                        self.metadata.put(&record)?;
                    }
                    None => tracing::warn!(
                        "[migration] {} is on {} tier which is not configured, keeping it",
                        record.hash,
                        kind
                    ),
                }
            }
        }
        self.metadata.dequeue(entry)
    }
}

impl std::fmt::Debug for MigrationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationWorker")
            .field("state", &self.state())
            .field("batch_limit", &self.batch_limit)
            .finish()
    }
}
