use super::rotation::Rotation;
use crate::domain::errors::StorageError;
use crate::domain::records::BlockWhereRecord;
use crate::domain::strategy::{PlacementCandidate, PlacementStrategy};
use crate::domain::tiering::TierKind;
use crate::domain::types::{DEFAULT_MIGRATION_CONCURRENCY, DEFAULT_POLL_INTERVAL_HOURS};
use crate::metadata::MetadataStore;
use crate::ports::outbound::ColdStorage;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

impl PlacementCandidate for dyn ColdStorage {
    type Reservation = ();

    fn reserve(&self) -> Option<()> {
        self.is_able_to_store_block().then_some(())
    }

    fn is_admissible(&self) -> bool {
        self.is_able_to_store_block()
    }

    fn used_bytes(&self) -> u64 {
        ColdStorage::used_bytes(self)
    }

    fn available_bytes(&self) -> u64 {
        ColdStorage::available_bytes(self)
    }

    fn block_count(&self) -> u64 {
        ColdStorage::block_count(self)
    }

    fn label(&self) -> String {
        self.id().to_string()
    }
}

/// The archival tier: cold backends in rotation plus migration settings.
pub struct ColdTier {
    strategy: PlacementStrategy,
    rotation: Mutex<Rotation<dyn ColdStorage>>,
    metadata: Arc<MetadataStore>,
    poll_interval: Duration,
    delete_local: bool,
    migration_concurrency: usize,
}

impl ColdTier {
    pub fn new(
        strategy: PlacementStrategy,
        backends: Vec<Arc<dyn ColdStorage>>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            strategy,
            rotation: Mutex::new(Rotation::new(backends)),
            metadata,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_HOURS * 3600),
            delete_local: false,
            migration_concurrency: DEFAULT_MIGRATION_CONCURRENCY,
        }
    }

    /// Backends that hold blocks but start out of rotation.
    pub fn with_standby_backends(self, backends: Vec<Arc<dyn ColdStorage>>) -> Self {
        {
            let mut rotation = self.rotation.lock();
            for backend in backends {
                rotation.pool.park(backend);
            }
        }
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_delete_local(mut self, delete_local: bool) -> Self {
        self.delete_local = delete_local;
        self
    }

    pub fn with_migration_concurrency(mut self, concurrency: usize) -> Self {
        self.migration_concurrency = concurrency.max(1);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn delete_local(&self) -> bool {
        self.delete_local
    }

    pub fn migration_concurrency(&self) -> usize {
        self.migration_concurrency
    }

    pub fn backends(&self) -> Vec<Arc<dyn ColdStorage>> {
        self.rotation.lock().all()
    }

    pub fn readmit_backends(&self) -> usize {
        self.rotation.lock().pool.readmit()
    }

    fn backend_for(&self, hash: &str, cold_path: &str) -> Result<Arc<dyn ColdStorage>, StorageError> {
        self.rotation
            .lock()
            .find(|b| b.owns(cold_path))
            .ok_or_else(|| StorageError::Inconsistent {
                hash: hash.to_string(),
                message: format!("no cold backend owns {}", cold_path),
            })
    }

    /// Copy a local block file to a cold backend.
    ///
    /// A backend that fails is evicted and the next one tried. Returns the
    /// cold path to record.
    pub fn move_block(&self, hash: &str, local_path: &Path) -> Result<String, StorageError> {
        loop {
            let backend = self
                .rotation
                .lock()
                .select(self.strategy)
                .map(|s| s.candidate)
                .ok_or(StorageError::NoColdStorageAvailable)?;

            match backend.move_block(hash, local_path) {
                Ok(cold_path) => return Ok(cold_path),
                Err(e @ StorageError::BlockNotFound { .. })
                | Err(e @ StorageError::InvalidHash { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "[cold-tier] {} failed to store {}, evicting: {}",
                        backend.id(),
                        hash,
                        e
                    );
                    self.rotation.lock().pool.evict(&backend);
                }
            }
        }
    }

    /// Read the cold copy a record points at.
    pub fn read(&self, record: &BlockWhereRecord) -> Result<Vec<u8>, StorageError> {
        let cold_path = cold_path_of(record)?;
        self.backend_for(&record.hash, cold_path)?
            .get_block(&record.hash, cold_path)
    }

    /// Read a block by hash.
    pub fn get_block(&self, hash: &str) -> Result<Vec<u8>, StorageError> {
        let record = self
            .metadata
            .get(hash)?
            .ok_or_else(|| StorageError::BlockNotFound {
                hash: hash.to_string(),
            })?;
        self.read(&record)
    }

    /// Read several blocks by hash, in order. Fails on the first missing one.
    pub fn get_blocks(&self, hashes: &[String]) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut located = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let record = self
                .metadata
                .get(hash)?
                .ok_or_else(|| StorageError::BlockNotFound { hash: hash.clone() })?;
            located.push((hash.clone(), cold_path_of(&record)?.to_string()));
        }

        // consecutive blocks on the same backend are fetched as one batch
        let mut blocks = Vec::with_capacity(hashes.len());
        let mut start = 0;
        while start < located.len() {
            let backend = self.backend_for(&located[start].0, &located[start].1)?;
            let end = located[start..]
                .iter()
                .position(|(_, path)| !backend.owns(path))
                .map_or(located.len(), |offset| start + offset);
            blocks.extend(backend.get_blocks(&located[start..end])?);
            start = end;
        }
        Ok(blocks)
    }

    /// Remove the cold copy and clear it from `record`. The caller persists
    /// the record.
    pub fn delete(&self, record: &mut BlockWhereRecord) -> Result<(), StorageError> {
        if !record.is_in(TierKind::Cold) {
            return Ok(());
        }
        if let Some(cold_path) = record.cold_path.as_deref() {
            match self
                .backend_for(&record.hash, cold_path)?
                .delete_block(&record.hash, cold_path)
            {
                Ok(()) | Err(StorageError::BlockNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        record.tiering.remove(TierKind::Cold);
        record.cold_path = None;
        Ok(())
    }
}

fn cold_path_of(record: &BlockWhereRecord) -> Result<&str, StorageError> {
    if !record.is_in(TierKind::Cold) {
        return Err(StorageError::BlockNotFound {
            hash: record.hash.clone(),
        });
    }
    record
        .cold_path
        .as_deref()
        .ok_or_else(|| StorageError::Inconsistent {
            hash: record.hash.clone(),
            message: "cold bit set without a cold path".to_string(),
        })
}
