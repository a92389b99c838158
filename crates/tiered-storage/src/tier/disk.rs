use super::rotation::Rotation;
use crate::domain::errors::StorageError;
use crate::domain::records::security::validate_block_hash;
use crate::domain::records::{BlockWhereRecord, UnmovedBlockRecord};
use crate::domain::strategy::{PlacementStrategy, Selection};
use crate::domain::tiering::TierKind;
use crate::metadata::MetadataStore;
use crate::ports::outbound::TimeSource;
use crate::volume::{SlotReservation, Volume};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A Hot or Warm tier: volumes in rotation plus the location index.
pub struct DiskTier {
    kind: TierKind,
    strategy: PlacementStrategy,
    rotation: Mutex<Rotation<Volume>>,
    metadata: Arc<MetadataStore>,
    time: Arc<dyn TimeSource>,
    /// Blocks written here are queued for cold migration.
    cold_eligible: bool,
}

impl DiskTier {
    pub fn new(
        kind: TierKind,
        strategy: PlacementStrategy,
        volumes: Vec<Arc<Volume>>,
        metadata: Arc<MetadataStore>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            kind,
            strategy,
            rotation: Mutex::new(Rotation::new(volumes)),
            metadata,
            time,
            cold_eligible: false,
        }
    }

    pub fn with_cold_migration(mut self, enabled: bool) -> Self {
        self.cold_eligible = enabled;
        self
    }

    /// Volumes that hold blocks but start out of rotation.
    pub fn with_standby_volumes(self, volumes: Vec<Arc<Volume>>) -> Self {
        {
            let mut rotation = self.rotation.lock();
            for volume in volumes {
                rotation.pool.park(volume);
            }
        }
        self
    }

    /// Deterministic strategy randomness, for tests.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        self.rotation.lock().reseed(seed);
        self
    }

    pub fn kind(&self) -> TierKind {
        self.kind
    }

    pub fn strategy(&self) -> PlacementStrategy {
        self.strategy
    }

    pub fn is_cold_eligible(&self) -> bool {
        self.cold_eligible
    }

    fn tag(&self) -> &'static str {
        match self.kind {
            TierKind::Hot => "[hot-tier]",
            TierKind::Warm => "[warm-tier]",
            TierKind::Cold => "[cold-tier]",
        }
    }

    /// Every volume of the tier, in rotation or evicted.
    pub fn volumes(&self) -> Vec<Arc<Volume>> {
        self.rotation.lock().all()
    }

    /// Volumes currently in rotation.
    pub fn active_volumes(&self) -> Vec<Arc<Volume>> {
        self.rotation.lock().pool.active().to_vec()
    }

    /// Put evicted volumes that pass admission again back in rotation.
    pub fn readmit_volumes(&self) -> usize {
        self.rotation.lock().pool.readmit()
    }

    fn volume_for(&self, path: &Path) -> Option<Arc<Volume>> {
        self.rotation.lock().find(|v| v.contains(path))
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Store a block and index it.
    ///
    /// Writing a block this tier already holds returns the existing path.
    pub fn write(&self, hash: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        validate_block_hash(hash)?;

        let previous = self.metadata.get(hash)?;
        if let Some(path) = previous.as_ref().and_then(|r| self.existing_copy(r)) {
            tracing::debug!("{} {} already stored at {}", self.tag(), hash, path.display());
            return Ok(path);
        }

        let (volume, path) = self.place(hash, data)?;
        self.index(hash, &volume, &path, previous)?;

        tracing::debug!("{} stored {} at {}", self.tag(), hash, path.display());
        Ok(path)
    }

    fn existing_copy(&self, record: &BlockWhereRecord) -> Option<PathBuf> {
        if !record.is_in(self.kind) {
            return None;
        }
        record.block_path.clone().filter(|p| p.is_file())
    }

    fn select(&self) -> Result<Selection<Volume, SlotReservation>, StorageError> {
        self.rotation
            .lock()
            .select(self.strategy)
            .ok_or(StorageError::NoVolumeAvailable { tier: self.kind })
    }

    /// Write into the selected volume, evicting volumes that fail with I/O
    /// errors and retrying on the next one.
    fn place(&self, hash: &str, data: &[u8]) -> Result<(Arc<Volume>, PathBuf), StorageError> {
        loop {
            let Selection {
                candidate,
                reservation,
                ..
            } = self.select()?;

            match candidate.write_reserved(reservation, hash, data) {
                Ok(path) => return Ok((candidate, path)),
                Err(e @ StorageError::Io { .. }) => {
                    tracing::warn!(
                        "{} write to {} failed, evicting: {}",
                        self.tag(),
                        candidate.root().display(),
                        e
                    );
                    self.rotation.lock().pool.evict(&candidate);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Upsert the location record and queue entry, undoing the write if
    /// either fails.
    fn index(
        &self,
        hash: &str,
        volume: &Volume,
        path: &Path,
        previous: Option<BlockWhereRecord>,
    ) -> Result<(), StorageError> {
        let mut record = previous
            .clone()
            .unwrap_or_else(|| BlockWhereRecord::local(hash, self.kind, path));
        record.set_local(self.kind, path);

        if let Err(e) = self.metadata.put(&record) {
            self.discard(volume, hash, path);
            return Err(e);
        }

        if self.cold_eligible && !record.is_in(TierKind::Cold) {
            let entry = UnmovedBlockRecord::new(self.time.now_nanos(), hash);
            if let Err(e) = self.metadata.enqueue(&entry) {
                let restored = match &previous {
                    Some(old) => self.metadata.put(old),
                    None => self.metadata.delete(hash),
                };
                if let Err(restore_error) = restored {
                    tracing::error!(
                        "{} could not roll back record of {}: {}",
                        self.tag(),
                        hash,
                        restore_error
                    );
                }
                self.discard(volume, hash, path);
                return Err(e);
            }
        }
        Ok(())
    }

    fn discard(&self, volume: &Volume, hash: &str, path: &Path) {
        match volume.delete(hash, path) {
            Ok(()) => tracing::warn!("{} rolled back {}", self.tag(), path.display()),
            Err(e) => tracing::error!(
                "{} could not roll back {}: {}",
                self.tag(),
                path.display(),
                e
            ),
        }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Read the local copy a record points at.
    pub fn read(&self, record: &BlockWhereRecord) -> Result<Vec<u8>, StorageError> {
        let path = self.local_path(record)?;
        let volume = self
            .volume_for(path)
            .ok_or_else(|| StorageError::Inconsistent {
                hash: record.hash.clone(),
                message: format!("{} is not on a {} volume", path.display(), self.kind),
            })?;
        volume.read(&record.hash, path)
    }

    fn local_path<'a>(&self, record: &'a BlockWhereRecord) -> Result<&'a Path, StorageError> {
        if !record.is_in(self.kind) {
            return Err(StorageError::BlockNotFound {
                hash: record.hash.clone(),
            });
        }
        record
            .block_path
            .as_deref()
            .ok_or_else(|| StorageError::Inconsistent {
                hash: record.hash.clone(),
                message: format!("{} bit set without a path", self.kind),
            })
    }

    /// Search every volume for the block file and point the record at it.
    ///
    /// Returns the repaired record, or `None` if no volume holds the file.
    pub fn relocate(&self, hash: &str) -> Result<Option<BlockWhereRecord>, StorageError> {
        for volume in self.volumes() {
            let Some(path) = volume.find(hash)? else {
                continue;
            };

            let mut record = self
                .metadata
                .get(hash)?
                .unwrap_or_else(|| BlockWhereRecord::local(hash, self.kind, &path));
            record.set_local(self.kind, &path);
            self.metadata.put(&record)?;

            tracing::warn!(
                "{} repaired location of {}: {}",
                self.tag(),
                hash,
                path.display()
            );
            return Ok(Some(record));
        }
        Ok(None)
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Remove this tier's copy and clear it from `record`.
    ///
    /// The caller persists or deletes the record. A file that is already
    /// gone is not an error.
    pub fn delete(&self, record: &mut BlockWhereRecord) -> Result<(), StorageError> {
        if !record.is_in(self.kind) {
            return Ok(());
        }

        if let Some(path) = record.block_path.as_deref() {
            match self.volume_for(path) {
                Some(volume) => match volume.delete(&record.hash, path) {
                    Ok(()) | Err(StorageError::BlockNotFound { .. }) => {}
                    Err(e) => return Err(e),
                },
                None => tracing::warn!(
                    "{} {} is not on a known volume, leaving it",
                    self.tag(),
                    path.display()
                ),
            }
        }

        record.tiering.remove(self.kind);
        record.block_path = None;
        Ok(())
    }
}

impl std::fmt::Debug for DiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskTier")
            .field("kind", &self.kind)
            .field("strategy", &self.strategy)
            .field("cold_eligible", &self.cold_eligible)
            .finish()
    }
}
