use crate::domain::errors::{ConfigError, StorageError};
use crate::domain::records::security::validate_block_hash;
use crate::domain::records::BlockWhereRecord;
use crate::domain::tiering::TierKind;
use crate::domain::types::{CacheWritePolicy, TieringMode};
use crate::metadata::MetadataStore;
use crate::ports::inbound::BlockStoreApi;
use crate::tier::{CacheTier, ColdTier, DiskTier};
use std::path::PathBuf;
use std::sync::Arc;

pub struct SmartStore {
    mode: TieringMode,
    metadata: Arc<MetadataStore>,
    hot: Option<Arc<DiskTier>>,
    warm: Option<Arc<DiskTier>>,
    cold: Option<Arc<ColdTier>>,
    cache: Option<Arc<CacheTier>>,
}

impl SmartStore {
    pub fn new(mode: TieringMode, metadata: Arc<MetadataStore>) -> Self {
        Self {
            mode,
            metadata,
            hot: None,
            warm: None,
            cold: None,
            cache: None,
        }
    }

    pub fn with_hot(mut self, tier: Arc<DiskTier>) -> Self {
        self.hot = Some(tier);
        self
    }

    pub fn with_warm(mut self, tier: Arc<DiskTier>) -> Self {
        self.warm = Some(tier);
        self
    }

    pub fn with_cold(mut self, tier: Arc<ColdTier>) -> Self {
        self.cold = Some(tier);
        self
    }

    pub fn with_cache(mut self, cache: Arc<CacheTier>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn mode(&self) -> TieringMode {
        self.mode
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    fn local_tier(&self, kind: TierKind) -> Option<&Arc<DiskTier>> {
        match kind {
            TierKind::Hot if self.mode.uses_hot() => self.hot.as_ref(),
            TierKind::Warm if self.mode.uses_warm() => self.warm.as_ref(),
            _ => None,
        }
    }

    fn require_local(&self, kind: TierKind) -> Result<&Arc<DiskTier>, StorageError> {
        self.local_tier(kind).ok_or(StorageError::Config(
            ConfigError::MissingTierConfig {
                tier: kind.as_str(),
            },
        ))
    }

    fn cold_tier(&self) -> Option<&Arc<ColdTier>> {
        if self.mode.uses_cold() {
            self.cold.as_ref()
        } else {
            None
        }
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Write to the durable tiers of the mode, bypassing the cache.
    fn write_durable(&self, hash: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        if let Some(record) = self.metadata.get(hash)? {
            if let Some(path) = record.local_path().filter(|p| p.is_file()) {
                return Ok(path.to_path_buf());
            }
        }

        match self.mode {
            TieringMode::Hot | TieringMode::HotAndCold => {
                self.require_local(TierKind::Hot)?.write(hash, data)
            }
            TieringMode::Warm | TieringMode::WarmAndCold => {
                self.require_local(TierKind::Warm)?.write(hash, data)
            }
            TieringMode::HotAndWarm | TieringMode::HotWarmAndCold => {
                match self.require_local(TierKind::Hot)?.write(hash, data) {
                    Err(e) if e.is_capacity() => {
                        tracing::warn!("[smart-store] hot tier full, writing {} to warm: {}", hash, e);
                        self.require_local(TierKind::Warm)?.write(hash, data)
                    }
                    other => other,
                }
            }
        }
    }

    /// Push blocks held only by the write-back cache to the durable tiers.
    ///
    /// Returns how many blocks were flushed. Blocks that fail stay dirty.
    pub fn flush_write_back(&self) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };

        let mut flushed = 0;
        for hash in cache.dirty_hashes() {
            let Some(data) = cache.read(&hash) else {
                tracing::error!("[smart-store] dirty block {} lost from cache", hash);
                continue;
            };
            match self.write_durable(&hash, &data) {
                Ok(_) => {
                    cache.mark_clean(&hash);
                    flushed += 1;
                }
                Err(e) => tracing::error!("[smart-store] flush of {} failed: {}", hash, e),
            }
        }

        if flushed > 0 {
            tracing::info!("[smart-store] flushed {} write-back blocks", flushed);
        }
        flushed
    }

    // =========================================================================
    // READ
    // =========================================================================

    fn read_durable(&self, record: BlockWhereRecord) -> Result<Vec<u8>, StorageError> {
        let hash = record.hash.clone();
        let not_found = || StorageError::BlockNotFound { hash: hash.clone() };

        let local = record
            .tiering
            .local_tier()
            .and_then(|kind| self.local_tier(kind));

        if let Some(tier) = local {
            match tier.read(&record) {
                Ok(data) => return Ok(data),
                Err(e @ StorageError::BlockNotFound { .. })
                | Err(e @ StorageError::Inconsistent { .. }) => {
                    tracing::warn!("[smart-store] local copy of {} unusable: {}", hash, e);
                }
                Err(e) => return Err(e),
            }
        }

        if record.is_in(TierKind::Cold) {
            let cold = self.cold_tier().ok_or(StorageError::Config(
                ConfigError::MissingTierConfig { tier: "cold" },
            ))?;
            return cold.read(&record);
        }

        let Some(tier) = local else {
            return Err(not_found());
        };
        if let Some(repaired) = tier.relocate(&hash)? {
            return tier.read(&repaired);
        }

        tracing::warn!("[smart-store] removing dangling record of {}", hash);
        self.metadata.delete(&hash)?;
        Err(not_found())
    }

    fn fill_cache(&self, hash: &str, data: &[u8]) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.write(hash, data, false) {
                tracing::debug!("[smart-store] not caching {}: {}", hash, e);
            }
        }
    }
}

impl BlockStoreApi for SmartStore {
    fn write(&self, hash: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        validate_block_hash(hash)?;

        let Some(cache) = &self.cache else {
            return self.write_durable(hash, data);
        };

        match cache.policy() {
            CacheWritePolicy::WriteThrough => {
                let path = self.write_durable(hash, data)?;
                self.fill_cache(hash, data);
                Ok(path)
            }
            CacheWritePolicy::WriteBack => match cache.write(hash, data, true) {
                Ok(path) => Ok(path),
                Err(e) => {
                    tracing::warn!("[smart-store] cache refused {}, writing through: {}", hash, e);
                    self.write_durable(hash, data)
                }
            },
        }
    }

    fn read(&self, hash: &str, round_hint: Option<u64>) -> Result<Vec<u8>, StorageError> {
        validate_block_hash(hash)?;

        if let Some(data) = self.cache.as_ref().and_then(|c| c.read(hash)) {
            return Ok(data);
        }

        let record = self
            .metadata
            .get(hash)?
            .ok_or_else(|| StorageError::BlockNotFound {
                hash: hash.to_string(),
            })?;

        match round_hint {
            Some(round) => tracing::debug!("[smart-store] read {} (round {})", hash, round),
            None => tracing::debug!("[smart-store] read {}", hash),
        }

        let data = self.read_durable(record)?;
        self.fill_cache(hash, &data);
        Ok(data)
    }

    fn delete(&self, hash: &str) -> Result<(), StorageError> {
        validate_block_hash(hash)?;

        let cached = self.cache.as_ref().is_some_and(|c| c.delete(hash));
        let Some(mut record) = self.metadata.get(hash)? else {
            if cached {
                return Ok(());
            }
            return Err(StorageError::BlockNotFound {
                hash: hash.to_string(),
            });
        };

        for kind in [TierKind::Hot, TierKind::Warm] {
            if let Some(tier) = self.local_tier(kind) {
                tier.delete(&mut record)?;
            }
        }
        self.metadata.delete(hash)?;

        tracing::debug!("[smart-store] deleted {}", hash);
        Ok(())
    }
}

impl std::fmt::Debug for SmartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartStore")
            .field("mode", &self.mode)
            .field("cache", &self.cache.as_ref().map(|c| c.policy()))
            .finish()
    }
}
