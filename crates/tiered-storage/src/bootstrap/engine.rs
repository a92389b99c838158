use super::admission::{enforce_threshold, prepare, Prepared};
use super::recover::{reindex_cold, reindex_local};
use crate::adapters::cold::ColdDisk;
use crate::adapters::filesystem::StatvfsFileSystemAdapter;
use crate::adapters::infra::SystemTimeSource;
use crate::adapters::lock::{MetaDirLock, DEFAULT_LOCK_TIMEOUT};
use crate::domain::compression::{BlockCompressor, ZlibCompressor};
use crate::domain::errors::StorageError;
use crate::domain::layout::DirLayout;
use crate::domain::strategy::SizeMetric;
use crate::domain::tiering::TierKind;
use crate::domain::types::{
    BootMode, CacheConfig, ColdTierConfig, DiskTierConfig, EngineConfig, VolumeConfig,
};
use crate::metadata::MetadataStore;
use crate::migration::MigrationWorker;
use crate::ports::outbound::{ColdStorage, FileSystemAdapter, TimeSource};
use crate::service::SmartStore;
use crate::tier::{CacheTier, ColdTier, DiskTier};
use crate::volume::Volume;
use std::sync::Arc;
use std::time::Duration;

/// Environment the engine runs against.
#[derive(Clone)]
pub struct EngineDeps {
    pub fs: Arc<dyn FileSystemAdapter>,
    pub time: Arc<dyn TimeSource>,
    pub compressor: Arc<dyn BlockCompressor>,
    pub lock_timeout: Duration,
}

impl Default for EngineDeps {
    fn default() -> Self {
        Self {
            fs: Arc::new(StatvfsFileSystemAdapter),
            time: Arc::new(SystemTimeSource),
            compressor: Arc::new(ZlibCompressor::best()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl EngineDeps {
    pub fn with_fs(mut self, fs: Arc<dyn FileSystemAdapter>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_time(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn BlockCompressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

/// A booted storage engine.
///
/// Holds the metadata directory lock until dropped.
pub struct Engine {
    config: EngineConfig,
    time: Arc<dyn TimeSource>,
    metadata: Arc<MetadataStore>,
    hot: Option<Arc<DiskTier>>,
    warm: Option<Arc<DiskTier>>,
    cold: Option<Arc<ColdTier>>,
    cache: Option<Arc<CacheTier>>,
    store: Arc<SmartStore>,
    _lock: MetaDirLock,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self, StorageError> {
        Self::open_with(config, EngineDeps::default())
    }

    pub fn open_with(config: EngineConfig, deps: EngineDeps) -> Result<Self, StorageError> {
        config.validate()?;
        let mode = config.mode;
        if matches!(mode, BootMode::Repair | BootMode::RepairAndRecover) {
            return Err(StorageError::UnsupportedMode {
                mode: mode.as_str().to_string(),
            });
        }

        tracing::info!(
            "[bootstrap] booting in {} mode, storage type {}",
            mode.as_str(),
            config.storage_type
        );

        let lock = MetaDirLock::acquire_with_timeout(&config.meta_dir, deps.lock_timeout)?;
        if mode == BootMode::Start {
            MetadataStore::remove_files(&config.meta_dir)?;
        }
        let metadata = Arc::new(MetadataStore::open(&config.meta_dir)?);

        let boot = Boot {
            config: &config,
            deps: &deps,
            metadata: &metadata,
        };

        // Cold first, so recovered local blocks already know their cold copies.
        let cold = match (&config.cold, config.storage_type.uses_cold()) {
            (Some(cold), true) => Some(Arc::new(boot.cold_tier(cold)?)),
            _ => None,
        };
        let hot = match (&config.hot, config.storage_type.uses_hot()) {
            (Some(hot), true) => Some(Arc::new(boot.disk_tier(TierKind::Hot, hot)?)),
            _ => None,
        };
        let warm = match (&config.warm, config.storage_type.uses_warm()) {
            (Some(warm), true) => Some(Arc::new(boot.disk_tier(TierKind::Warm, warm)?)),
            _ => None,
        };
        let cache = match &config.cache {
            Some(cache) => Some(Arc::new(boot.cache_tier(cache)?)),
            None => None,
        };

        let mut store = SmartStore::new(config.storage_type, metadata.clone());
        if let Some(tier) = &hot {
            store = store.with_hot(tier.clone());
        }
        if let Some(tier) = &warm {
            store = store.with_warm(tier.clone());
        }
        if let Some(tier) = &cold {
            store = store.with_cold(tier.clone());
        }
        if let Some(tier) = &cache {
            store = store.with_cache(tier.clone());
        }

        tracing::info!("[bootstrap] engine ready ({})", config.storage_type);

        Ok(Self {
            time: deps.time.clone(),
            config,
            metadata,
            hot,
            warm,
            cold,
            cache,
            store: Arc::new(store),
            _lock: lock,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<SmartStore> {
        Arc::clone(&self.store)
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn hot(&self) -> Option<&Arc<DiskTier>> {
        self.hot.as_ref()
    }

    pub fn warm(&self) -> Option<&Arc<DiskTier>> {
        self.warm.as_ref()
    }

    pub fn cold(&self) -> Option<&Arc<ColdTier>> {
        self.cold.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<CacheTier>> {
        self.cache.as_ref()
    }

    /// Worker that moves aged local blocks to the cold tier.
    ///
    /// `None` unless the storage type includes Cold.
    pub fn migration_worker(&self) -> Option<MigrationWorker> {
        let cold = self.cold.as_ref()?;
        let mut worker =
            MigrationWorker::new(self.metadata.clone(), cold.clone(), self.time.clone());
        for tier in self.hot.iter().chain(self.warm.iter()) {
            worker = worker.with_local_tier(tier.clone());
        }
        Some(worker)
    }

    /// Return evicted volumes and backends that pass admission again.
    pub fn readmit(&self) -> usize {
        let local: usize = self
            .hot
            .iter()
            .chain(self.warm.iter())
            .map(|tier| tier.readmit_volumes())
            .sum();
        local + self.cold.as_ref().map_or(0, |cold| cold.readmit_backends())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.config.mode)
            .field("storage_type", &self.config.storage_type)
            .field("meta_dir", &self.config.meta_dir)
            .finish()
    }
}

// =============================================================================
// TIER ASSEMBLY
// =============================================================================

struct Boot<'a> {
    config: &'a EngineConfig,
    deps: &'a EngineDeps,
    metadata: &'a Arc<MetadataStore>,
}

impl Boot<'_> {
    fn volume(&self, config: &VolumeConfig, layout: DirLayout) -> Volume {
        Volume::new(
            &config.path,
            layout,
            config.limits(),
            self.deps.fs.clone(),
            self.deps.compressor.clone(),
        )
    }

    fn prepare(&self, volume: &Volume, mode: BootMode) -> Option<Prepared> {
        match prepare(volume, mode, self.config.min_free_bytes, self.deps.fs.as_ref()) {
            Ok(prepared) => Some(prepared),
            Err(rejection) => {
                tracing::warn!(
                    "[bootstrap] volume {} dropped: {}",
                    volume.root().display(),
                    rejection
                );
                None
            }
        }
    }

    fn disk_tier(&self, kind: TierKind, config: &DiskTierConfig) -> Result<DiskTier, StorageError> {
        let (layout, metric) = match kind {
            TierKind::Hot => (DirLayout::HOT, SizeMetric::AvailableBytes),
            _ => (DirLayout::WARM, SizeMetric::UsedBytes),
        };
        let strategy = config.placement(metric)?;
        let cold_eligible = self.config.storage_type.uses_cold();
        let mode = self.config.mode;

        let mut active = Vec::new();
        let mut standby = Vec::new();
        for volume_config in &config.volumes {
            let volume = self.volume(volume_config, layout);
            let Some(prepared) = self.prepare(&volume, mode) else {
                continue;
            };

            if mode == BootMode::Recover {
                let indexed =
                    reindex_local(kind, &prepared.blocks, self.metadata, cold_eligible)?;
                tracing::info!(
                    "[bootstrap] recovered {} blocks on {} volume {}",
                    indexed,
                    kind,
                    volume.root().display()
                );
            }

            match prepared.admission {
                None => active.push(Arc::new(volume)),
                Some(failure) => {
                    tracing::warn!(
                        "[bootstrap] {} volume {} not admitted: {}",
                        kind,
                        volume.root().display(),
                        failure
                    );
                    standby.push(Arc::new(volume));
                }
            }
        }

        enforce_threshold(kind.as_str(), active.len(), config.volumes.len())?;
        tracing::info!(
            "[bootstrap] {} tier: {} of {} volumes admitted, strategy {:?}",
            kind,
            active.len(),
            config.volumes.len(),
            strategy
        );

        Ok(DiskTier::new(
            kind,
            strategy,
            active,
            self.metadata.clone(),
            self.deps.time.clone(),
        )
        .with_cold_migration(cold_eligible)
        .with_standby_volumes(standby))
    }

    fn cold_tier(&self, config: &ColdTierConfig) -> Result<ColdTier, StorageError> {
        let strategy = config.placement()?;
        let mode = self.config.mode;

        let mut active: Vec<Arc<dyn ColdStorage>> = Vec::new();
        let mut standby: Vec<Arc<dyn ColdStorage>> = Vec::new();
        for volume_config in &config.volumes {
            let disk = ColdDisk::new(
                &volume_config.path,
                volume_config.limits(),
                self.deps.fs.clone(),
                self.deps.compressor.clone(),
            );
            let Some(prepared) = self.prepare(disk.volume(), mode) else {
                continue;
            };

            if mode == BootMode::Recover {
                let indexed = reindex_cold(&prepared.blocks, self.metadata)?;
                tracing::info!(
                    "[bootstrap] recovered {} blocks on cold volume {}",
                    indexed,
                    volume_config.path.display()
                );
            }

            let backend: Arc<dyn ColdStorage> = Arc::new(disk);
            match prepared.admission {
                None => active.push(backend),
                Some(failure) => {
                    tracing::warn!(
                        "[bootstrap] cold volume {} not admitted: {}",
                        volume_config.path.display(),
                        failure
                    );
                    standby.push(backend);
                }
            }
        }

        enforce_threshold("cold", active.len(), config.volumes.len())?;
        tracing::info!(
            "[bootstrap] cold tier: {} of {} volumes admitted, migrating after {:?}",
            active.len(),
            config.volumes.len(),
            config.poll_interval()
        );

        Ok(ColdTier::new(strategy, active, self.metadata.clone())
            .with_standby_backends(standby)
            .with_poll_interval(config.poll_interval())
            .with_delete_local(config.delete_local)
            .with_migration_concurrency(config.migration_concurrency))
    }

    fn cache_tier(&self, config: &CacheConfig) -> Result<CacheTier, StorageError> {
        let strategy = config.placement()?;

        let mut admitted = Vec::new();
        for volume_config in &config.volumes {
            let volume = self.volume(volume_config, DirLayout::CACHE);
            let Some(prepared) = self.prepare(&volume, BootMode::Start) else {
                continue;
            };
            match prepared.admission {
                None => admitted.push(Arc::new(volume)),
                Some(failure) => tracing::warn!(
                    "[bootstrap] cache volume {} not admitted: {}",
                    volume.root().display(),
                    failure
                ),
            }
        }

        enforce_threshold("cache", admitted.len(), config.volumes.len())?;
        tracing::info!(
            "[bootstrap] cache: {} of {} volumes admitted, {:?}",
            admitted.len(),
            config.volumes.len(),
            config.cache_write
        );

        Ok(CacheTier::new(config.cache_write, strategy, admitted))
    }
}
