//! # Engine Configuration
//!
//! Deserialized from JSON. Quantity fields accept expressions
//! (see [`super::quantity`]).

use super::modes::{BootMode, CacheWritePolicy, TieringMode};
use super::quantity;
use super::security::{validate_unique_paths, validate_volume_path};
use crate::domain::errors::ConfigError;
use crate::domain::strategy::{PlacementStrategy, SizeMetric};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Free space a volume must have to be admitted at startup.
pub const DEFAULT_MIN_FREE_BYTES: u64 = 2 * GIB;

/// Age after which a block is migrated to Cold (30 days).
pub const DEFAULT_POLL_INTERVAL_HOURS: u64 = 720;

/// Concurrent per-block migration tasks.
pub const DEFAULT_MIGRATION_CONCURRENCY: usize = 10;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: BootMode,

    pub storage_type: TieringMode,

    /// Directory holding the two metadata databases and the process lock.
    pub meta_dir: PathBuf,

    #[serde(default)]
    pub hot: Option<DiskTierConfig>,

    #[serde(default)]
    pub warm: Option<DiskTierConfig>,

    #[serde(default)]
    pub cold: Option<ColdTierConfig>,

    #[serde(default)]
    pub cache: Option<CacheConfig>,

    /// Startup admission floor for free bytes, on top of `size_to_maintain`.
    #[serde(
        default = "default_min_free_bytes",
        deserialize_with = "quantity::deserialize"
    )]
    pub min_free_bytes: u64,
}

fn default_min_free_bytes() -> u64 {
    DEFAULT_MIN_FREE_BYTES
}

impl EngineConfig {
    pub fn new(storage_type: TieringMode, meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: BootMode::default(),
            storage_type,
            meta_dir: meta_dir.into(),
            hot: None,
            warm: None,
            cold: None,
            cache: None,
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
        }
    }

    pub fn with_mode(mut self, mode: BootMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hot(mut self, hot: DiskTierConfig) -> Self {
        self.hot = Some(hot);
        self
    }

    pub fn with_warm(mut self, warm: DiskTierConfig) -> Self {
        self.warm = Some(warm);
        self
    }

    pub fn with_cold(mut self, cold: ColdTierConfig) -> Self {
        self.cold = Some(cold);
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_json_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every tier the storage type needs is configured and
    /// that strategy names and volume paths are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_type.uses_hot() {
            let hot = self
                .hot
                .as_ref()
                .ok_or(ConfigError::MissingTierConfig { tier: "hot" })?;
            hot.validate("hot")?;
            hot.placement(SizeMetric::AvailableBytes)?;
        }
        if self.storage_type.uses_warm() {
            let warm = self
                .warm
                .as_ref()
                .ok_or(ConfigError::MissingTierConfig { tier: "warm" })?;
            warm.validate("warm")?;
            warm.placement(SizeMetric::UsedBytes)?;
        }
        if self.storage_type.uses_cold() {
            let cold = self
                .cold
                .as_ref()
                .ok_or(ConfigError::MissingTierConfig { tier: "cold" })?;
            validate_volumes("cold", &cold.volumes)?;
            cold.placement()?;
        }
        if let Some(cache) = &self.cache {
            validate_volumes("cache", &cache.volumes)?;
            cache.placement()?;
        }

        validate_unique_paths(self.volume_paths())
    }

    fn volume_paths(&self) -> impl Iterator<Item = &Path> {
        let hot = self.hot.iter().flat_map(|t| t.volumes.iter());
        let warm = self.warm.iter().flat_map(|t| t.volumes.iter());
        let cold = self.cold.iter().flat_map(|t| t.volumes.iter());
        let cache = self.cache.iter().flat_map(|t| t.volumes.iter());
        hot.chain(warm)
            .chain(cold)
            .chain(cache)
            .map(|v| v.path.as_path())
    }
}

fn validate_volumes(tier: &'static str, volumes: &[VolumeConfig]) -> Result<(), ConfigError> {
    if volumes.is_empty() {
        return Err(ConfigError::NoVolumes { tier });
    }
    volumes
        .iter()
        .try_for_each(|v| validate_volume_path(&v.path))
}

fn default_disk_strategy() -> String {
    "round_robin".to_string()
}

fn default_cache_strategy() -> String {
    "min_size_first".to_string()
}

/// Hot or Warm tier.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskTierConfig {
    #[serde(default = "default_disk_strategy")]
    pub strategy: String,
    pub volumes: Vec<VolumeConfig>,
}

impl DiskTierConfig {
    pub fn new(volumes: Vec<VolumeConfig>) -> Self {
        Self {
            strategy: default_disk_strategy(),
            volumes,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn placement(&self, size_metric: SizeMetric) -> Result<PlacementStrategy, ConfigError> {
        PlacementStrategy::parse(&self.strategy, size_metric)
    }

    fn validate(&self, tier: &'static str) -> Result<(), ConfigError> {
        validate_volumes(tier, &self.volumes)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_HOURS
}

fn default_migration_concurrency() -> usize {
    DEFAULT_MIGRATION_CONCURRENCY
}

/// Cold tier backed by disk volumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ColdTierConfig {
    #[serde(default = "default_disk_strategy")]
    pub strategy: String,

    /// Hours a block stays local before migration.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Remove the local copy once the block is on Cold.
    #[serde(default)]
    pub delete_local: bool,

    #[serde(default = "default_migration_concurrency")]
    pub migration_concurrency: usize,

    pub volumes: Vec<VolumeConfig>,
}

impl ColdTierConfig {
    pub fn new(volumes: Vec<VolumeConfig>) -> Self {
        Self {
            strategy: default_disk_strategy(),
            poll_interval: DEFAULT_POLL_INTERVAL_HOURS,
            delete_local: false,
            migration_concurrency: DEFAULT_MIGRATION_CONCURRENCY,
            volumes,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_poll_interval_hours(mut self, hours: u64) -> Self {
        self.poll_interval = hours;
        self
    }

    pub fn with_delete_local(mut self, delete_local: bool) -> Self {
        self.delete_local = delete_local;
        self
    }

    pub fn with_migration_concurrency(mut self, concurrency: usize) -> Self {
        self.migration_concurrency = concurrency;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.saturating_mul(3600))
    }

    pub fn placement(&self) -> Result<PlacementStrategy, ConfigError> {
        PlacementStrategy::parse(&self.strategy, SizeMetric::AvailableBytes)
    }
}

/// Optional cache tier in front of the durable tiers.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_strategy")]
    pub strategy: String,

    #[serde(default)]
    pub cache_write: CacheWritePolicy,

    pub volumes: Vec<VolumeConfig>,
}

impl CacheConfig {
    pub fn new(volumes: Vec<VolumeConfig>) -> Self {
        Self {
            strategy: default_cache_strategy(),
            cache_write: CacheWritePolicy::default(),
            volumes,
        }
    }

    pub fn with_write_policy(mut self, policy: CacheWritePolicy) -> Self {
        self.cache_write = policy;
        self
    }

    pub fn placement(&self) -> Result<PlacementStrategy, ConfigError> {
        PlacementStrategy::parse(&self.strategy, SizeMetric::UsedBytes)
    }
}

/// One configured volume.
///
/// `size_to_maintain` and `allowed_block_size` are GiB; zero means no limit.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    pub path: PathBuf,

    #[serde(default, deserialize_with = "quantity::deserialize")]
    pub size_to_maintain: u64,

    #[serde(default, deserialize_with = "quantity::deserialize")]
    pub inodes_to_maintain: u64,

    #[serde(default, deserialize_with = "quantity::deserialize")]
    pub allowed_block_numbers: u64,

    #[serde(default, deserialize_with = "quantity::deserialize")]
    pub allowed_block_size: u64,
}

impl VolumeConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size_to_maintain: 0,
            inodes_to_maintain: 0,
            allowed_block_numbers: 0,
            allowed_block_size: 0,
        }
    }

    pub fn with_size_to_maintain(mut self, gib: u64) -> Self {
        self.size_to_maintain = gib;
        self
    }

    pub fn with_inodes_to_maintain(mut self, inodes: u64) -> Self {
        self.inodes_to_maintain = inodes;
        self
    }

    pub fn with_allowed_block_numbers(mut self, count: u64) -> Self {
        self.allowed_block_numbers = count;
        self
    }

    pub fn with_allowed_block_size(mut self, gib: u64) -> Self {
        self.allowed_block_size = gib;
        self
    }

    /// Limits in bytes, as enforced by the volume.
    pub fn limits(&self) -> VolumeLimits {
        VolumeLimits {
            allowed_block_count: self.allowed_block_numbers,
            allowed_block_bytes: self.allowed_block_size.saturating_mul(GIB),
            min_free_bytes: self.size_to_maintain.saturating_mul(GIB),
            min_free_inodes: self.inodes_to_maintain,
        }
    }
}

/// Admission limits of a volume, in bytes and counts. Zero disables a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeLimits {
    pub allowed_block_count: u64,
    pub allowed_block_bytes: u64,
    /// Free bytes that must remain on the filesystem.
    pub min_free_bytes: u64,
    /// Free inodes that must remain on the filesystem.
    pub min_free_inodes: u64,
}

impl VolumeLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_allowed_block_count(mut self, count: u64) -> Self {
        self.allowed_block_count = count;
        self
    }

    pub fn with_allowed_block_bytes(mut self, bytes: u64) -> Self {
        self.allowed_block_bytes = bytes;
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    pub fn with_min_free_inodes(mut self, inodes: u64) -> Self {
        self.min_free_inodes = inodes;
        self
    }

    /// Stored usage already exceeds an allowance.
    pub fn exceeded_by(&self, block_count: u64, block_bytes: u64) -> bool {
        (self.allowed_block_count != 0 && block_count > self.allowed_block_count)
            || (self.allowed_block_bytes != 0 && block_bytes > self.allowed_block_bytes)
    }
}
