//! # Smart Store Tests

use super::*;
use crate::adapters::cold::ColdDisk;
use crate::adapters::filesystem::MockFileSystemAdapter;
use crate::adapters::infra::MockTimeSource;
use crate::domain::compression::ZlibCompressor;
use crate::domain::errors::StorageError;
use crate::domain::layout::DirLayout;
use crate::domain::strategy::{PlacementStrategy, SizeMetric};
use crate::domain::tiering::TierKind;
use crate::domain::types::{CacheWritePolicy, TieringMode, VolumeLimits};
use crate::metadata::MetadataStore;
use crate::ports::inbound::BlockStoreApi;
use crate::ports::outbound::ColdStorage;
use crate::test_utils::{files_on_disk, mock_fs, sample_block, test_volume};
use crate::tier::{CacheTier, ColdTier, DiskTier};
use std::sync::Arc;
use tempfile::TempDir;

const NOW: u64 = 1_700_000_000_000_000_000;

struct Env {
    hot_dir: TempDir,
    warm_dir: TempDir,
    cold_dir: TempDir,
    cache_dir: TempDir,
    hot_fs: Arc<MockFileSystemAdapter>,
    metadata: Arc<MetadataStore>,
    hot: Arc<DiskTier>,
    warm: Arc<DiskTier>,
    cold: Arc<ColdTier>,
}

impl Env {
    fn new() -> Self {
        let hot_dir = tempfile::tempdir().unwrap();
        let warm_dir = tempfile::tempdir().unwrap();
        let cold_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let hot_fs = mock_fs();
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let clock = Arc::new(MockTimeSource::new(NOW));

        let hot = Arc::new(DiskTier::new(
            TierKind::Hot,
            PlacementStrategy::RoundRobin,
            vec![test_volume(
                hot_dir.path(),
                DirLayout::HOT,
                VolumeLimits::unlimited(),
                hot_fs.clone(),
            )],
            metadata.clone(),
            clock.clone(),
        ));
        let warm = Arc::new(DiskTier::new(
            TierKind::Warm,
            PlacementStrategy::MinSizeFirst(SizeMetric::UsedBytes),
            vec![test_volume(
                warm_dir.path(),
                DirLayout::WARM,
                VolumeLimits::unlimited(),
                mock_fs(),
            )],
            metadata.clone(),
            clock,
        ));
        let backend: Arc<dyn ColdStorage> = Arc::new(ColdDisk::new(
            cold_dir.path(),
            VolumeLimits::unlimited(),
            mock_fs(),
            Arc::new(ZlibCompressor::best()),
        ));
        let cold = Arc::new(ColdTier::new(
            PlacementStrategy::RoundRobin,
            vec![backend],
            metadata.clone(),
        ));

        Self {
            hot_dir,
            warm_dir,
            cold_dir,
            cache_dir,
            hot_fs,
            metadata,
            hot,
            warm,
            cold,
        }
    }

    fn store(&self, mode: TieringMode) -> SmartStore {
        SmartStore::new(mode, self.metadata.clone())
            .with_hot(self.hot.clone())
            .with_warm(self.warm.clone())
            .with_cold(self.cold.clone())
    }

    fn cache(&self, policy: CacheWritePolicy) -> Arc<CacheTier> {
        Arc::new(CacheTier::new(
            policy,
            PlacementStrategy::MinSizeFirst(SizeMetric::UsedBytes),
            vec![test_volume(
                self.cache_dir.path(),
                DirLayout::CACHE,
                VolumeLimits::unlimited(),
                mock_fs(),
            )],
        ))
    }

    /// Copy a stored block to cold and record it, as the migration worker does.
    fn migrate(&self, hash: &str) {
        let mut record = self.metadata.get(hash).unwrap().unwrap();
        let cold_path = self
            .cold
            .move_block(hash, record.local_path().unwrap())
            .unwrap();
        record.set_cold(cold_path);
        self.metadata.put(&record).unwrap();
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

#[test]
fn test_round_trip_and_delete() {
    let env = Env::new();
    let store = env.store(TieringMode::Hot);

    let (hash, data) = sample_block(1);
    let path = store.write(&hash, &data).unwrap();

    assert!(path.starts_with(env.hot_dir.path()));
    assert_eq!(store.read(&hash, Some(1)).unwrap(), data);

    store.delete(&hash).unwrap();
    assert!(files_on_disk(env.hot_dir.path()).is_empty());
    assert!(matches!(
        store.read(&hash, None),
        Err(StorageError::BlockNotFound { .. })
    ));
}

#[test]
fn test_each_mode_writes_to_its_first_tier() {
    let cases = [
        (TieringMode::Hot, TierKind::Hot),
        (TieringMode::HotAndCold, TierKind::Hot),
        (TieringMode::HotAndWarm, TierKind::Hot),
        (TieringMode::HotWarmAndCold, TierKind::Hot),
        (TieringMode::Warm, TierKind::Warm),
        (TieringMode::WarmAndCold, TierKind::Warm),
    ];

    for (round, (mode, expected)) in cases.into_iter().enumerate() {
        let env = Env::new();
        let store = env.store(mode);
        let (hash, data) = sample_block(round as u64);

        let path = store.write(&hash, &data).unwrap();
        let root = match expected {
            TierKind::Hot => env.hot_dir.path(),
            _ => env.warm_dir.path(),
        };

        assert!(path.starts_with(root), "{} wrote to {}", mode, path.display());
        assert!(env.metadata.get(&hash).unwrap().unwrap().is_in(expected));
    }
}

#[test]
fn test_full_hot_tier_falls_back_to_warm() {
    let env = Env::new();
    let store = env.store(TieringMode::HotAndWarm);
    env.hot_fs.set_writable(env.hot_dir.path(), false);

    let (hash, data) = sample_block(10);
    let path = store.write(&hash, &data).unwrap();

    assert!(path.starts_with(env.warm_dir.path()));
    assert_eq!(store.read(&hash, None).unwrap(), data);
}

#[test]
fn test_hot_only_mode_reports_full_tier() {
    let env = Env::new();
    let store = env.store(TieringMode::Hot);
    env.hot_fs.set_writable(env.hot_dir.path(), false);

    let (hash, data) = sample_block(11);
    assert_eq!(
        store.write(&hash, &data).unwrap_err(),
        StorageError::NoVolumeAvailable {
            tier: TierKind::Hot
        }
    );
    assert!(files_on_disk(env.warm_dir.path()).is_empty());
}

#[test]
fn test_rewrite_returns_existing_path() {
    let env = Env::new();
    let store = env.store(TieringMode::Warm);

    let (hash, data) = sample_block(12);
    let first = store.write(&hash, &data).unwrap();
    let second = store.write(&hash, &data).unwrap();

    assert_eq!(first, second);
    assert_eq!(files_on_disk(env.warm_dir.path()).len(), 1);
}

#[test]
fn test_invalid_hash_rejected() {
    let env = Env::new();
    let store = env.store(TieringMode::Hot);

    assert!(matches!(
        store.write("../../etc/passwd", b"x"),
        Err(StorageError::InvalidHash { .. })
    ));
    assert!(matches!(
        store.read("", None),
        Err(StorageError::InvalidHash { .. })
    ));
}

#[test]
fn test_delete_unknown_block() {
    let env = Env::new();
    let store = env.store(TieringMode::Hot);

    assert!(matches!(
        store.delete("abcd"),
        Err(StorageError::BlockNotFound { .. })
    ));
}

// =============================================================================
// READ FALLBACK
// =============================================================================

#[test]
fn test_read_falls_back_to_cold() {
    let env = Env::new();
    let store = env.store(TieringMode::HotAndCold);

    let (hash, data) = sample_block(20);
    let path = store.write(&hash, &data).unwrap();
    env.migrate(&hash);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(store.read(&hash, None).unwrap(), data);
}

#[test]
fn test_read_repairs_moved_block() {
    let env = Env::new();
    let store = env.store(TieringMode::Hot);

    let (hash, data) = sample_block(21);
    let path = store.write(&hash, &data).unwrap();
    let moved = DirLayout::HOT.block_path(env.hot_dir.path(), 3, 7, &hash);
    std::fs::create_dir_all(moved.parent().unwrap()).unwrap();
    std::fs::rename(&path, &moved).unwrap();

    assert_eq!(store.read(&hash, None).unwrap(), data);
    let record = env.metadata.get(&hash).unwrap().unwrap();
    assert_eq!(record.block_path.as_deref(), Some(moved.as_path()));
}

#[test]
fn test_dangling_record_removed() {
    let env = Env::new();
    let store = env.store(TieringMode::Hot);

    let (hash, data) = sample_block(22);
    let path = store.write(&hash, &data).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(
        store.read(&hash, None),
        Err(StorageError::BlockNotFound { .. })
    ));
    assert_eq!(env.metadata.get(&hash).unwrap(), None);
}

#[test]
fn test_delete_keeps_cold_copy() {
    let env = Env::new();
    let store = env.store(TieringMode::HotAndCold);

    let (hash, data) = sample_block(23);
    store.write(&hash, &data).unwrap();
    env.migrate(&hash);

    store.delete(&hash).unwrap();

    assert!(files_on_disk(env.hot_dir.path()).is_empty());
    assert_eq!(files_on_disk(env.cold_dir.path()).len(), 1);
    assert_eq!(env.metadata.get(&hash).unwrap(), None);
}

// =============================================================================
// CACHE
// =============================================================================

#[test]
fn test_write_through_fills_cache() {
    let env = Env::new();
    let cache = env.cache(CacheWritePolicy::WriteThrough);
    let store = env.store(TieringMode::Hot).with_cache(cache.clone());

    let (hash, data) = sample_block(30);
    let path = store.write(&hash, &data).unwrap();

    assert!(path.starts_with(env.hot_dir.path()));
    assert!(cache.contains(&hash));
    assert!(cache.dirty_hashes().is_empty());
    assert_eq!(store.read(&hash, None).unwrap(), data);
}

#[test]
fn test_read_refills_cache() {
    let env = Env::new();
    let cache = env.cache(CacheWritePolicy::WriteThrough);
    let store = env.store(TieringMode::Warm).with_cache(cache.clone());

    let (hash, data) = sample_block(31);
    store.write(&hash, &data).unwrap();
    cache.delete(&hash);

    assert_eq!(store.read(&hash, None).unwrap(), data);
    assert!(cache.contains(&hash));
}

#[test]
fn test_write_back_defers_durable_write() {
    let env = Env::new();
    let cache = env.cache(CacheWritePolicy::WriteBack);
    let store = env.store(TieringMode::Hot).with_cache(cache.clone());

    let (hash, data) = sample_block(32);
    let path = store.write(&hash, &data).unwrap();

    assert!(path.starts_with(env.cache_dir.path()));
    assert!(files_on_disk(env.hot_dir.path()).is_empty());
    assert_eq!(cache.dirty_hashes(), vec![hash.clone()]);
    assert_eq!(store.read(&hash, None).unwrap(), data);

    assert_eq!(store.flush_write_back(), 1);
    assert_eq!(files_on_disk(env.hot_dir.path()).len(), 1);
    assert!(cache.dirty_hashes().is_empty());
    assert!(env.metadata.get(&hash).unwrap().unwrap().is_in(TierKind::Hot));
    assert_eq!(store.flush_write_back(), 0);
}

#[test]
fn test_failed_flush_keeps_block_dirty() {
    let env = Env::new();
    let cache = env.cache(CacheWritePolicy::WriteBack);
    let store = env.store(TieringMode::Hot).with_cache(cache.clone());

    let (hash, data) = sample_block(33);
    store.write(&hash, &data).unwrap();
    env.hot_fs.set_writable(env.hot_dir.path(), false);

    assert_eq!(store.flush_write_back(), 0);
    assert_eq!(cache.dirty_hashes(), vec![hash]);
}

#[test]
fn test_delete_removes_cached_block() {
    let env = Env::new();
    let cache = env.cache(CacheWritePolicy::WriteBack);
    let store = env.store(TieringMode::Hot).with_cache(cache.clone());

    let (hash, data) = sample_block(34);
    store.write(&hash, &data).unwrap();
    store.delete(&hash).unwrap();

    assert!(!cache.contains(&hash));
    assert!(cache.dirty_hashes().is_empty());
    assert_eq!(store.flush_write_back(), 0);
}
