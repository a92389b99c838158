//! # Migration Worker Tests

use super::*;
use crate::adapters::cold::ColdDisk;
use crate::adapters::infra::MockTimeSource;
use crate::domain::compression::ZlibCompressor;
use crate::domain::errors::StorageError;
use crate::domain::layout::DirLayout;
use crate::domain::records::UnmovedBlockRecord;
use crate::domain::strategy::PlacementStrategy;
use crate::domain::tiering::TierKind;
use crate::domain::types::VolumeLimits;
use crate::metadata::MetadataStore;
use crate::ports::outbound::ColdStorage;
use crate::test_utils::{files_on_disk, mock_fs, sample_block, test_volume};
use crate::tier::{ColdTier, DiskTier};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const START: u64 = 1_700_000_000_000_000_000;
const HOUR: Duration = Duration::from_secs(3600);

struct Env {
    hot_dir: TempDir,
    cold_dir: TempDir,
    clock: Arc<MockTimeSource>,
    metadata: Arc<MetadataStore>,
    hot: Arc<DiskTier>,
    cold: Arc<ColdTier>,
}

impl Env {
    fn new(delete_local: bool) -> Self {
        let hot_dir = tempfile::tempdir().unwrap();
        let cold_dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(MockTimeSource::new(START));
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());

        let hot = Arc::new(
            DiskTier::new(
                TierKind::Hot,
                PlacementStrategy::RoundRobin,
                vec![test_volume(
                    hot_dir.path(),
                    DirLayout::HOT,
                    VolumeLimits::unlimited(),
                    mock_fs(),
                )],
                metadata.clone(),
                clock.clone(),
            )
            .with_cold_migration(true),
        );

        let backend: Arc<dyn ColdStorage> = Arc::new(ColdDisk::new(
            cold_dir.path(),
            VolumeLimits::unlimited(),
            mock_fs(),
            Arc::new(ZlibCompressor::best()),
        ));
        let cold = Arc::new(
            ColdTier::new(PlacementStrategy::RoundRobin, vec![backend], metadata.clone())
                .with_poll_interval(HOUR)
                .with_delete_local(delete_local)
                .with_migration_concurrency(4),
        );

        Self {
            hot_dir,
            cold_dir,
            clock,
            metadata,
            hot,
            cold,
        }
    }

    fn worker(&self) -> MigrationWorker {
        MigrationWorker::new(self.metadata.clone(), self.cold.clone(), self.clock.clone())
            .with_local_tier(self.hot.clone())
    }
}

#[tokio::test]
async fn test_block_older_than_poll_interval_moves_to_cold() {
    let env = Env::new(false);
    let (hash, data) = sample_block(1);
    let local_path = env.hot.write(&hash, &data).unwrap();

    env.clock.advance(2 * HOUR);
    let worker = env.worker();
    let report = worker.tick().await;

    assert_eq!(report.migrated, 1);
    assert_eq!(worker.state(), WorkerState::Idle);

    let record = env.metadata.get(&hash).unwrap().unwrap();
    assert!(record.is_in(TierKind::Cold));
    assert!(record.is_in(TierKind::Hot));
    assert!(local_path.exists());
    assert_eq!(env.cold.read(&record).unwrap(), data);
    assert_eq!(env.metadata.unmoved_len().unwrap(), 0);
}

#[tokio::test]
async fn test_recent_block_stays_local() {
    let env = Env::new(false);
    let (hash, data) = sample_block(2);
    env.hot.write(&hash, &data).unwrap();

    env.clock.advance(HOUR / 2);
    let report = env.worker().tick().await;

    assert_eq!(report, TickReport::default());
    let record = env.metadata.get(&hash).unwrap().unwrap();
    assert!(!record.is_in(TierKind::Cold));
    assert_eq!(env.metadata.unmoved_len().unwrap(), 1);
}

#[tokio::test]
async fn test_delete_local_after_migration() {
    let env = Env::new(true);
    let (hash, data) = sample_block(3);
    let local_path = env.hot.write(&hash, &data).unwrap();

    env.clock.advance(2 * HOUR);
    env.worker().tick().await;

    let record = env.metadata.get(&hash).unwrap().unwrap();
    assert!(record.is_in(TierKind::Cold));
    assert!(!record.is_in(TierKind::Hot));
    assert_eq!(record.block_path, None);
    assert!(!local_path.exists());
    assert!(files_on_disk(env.hot_dir.path()).is_empty());
    assert_eq!(files_on_disk(env.cold_dir.path()).len(), 1);
}

#[tokio::test]
async fn test_many_blocks_migrate_concurrently() {
    let env = Env::new(false);
    let mut hashes = Vec::new();
    for round in 0..25 {
        let (hash, data) = sample_block(round);
        env.hot.write(&hash, &data).unwrap();
        hashes.push(hash);
    }

    env.clock.advance(3 * HOUR);
    let report = env.worker().tick().await;

    assert_eq!(report.scanned, 25);
    assert_eq!(report.migrated, 25);
    for hash in &hashes {
        assert!(env.metadata.get(hash).unwrap().unwrap().is_in(TierKind::Cold));
    }
    assert_eq!(files_on_disk(env.cold_dir.path()).len(), 25);
}

#[tokio::test]
async fn test_orphan_queue_entry_is_dropped() {
    let env = Env::new(false);
    env.metadata
        .enqueue(&UnmovedBlockRecord::new(START, "0badf00d"))
        .unwrap();

    env.clock.advance(2 * HOUR);
    let report = env.worker().tick().await;

    assert_eq!(report.dropped, 1);
    assert_eq!(env.metadata.unmoved_len().unwrap(), 0);
}

#[tokio::test]
async fn test_already_cold_entry_is_dropped() {
    let env = Env::new(false);
    let (hash, data) = sample_block(4);
    let path = env.hot.write(&hash, &data).unwrap();
    let mut record = env.metadata.get(&hash).unwrap().unwrap();
    record.set_cold(env.cold.move_block(&hash, &path).unwrap());
    env.metadata.put(&record).unwrap();

    env.clock.advance(2 * HOUR);
    let report = env.worker().tick().await;

    assert_eq!(report.dropped, 1);
    assert_eq!(report.migrated, 0);
    assert_eq!(files_on_disk(env.cold_dir.path()).len(), 1);
}

#[tokio::test]
async fn test_failed_move_is_retried_next_tick() {
    let env = Env::new(false);
    let (hash, data) = sample_block(5);
    let path = env.hot.write(&hash, &data).unwrap();
    let stash = env.hot_dir.path().join("stash");
    std::fs::rename(&path, &stash).unwrap();

    env.clock.advance(2 * HOUR);
    let worker = env.worker();
    let first = worker.tick().await;
    assert_eq!(first.failed, 1);
    assert_eq!(env.metadata.unmoved_len().unwrap(), 1);

    std::fs::rename(&stash, &path).unwrap();
    let second = worker.tick().await;
    assert_eq!(second.migrated, 1);
    assert_eq!(env.metadata.unmoved_len().unwrap(), 0);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let env = Env::new(false);
    let (hash, data) = sample_block(6);
    env.hot.write(&hash, &data).unwrap();
    env.clock.advance(2 * HOUR);

    let worker = Arc::new(env.worker());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(Arc::clone(&worker).run(shutdown_rx));

    // the first interval tick fires immediately
    let mut migrated = false;
    for _ in 0..200 {
        let record = env.metadata.get(&hash).unwrap().unwrap();
        if record.is_in(TierKind::Cold) {
            migrated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(migrated);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

/// Cold backend that deletes the block through the local tier while its
/// copy is being made, like a concurrent caller would.
struct DeleteDuringMove {
    inner: Arc<dyn ColdStorage>,
    hot: Arc<DiskTier>,
    metadata: Arc<MetadataStore>,
}

impl ColdStorage for DeleteDuringMove {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn owns(&self, cold_path: &str) -> bool {
        self.inner.owns(cold_path)
    }

    fn move_block(&self, hash: &str, local_path: &Path) -> Result<String, StorageError> {
        let cold_path = self.inner.move_block(hash, local_path)?;
        let mut record = self.metadata.get(hash)?.ok_or_else(|| StorageError::BlockNotFound {
            hash: hash.to_string(),
        })?;
        self.hot.delete(&mut record)?;
        self.metadata.delete(hash)?;
        Ok(cold_path)
    }

    fn get_block(&self, hash: &str, cold_path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get_block(hash, cold_path)
    }

    fn delete_block(&self, hash: &str, cold_path: &str) -> Result<(), StorageError> {
        self.inner.delete_block(hash, cold_path)
    }

    fn is_able_to_store_block(&self) -> bool {
        self.inner.is_able_to_store_block()
    }

    fn used_bytes(&self) -> u64 {
        self.inner.used_bytes()
    }

    fn available_bytes(&self) -> u64 {
        self.inner.available_bytes()
    }

    fn block_count(&self) -> u64 {
        self.inner.block_count()
    }
}

#[tokio::test]
async fn test_block_deleted_during_move_stays_deleted() {
    let env = Env::new(false);
    let (hash, data) = sample_block(7);
    env.hot.write(&hash, &data).unwrap();

    let disk: Arc<dyn ColdStorage> = Arc::new(ColdDisk::new(
        env.cold_dir.path(),
        VolumeLimits::unlimited(),
        mock_fs(),
        Arc::new(ZlibCompressor::best()),
    ));
    let backend: Arc<dyn ColdStorage> = Arc::new(DeleteDuringMove {
        inner: disk,
        hot: env.hot.clone(),
        metadata: env.metadata.clone(),
    });
    let cold = Arc::new(
        ColdTier::new(PlacementStrategy::RoundRobin, vec![backend], env.metadata.clone())
            .with_poll_interval(HOUR),
    );
    let worker = MigrationWorker::new(env.metadata.clone(), cold, env.clock.clone())
        .with_local_tier(env.hot.clone());

    env.clock.advance(2 * HOUR);
    let report = worker.tick().await;

    assert_eq!(report.migrated, 0);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.failed, 0);
    assert!(env.metadata.get(&hash).unwrap().is_none());
    assert!(files_on_disk(env.hot_dir.path()).is_empty());
    assert!(files_on_disk(env.cold_dir.path()).is_empty());
    assert_eq!(env.metadata.unmoved_len().unwrap(), 0);
}
