//! # Volume Tests

use super::*;
use crate::domain::compression::{BlockCompressor, CompressionError};
use crate::domain::errors::{AdmissionFailure, StorageError};
use crate::domain::layout::{DirCursor, DirLayout, INDEX_STATE_FILE};
use crate::domain::types::VolumeLimits;
use crate::test_utils::{files_on_disk, mock_fs, sample_block, test_volume};
use std::path::Path;
use std::sync::Arc;

fn small_volume(root: &Path, dcl: u64) -> Arc<Volume> {
    test_volume(
        root,
        DirLayout::HOT.with_dcl(dcl),
        VolumeLimits::unlimited(),
        mock_fs(),
    )
}

fn disk_usage(root: &Path) -> (u64, u64) {
    let files = files_on_disk(root);
    let bytes = files
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .sum();
    (files.len() as u64, bytes)
}

#[test]
fn test_third_write_moves_to_next_directory() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);
    volume.reset().unwrap();

    let paths: Vec<_> = (0..3)
        .map(|round| {
            let (hash, data) = sample_block(round);
            volume.write(&hash, &data).unwrap()
        })
        .collect();

    assert!(paths[0].starts_with(dir.path().join("HK0").join("0")));
    assert!(paths[1].starts_with(dir.path().join("HK0").join("0")));
    assert!(paths[2].starts_with(dir.path().join("HK0").join("1")));

    let state = std::fs::read_to_string(dir.path().join(INDEX_STATE_FILE)).unwrap();
    assert_eq!(state, "0\n1");
}

#[test]
fn test_directory_bound_and_k_wraparound() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);
    volume.reset().unwrap();

    // 2 K dirs x 2 sub dirs x 2 files fill the volume exactly
    for round in 0..8 {
        let (hash, data) = sample_block(round);
        volume.write(&hash, &data).unwrap();
    }

    for k in 0..2 {
        for sub in 0..2 {
            let shard = dir.path().join(format!("HK{}", k)).join(sub.to_string());
            assert_eq!(std::fs::read_dir(&shard).unwrap().count(), 2);
        }
    }
    let usage = volume.usage();
    assert!(usage.cursor.k_index < 2 && usage.cursor.dir_index < 2);

    // K wraps to 0, whose first sub-directory is still full
    let (hash, data) = sample_block(100);
    assert!(matches!(
        volume.write(&hash, &data),
        Err(StorageError::VolumeFull { .. })
    ));
}

#[test]
fn test_write_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2000);

    let (hash, data) = sample_block(42);
    let path = volume.write(&hash, &data).unwrap();

    assert_eq!(path.file_name().unwrap(), format!("{}.dat", hash).as_str());
    assert_eq!(volume.read(&hash, &path).unwrap(), data);
    assert_ne!(std::fs::read(&path).unwrap(), data);
}

#[test]
fn test_counters_match_disk() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 3);

    let mut written = Vec::new();
    for round in 0..10 {
        let (hash, data) = sample_block(round);
        written.push((hash.clone(), volume.write(&hash, &data).unwrap()));
    }
    for (hash, path) in written.iter().step_by(3) {
        volume.delete(hash, path).unwrap();
    }

    let usage = volume.usage();
    assert_eq!((usage.block_count, usage.block_bytes), disk_usage(dir.path()));
    assert_eq!(usage.block_count, 6);
}

#[test]
fn test_concurrent_writes_keep_counters_and_bound() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 4);

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let volume = Arc::clone(&volume);
            scope.spawn(move || {
                for i in 0..10 {
                    let (hash, data) = sample_block(worker * 1000 + i);
                    volume.write(&hash, &data).unwrap();
                }
            });
        }
    });

    let usage = volume.usage();
    assert_eq!(usage.block_count, 40);
    assert_eq!((usage.block_count, usage.block_bytes), disk_usage(dir.path()));

    for k_dir in std::fs::read_dir(dir.path()).unwrap().flatten() {
        if !k_dir.path().is_dir() {
            continue;
        }
        for shard in std::fs::read_dir(k_dir.path()).unwrap().flatten() {
            assert!(std::fs::read_dir(shard.path()).unwrap().count() <= 4);
        }
    }
}

struct BrokenCompressor;

impl BlockCompressor for BrokenCompressor {
    fn compress(&self, _data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Err(CompressionError::CompressFailed(std::io::Error::other(
            "simulated",
        )))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }
}

#[test]
fn test_failed_compression_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let volume = Volume::new(
        dir.path(),
        DirLayout::HOT.with_dcl(2),
        VolumeLimits::unlimited(),
        mock_fs(),
        Arc::new(BrokenCompressor),
    );

    let (hash, data) = sample_block(1);
    assert!(matches!(
        volume.write(&hash, &data),
        Err(StorageError::Compression { .. })
    ));

    let usage = volume.usage();
    assert_eq!((usage.block_count, usage.block_bytes), (0, 0));
    assert_eq!(usage.cursor.dir_block_count, 0);
    assert!(files_on_disk(dir.path()).is_empty());
}

#[test]
fn test_rewrite_adopts_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 10);
    let (hash, data) = sample_block(5);

    let path = volume.write(&hash, &data).unwrap();
    let before = volume.usage();

    assert_eq!(volume.write(&hash, &data).unwrap(), path);
    assert_eq!(volume.usage(), before);
    assert_eq!(disk_usage(dir.path()), (before.block_count, before.block_bytes));
    assert_eq!(volume.read(&hash, &path).unwrap(), data);
}

#[test]
fn test_damaged_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 10);
    let (hash, data) = sample_block(6);

    let path = DirLayout::HOT.block_path(dir.path(), 0, 0, &hash);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"torn").unwrap();
    volume.restore().unwrap();
    assert_eq!(volume.usage().block_count, 1);

    assert_eq!(volume.write(&hash, &data).unwrap(), path);

    let usage = volume.usage();
    assert_eq!(usage.block_count, 1);
    assert_eq!(usage.cursor.dir_block_count, 1);
    assert_eq!(disk_usage(dir.path()), (usage.block_count, usage.block_bytes));
    assert_eq!(volume.read(&hash, &path).unwrap(), data);
}

#[test]
fn test_unreadable_existing_entry_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 10);
    let (hash, data) = sample_block(7);

    let path = DirLayout::HOT.block_path(dir.path(), 0, 0, &hash);
    std::fs::create_dir_all(&path).unwrap();

    assert!(matches!(volume.write(&hash, &data), Err(StorageError::Io { .. })));
    assert!(path.is_dir());
    let usage = volume.usage();
    assert_eq!((usage.block_count, usage.cursor.dir_block_count), (0, 0));
}

#[test]
fn test_allowed_block_count_limit() {
    let dir = tempfile::tempdir().unwrap();
    let volume = test_volume(
        dir.path(),
        DirLayout::WARM,
        VolumeLimits::unlimited().with_allowed_block_count(2),
        mock_fs(),
    );

    for round in 0..2 {
        let (hash, data) = sample_block(round);
        volume.write(&hash, &data).unwrap();
    }
    let (hash, data) = sample_block(3);
    let err = volume.write(&hash, &data).unwrap_err();

    assert!(matches!(
        err,
        StorageError::AdmissionRejected {
            reason: AdmissionFailure::AllowedCountLimit { allowed: 2, .. },
            ..
        }
    ));
    assert!(err.is_capacity());
}

#[test]
fn test_pending_reservations_count_against_allowance() {
    let dir = tempfile::tempdir().unwrap();
    let volume = test_volume(
        dir.path(),
        DirLayout::WARM,
        VolumeLimits::unlimited().with_allowed_block_count(1),
        mock_fs(),
    );

    let slot = volume.reserve_slot().unwrap();
    assert!(volume.reserve_slot().is_err());

    volume.release(slot);
    assert!(volume.reserve_slot().is_ok());
}

#[test]
fn test_filesystem_admission() {
    let dir = tempfile::tempdir().unwrap();
    let fs = mock_fs();
    let volume = test_volume(
        dir.path(),
        DirLayout::HOT,
        VolumeLimits::unlimited()
            .with_min_free_bytes(1000)
            .with_min_free_inodes(10),
        fs.clone(),
    );
    assert!(volume.check().is_ok());

    fs.set_available_inodes(dir.path(), 10);
    assert!(matches!(volume.check(), Err(AdmissionFailure::InodesLimit { .. })));

    fs.set_available_inodes(dir.path(), 11);
    fs.set_available_bytes(dir.path(), 999);
    assert!(matches!(volume.check(), Err(AdmissionFailure::SizeLimit { .. })));

    fs.set_available_bytes(dir.path(), 5000);
    fs.set_writable(dir.path(), false);
    assert_eq!(volume.check(), Err(AdmissionFailure::NotWritable));
}

#[test]
fn test_restore_recounts_and_resumes_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);
    volume.reset().unwrap();
    for round in 0..3 {
        let (hash, data) = sample_block(round);
        volume.write(&hash, &data).unwrap();
    }
    let expected = volume.usage();

    let reopened = small_volume(dir.path(), 2);
    let blocks = reopened.restore().unwrap();

    assert_eq!(blocks.len(), 3);
    assert_eq!(reopened.usage(), expected);
    assert_eq!(reopened.usage().cursor, DirCursor::new(0, 1, 1));

    let (hash, data) = sample_block(9);
    let path = reopened.write(&hash, &data).unwrap();
    assert!(path.starts_with(dir.path().join("HK0").join("1")));
}

#[test]
fn test_reset_wipes_volume() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);
    let (hash, data) = sample_block(1);
    volume.write(&hash, &data).unwrap();
    std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

    volume.reset().unwrap();

    assert!(files_on_disk(dir.path()).is_empty());
    assert!(!dir.path().join("stray.txt").exists());
    assert_eq!(volume.usage().block_count, 0);
}

#[test]
fn test_delete_missing_block() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);
    let missing = dir.path().join("HK0").join("0").join("ab.dat");

    assert!(matches!(
        volume.delete("ab", &missing),
        Err(StorageError::BlockNotFound { .. })
    ));
}

#[test]
fn test_invalid_hash_releases_slot() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);

    assert!(matches!(
        volume.write("../escape", b"data"),
        Err(StorageError::InvalidHash { .. })
    ));
    assert_eq!(volume.usage().cursor.dir_block_count, 0);
}

#[test]
fn test_find_block_in_tree() {
    let dir = tempfile::tempdir().unwrap();
    let volume = small_volume(dir.path(), 2);
    let mut last = None;
    for round in 0..5 {
        let (hash, data) = sample_block(round);
        last = Some((hash.clone(), volume.write(&hash, &data).unwrap()));
    }
    let (hash, path) = last.unwrap();

    assert_eq!(volume.find(&hash).unwrap(), Some(path));
    assert_eq!(volume.find("0badc0de").unwrap(), None);
}
