//! Shared helpers for unit tests.

use crate::adapters::filesystem::MockFileSystemAdapter;
use crate::domain::compression::ZlibCompressor;
use crate::domain::layout::DirLayout;
use crate::domain::types::VolumeLimits;
use crate::volume::Volume;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

/// Hex SHA-256 of `data`.
pub fn hash_of(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A small serialized block and its hash.
pub fn sample_block(round: u64) -> (String, Vec<u8>) {
    let data = format!(
        r#"{{"round":{},"miner":"miner-{}","prev_hash":"{}","txns":[{}]}}"#,
        round,
        round % 7,
        "0".repeat(64),
        (0..round % 5)
            .map(|i| format!(r#"{{"nonce":{},"fee":{}}}"#, i, round * 3 + i))
            .collect::<Vec<_>>()
            .join(",")
    )
    .into_bytes();
    (hash_of(&data), data)
}

pub fn mock_fs() -> Arc<MockFileSystemAdapter> {
    Arc::new(MockFileSystemAdapter::new())
}

pub fn test_volume(
    root: &Path,
    layout: DirLayout,
    limits: VolumeLimits,
    fs: Arc<MockFileSystemAdapter>,
) -> Arc<Volume> {
    Arc::new(Volume::new(
        root,
        layout,
        limits,
        fs,
        Arc::new(ZlibCompressor::best()),
    ))
}

/// Block files under `root`, counted straight from disk.
pub fn files_on_disk(root: &Path) -> Vec<std::path::PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else if path.extension().is_some_and(|e| e == "dat") {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out.sort();
    out
}
