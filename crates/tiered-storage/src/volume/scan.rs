use crate::domain::errors::StorageError;
use crate::domain::layout::{
    block_file_name, hash_from_file_name, DirCursor, DirLayout, INDEX_STATE_FILE,
};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A block file found while walking a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedBlock {
    pub hash: String,
    pub path: PathBuf,
    /// On-disk (compressed) size.
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch.
    pub modified_nanos: u64,
}

/// Block files directly inside `dir`. A missing directory holds none.
pub(super) fn count_block_files(dir: &Path) -> Result<u64, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let is_block = entry
            .file_name()
            .to_str()
            .and_then(hash_from_file_name)
            .is_some();
        if is_block {
            count += 1;
        }
    }
    Ok(count)
}

pub(super) fn read_index_state(root: &Path, layout: &DirLayout) -> Option<(u64, u64)> {
    let content = fs::read_to_string(root.join(INDEX_STATE_FILE)).ok()?;
    DirCursor::decode_state(&content, layout)
}

/// Persist the cursor via temp file + rename.
pub(super) fn write_index_state(root: &Path, cursor: &DirCursor) -> Result<(), StorageError> {
    let path = root.join(INDEX_STATE_FILE);
    let temp = path.with_extension("tmp");

    let mut file = fs::File::create(&temp).map_err(|e| StorageError::io(&temp, e))?;
    file.write_all(cursor.encode_state().as_bytes())
        .map_err(|e| StorageError::io(&temp, e))?;
    file.sync_all().map_err(|e| StorageError::io(&temp, e))?;

    fs::rename(&temp, &path).map_err(|e| StorageError::io(&path, e))
}

fn child_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, StorageError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))? {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| StorageError::io(entry.path(), e))?;
        if let (true, Some(name)) = (file_type.is_dir(), entry.file_name().to_str()) {
            dirs.push((name.to_string(), entry.path()));
        }
    }
    Ok(dirs)
}

fn scan_shard(dir: &Path) -> Result<Vec<ScannedBlock>, StorageError> {
    let mut blocks = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))? {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let name = entry.file_name();
        let Some(hash) = name.to_str().and_then(hash_from_file_name) else {
            continue;
        };

        let path = entry.path();
        let meta = entry.metadata().map_err(|e| StorageError::io(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let modified_nanos = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        blocks.push(ScannedBlock {
            hash: hash.to_string(),
            path,
            size: meta.len(),
            modified_nanos,
        });
    }
    Ok(blocks)
}

/// Every block file under `root`, walking `K{i}/{j}` directories in parallel.
pub(super) fn scan_tree(root: &Path, layout: &DirLayout) -> Result<Vec<ScannedBlock>, StorageError> {
    let k_dirs: Vec<PathBuf> = child_dirs(root)?
        .into_iter()
        .filter(|(name, _)| layout.parse_k_dir(name).is_some())
        .map(|(_, path)| path)
        .collect();

    let per_k: Vec<Vec<ScannedBlock>> = k_dirs
        .par_iter()
        .map(|k_dir| {
            let mut blocks = Vec::new();
            for (name, shard) in child_dirs(k_dir)? {
                if layout.parse_shard_dir(&name).is_some() {
                    blocks.extend(scan_shard(&shard)?);
                }
            }
            Ok(blocks)
        })
        .collect::<Result<_, StorageError>>()?;

    Ok(per_k.into_iter().flatten().collect())
}

/// Look for `{hash}.dat` in every leaf directory under `root`.
pub(super) fn find_block(
    root: &Path,
    layout: &DirLayout,
    hash: &str,
) -> Result<Option<PathBuf>, StorageError> {
    let file_name = block_file_name(hash);
    let k_dirs = match child_dirs(root) {
        Ok(dirs) => dirs,
        Err(_) if !root.exists() => return Ok(None),
        Err(e) => return Err(e),
    };

    for (name, k_dir) in k_dirs {
        if layout.parse_k_dir(&name).is_none() {
            continue;
        }
        for (name, shard) in child_dirs(&k_dir)? {
            if layout.parse_shard_dir(&name).is_none() {
                continue;
            }
            let candidate = shard.join(&file_name);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
    }
    Ok(None)
}
