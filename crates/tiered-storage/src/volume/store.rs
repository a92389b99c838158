use super::admission::check_admission;
use super::scan::{
    count_block_files, find_block, read_index_state, scan_tree, write_index_state, ScannedBlock,
};
use crate::domain::compression::BlockCompressor;
use crate::domain::errors::{AdmissionFailure, StorageError};
use crate::domain::layout::{block_file_name, DirCursor, DirLayout};
use crate::domain::records::security::validate_block_hash;
use crate::domain::strategy::PlacementCandidate;
use crate::domain::types::VolumeLimits;
use crate::ports::outbound::FileSystemAdapter;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of the temporary file used to replace a damaged block file.
const REPLACE_EXT: &str = "replace";

/// Counters and cursor, guarded by the volume lock.
#[derive(Debug, Default)]
pub(super) struct VolumeState {
    pub(super) block_count: u64,
    pub(super) block_bytes: u64,
    /// Slots handed out but not yet committed or released.
    pub(super) reserved: u64,
    pub(super) cursor: DirCursor,
}

/// A reserved write slot in one leaf directory.
#[derive(Debug)]
pub struct SlotReservation {
    pub k_index: u64,
    pub dir_index: u64,
    pub shard_dir: PathBuf,
}

/// Point-in-time copy of a volume's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeUsage {
    pub block_count: u64,
    pub block_bytes: u64,
    pub cursor: DirCursor,
}

pub struct Volume {
    root: PathBuf,
    layout: DirLayout,
    limits: VolumeLimits,
    fs: Arc<dyn FileSystemAdapter>,
    compressor: Arc<dyn BlockCompressor>,
    state: Mutex<VolumeState>,
}

impl Volume {
    /// Volume with zeroed counters. Nothing is touched on disk.
    pub fn new(
        root: impl Into<PathBuf>,
        layout: DirLayout,
        limits: VolumeLimits,
        fs: Arc<dyn FileSystemAdapter>,
        compressor: Arc<dyn BlockCompressor>,
    ) -> Self {
        Self {
            root: root.into(),
            layout,
            limits,
            fs,
            compressor,
            state: Mutex::new(VolumeState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &DirLayout {
        &self.layout
    }

    pub fn limits(&self) -> &VolumeLimits {
        &self.limits
    }

    pub fn usage(&self) -> VolumeUsage {
        let state = self.state.lock();
        VolumeUsage {
            block_count: state.block_count,
            block_bytes: state.block_bytes,
            cursor: state.cursor,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Delete everything under the root and start from `K0/0`.
    pub fn reset(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&self.root, e)),
        }
        fs::create_dir_all(&self.root).map_err(|e| StorageError::io(&self.root, e))?;

        *state = VolumeState::default();
        write_index_state(&self.root, &state.cursor)?;
        Ok(())
    }

    /// Rebuild counters from the files on disk and resume the saved cursor.
    ///
    /// Returns every block file found.
    pub fn restore(&self) -> Result<Vec<ScannedBlock>, StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| StorageError::io(&self.root, e))?;
        let blocks = scan_tree(&self.root, &self.layout)?;

        let (k_index, dir_index) = read_index_state(&self.root, &self.layout).unwrap_or((0, 0));
        let current = count_block_files(&self.layout.shard_dir(&self.root, k_index, dir_index))?;

        let mut state = self.state.lock();
        state.block_count = blocks.len() as u64;
        state.block_bytes = blocks.iter().map(|b| b.size).sum();
        state.reserved = 0;
        state.cursor = DirCursor::new(k_index, dir_index, current);

        tracing::info!(
            "[volume] {} restored: {} blocks, {} bytes, cursor {}/{} ({} files)",
            self.root.display(),
            state.block_count,
            state.block_bytes,
            k_index,
            dir_index,
            current
        );
        Ok(blocks)
    }

    /// Every block file on the volume, without touching counters.
    pub fn scan(&self) -> Result<Vec<ScannedBlock>, StorageError> {
        scan_tree(&self.root, &self.layout)
    }

    // =========================================================================
    // ADMISSION AND SLOT RESERVATION
    // =========================================================================

    /// Admission check without reserving a slot.
    pub fn check(&self) -> Result<(), AdmissionFailure> {
        let state = self.state.lock();
        check_admission(&self.root, &self.limits, &state, self.fs.as_ref())
    }

    /// Admission check and directory selection as one step.
    ///
    /// On success the returned slot counts against the leaf directory and
    /// the block allowance until it is committed or released.
    pub fn reserve_slot(&self) -> Result<SlotReservation, StorageError> {
        let mut state = self.state.lock();

        check_admission(&self.root, &self.limits, &state, self.fs.as_ref()).map_err(|reason| {
            StorageError::AdmissionRejected {
                path: self.root.clone(),
                reason,
            }
        })?;
        self.select_dir(&mut state)?;

        state.cursor.dir_block_count += 1;
        state.reserved += 1;

        Ok(SlotReservation {
            k_index: state.cursor.k_index,
            dir_index: state.cursor.dir_index,
            shard_dir: self
                .layout
                .shard_dir(&self.root, state.cursor.k_index, state.cursor.dir_index),
        })
    }

    /// Keep the current leaf directory while it has room, otherwise move to
    /// the next one (wrapping K at DCL) and persist the new cursor.
    fn select_dir(&self, state: &mut VolumeState) -> Result<(), StorageError> {
        let layout = &self.layout;

        if state.cursor.has_room(layout) {
            if state.cursor.dir_block_count == 0 {
                let dir = layout.shard_dir(&self.root, state.cursor.k_index, state.cursor.dir_index);
                fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
            }
            return Ok(());
        }

        let (k_index, dir_index) = state.cursor.next_slot(layout);
        let dir = layout.shard_dir(&self.root, k_index, dir_index);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let existing = count_block_files(&dir)?;
        if existing >= layout.dcl {
            return Err(StorageError::VolumeFull {
                path: self.root.clone(),
            });
        }

        state.cursor = DirCursor::new(k_index, dir_index, existing);
        write_index_state(&self.root, &state.cursor)?;

        tracing::debug!(
            "[volume] {} moved to {}{}/{}",
            self.root.display(),
            layout.prefix,
            k_index,
            dir_index
        );
        Ok(())
    }

    fn commit(&self, size: u64) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_sub(1);
        state.block_count += 1;
        state.block_bytes += size;
    }

    /// Give back a slot whose write failed.
    pub fn release(&self, slot: SlotReservation) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_sub(1);
        if state.cursor.k_index == slot.k_index && state.cursor.dir_index == slot.dir_index {
            state.cursor.dir_block_count = state.cursor.dir_block_count.saturating_sub(1);
        }
    }

    // =========================================================================
    // BLOCK I/O
    // =========================================================================

    /// Reserve a slot and write the block into it.
    pub fn write(&self, hash: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        let slot = self.reserve_slot()?;
        self.write_reserved(slot, hash, data)
    }

    /// Write a block into a reserved slot.
    ///
    /// On failure the file is removed, the slot released and no counter
    /// changes.
    pub fn write_reserved(
        &self,
        slot: SlotReservation,
        hash: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        if let Err(e) = validate_block_hash(hash) {
            self.release(slot);
            return Err(e);
        }

        let compressed = match self.compressor.compress(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.release(slot);
                return Err(StorageError::Compression {
                    message: e.to_string(),
                });
            }
        };

        self.store_compressed(slot, hash, &compressed)
    }

    /// Write compressed bytes into a reserved slot, committing or rolling back.
    fn store_compressed(
        &self,
        slot: SlotReservation,
        hash: &str,
        compressed: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = slot.shard_dir.join(block_file_name(hash));
        match self.write_file(&path, compressed) {
            Ok(size) => {
                self.commit(size);
                Ok(path)
            }
            Err(WriteFailure::Exists) => {
                self.release(slot);
                self.adopt_existing(hash, path, compressed)
            }
            Err(WriteFailure::Open(error)) => {
                self.release(slot);
                Err(error)
            }
            Err(WriteFailure::Partial(error)) => {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::error!(
                        "[volume] could not remove partial block {}: {}",
                        path.display(),
                        e
                    );
                }
                self.release(slot);
                Err(error)
            }
        }
    }

    /// The leaf directory already holds a file for this hash.
    ///
    /// That file was counted when it was committed or scanned, so it is
    /// kept as the stored copy when its bytes match. Anything else is the
    /// remains of an interrupted write and is replaced in place.
    fn adopt_existing(
        &self,
        hash: &str,
        path: PathBuf,
        compressed: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let current = fs::read(&path).map_err(|e| StorageError::io(&path, e))?;
        if current == compressed {
            tracing::debug!("[volume] {} already stored at {}", hash, path.display());
            return Ok(path);
        }

        self.replace_file(&path, compressed)?;

        let mut state = self.state.lock();
        state.block_bytes = state.block_bytes.saturating_sub(current.len() as u64)
            + compressed.len() as u64;
        drop(state);

        tracing::warn!(
            "[volume] replaced damaged copy of {} at {} ({} -> {} bytes)",
            hash,
            path.display(),
            current.len(),
            compressed.len()
        );
        Ok(path)
    }

    /// Raw file write. Never overwrites an existing file.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<u64, WriteFailure> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => WriteFailure::Exists,
                _ => WriteFailure::Open(StorageError::io(path, e)),
            })?;

        let failed = |e: std::io::Error| WriteFailure::Partial(StorageError::io(path, e));

        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(failed)?;
        let file = writer.into_inner().map_err(|e| failed(e.into_error()))?;
        file.sync_all().map_err(failed)?;

        Ok(bytes.len() as u64)
    }

    /// Swap `path` for `bytes` through a synced temporary file.
    fn replace_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension(REPLACE_EXT);
        let written = fs::write(&tmp, bytes)
            .and_then(|()| fs::File::open(&tmp)?.sync_all())
            .and_then(|()| fs::rename(&tmp, path));

        written.map_err(|e| {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                tracing::debug!("[volume] no temp file to remove at {}: {}", tmp.display(), cleanup);
            }
            StorageError::io(path, e)
        })
    }

    /// Read and decompress the block at `path`.
    pub fn read(&self, hash: &str, path: &Path) -> Result<Vec<u8>, StorageError> {
        let compressed = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::BlockNotFound {
                hash: hash.to_string(),
            },
            _ => StorageError::io(path, e),
        })?;

        self.compressor
            .decompress(&compressed)
            .map_err(|e| StorageError::Compression {
                message: format!("{}: {}", path.display(), e),
            })
    }

    /// Compressed bytes of the block at `path`, as stored.
    pub fn read_raw(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|e| StorageError::io(path, e))
    }

    /// Write already-compressed bytes (used when copying between volumes).
    pub fn write_raw(&self, hash: &str, compressed: &[u8]) -> Result<PathBuf, StorageError> {
        validate_block_hash(hash)?;
        let slot = self.reserve_slot()?;
        self.store_compressed(slot, hash, compressed)
    }

    /// Remove the block file at `path` and decrement the counters.
    pub fn delete(&self, hash: &str, path: &Path) -> Result<(), StorageError> {
        let size = fs::metadata(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::BlockNotFound {
                    hash: hash.to_string(),
                },
                _ => StorageError::io(path, e),
            })?
            .len();

        fs::remove_file(path).map_err(|e| StorageError::io(path, e))?;

        let mut state = self.state.lock();
        state.block_count = state.block_count.saturating_sub(1);
        state.block_bytes = state.block_bytes.saturating_sub(size);
        Ok(())
    }

    /// Search the directory tree for the block file of `hash`.
    pub fn find(&self, hash: &str) -> Result<Option<PathBuf>, StorageError> {
        validate_block_hash(hash)?;
        find_block(&self.root, &self.layout, hash)
    }

    /// True if `path` lives under this volume.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

enum WriteFailure {
    /// A file with the block's name is already in the directory.
    Exists,
    /// Nothing was created.
    Open(StorageError),
    /// The file was created and must be removed.
    Partial(StorageError),
}

impl PlacementCandidate for Volume {
    type Reservation = SlotReservation;

    fn reserve(&self) -> Option<SlotReservation> {
        match self.reserve_slot() {
            Ok(slot) => Some(slot),
            Err(e) => {
                tracing::warn!("[volume] {}", e);
                None
            }
        }
    }

    fn is_admissible(&self) -> bool {
        self.check().is_ok()
    }

    fn used_bytes(&self) -> u64 {
        self.state.lock().block_bytes
    }

    fn available_bytes(&self) -> u64 {
        self.fs.available_bytes(&self.root).unwrap_or(0)
    }

    fn block_count(&self) -> u64 {
        self.state.lock().block_count
    }

    fn label(&self) -> String {
        self.root.display().to_string()
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("root", &self.root)
            .field("layout", &self.layout)
            .field("usage", &self.usage())
            .finish()
    }
}
