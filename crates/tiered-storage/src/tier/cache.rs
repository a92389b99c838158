//! Volume-backed block cache.
//!
//! Entries are indexed in memory only; cache volumes are emptied whenever
//! the engine opens. Under write-back the cache holds blocks that have not
//! reached a durable tier yet (`dirty`), and those are never evicted.

use super::rotation::Rotation;
use crate::domain::errors::StorageError;
use crate::domain::records::security::validate_block_hash;
use crate::domain::strategy::PlacementStrategy;
use crate::domain::types::CacheWritePolicy;
use crate::volume::{SlotReservation, Volume};
use crossbeam::channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long the selector waits on a full handoff before rechecking shutdown.
const SELECTOR_POLL: Duration = Duration::from_millis(50);

#[derive(Default)]
struct CacheIndex {
    paths: HashMap<String, PathBuf>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    dirty: HashSet<String>,
}

impl CacheIndex {
    fn insert(&mut self, hash: &str, path: PathBuf, dirty: bool) {
        if self.paths.insert(hash.to_string(), path).is_none() {
            self.order.push_back(hash.to_string());
        }
        if dirty {
            self.dirty.insert(hash.to_string());
        }
    }

    fn remove(&mut self, hash: &str) -> Option<PathBuf> {
        let path = self.paths.remove(hash)?;
        self.order.retain(|h| h != hash);
        self.dirty.remove(hash);
        Some(path)
    }

    fn oldest_clean(&self) -> Option<String> {
        self.order.iter().find(|h| !self.dirty.contains(*h)).cloned()
    }
}

pub struct CacheTier {
    policy: CacheWritePolicy,
    strategy: PlacementStrategy,
    rotation: Arc<Mutex<Rotation<Volume>>>,
    index: RwLock<CacheIndex>,
    /// Next volume chosen ahead of time by the selector thread.
    preselected: Receiver<Arc<Volume>>,
    shutdown: Arc<AtomicBool>,
    selector: Option<JoinHandle<()>>,
}

impl CacheTier {
    pub fn new(
        policy: CacheWritePolicy,
        strategy: PlacementStrategy,
        volumes: Vec<Arc<Volume>>,
    ) -> Self {
        let rotation = Arc::new(Mutex::new(Rotation::new(volumes)));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);

        let selector = {
            let rotation = Arc::clone(&rotation);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("cache-selector".to_string())
                .spawn(move || run_selector(rotation, strategy, tx, shutdown))
        };
        let selector = match selector {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("[cache] selector thread not started, selecting inline: {}", e);
                None
            }
        };

        Self {
            policy,
            strategy,
            rotation,
            index: RwLock::new(CacheIndex::default()),
            preselected: rx,
            shutdown,
            selector,
        }
    }

    pub fn policy(&self) -> CacheWritePolicy {
        self.policy
    }

    pub fn volumes(&self) -> Vec<Arc<Volume>> {
        self.rotation.lock().all()
    }

    pub fn len(&self) -> usize {
        self.index.read().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.index.read().paths.contains_key(hash)
    }

    /// Hashes written under write-back that have not been flushed yet.
    pub fn dirty_hashes(&self) -> Vec<String> {
        let index = self.index.read();
        index
            .order
            .iter()
            .filter(|h| index.dirty.contains(*h))
            .cloned()
            .collect()
    }

    pub fn mark_clean(&self, hash: &str) {
        self.index.write().dirty.remove(hash);
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Cache a block. `dirty` marks it as not yet durable.
    pub fn write(&self, hash: &str, data: &[u8], dirty: bool) -> Result<PathBuf, StorageError> {
        validate_block_hash(hash)?;

        if let Some(path) = self.index.read().paths.get(hash).cloned() {
            if dirty {
                self.index.write().dirty.insert(hash.to_string());
            }
            return Ok(path);
        }

        let mut slot = self.take_preselected();
        loop {
            let (volume, reservation) = match slot.take() {
                Some(pair) => pair,
                None => self.select_inline()?,
            };

            match volume.write_reserved(reservation, hash, data) {
                Ok(path) => {
                    self.index.write().insert(hash, path.clone(), dirty);
                    tracing::debug!("[cache] cached {} at {}", hash, path.display());
                    return Ok(path);
                }
                Err(e @ StorageError::Io { .. }) => {
                    tracing::warn!(
                        "[cache] write to {} failed, evicting: {}",
                        volume.root().display(),
                        e
                    );
                    self.rotation.lock().pool.evict(&volume);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Slot on the pre-selected volume, if one is waiting and still admits.
    fn take_preselected(&self) -> Option<(Arc<Volume>, SlotReservation)> {
        let volume = self.preselected.try_recv().ok()?;
        match volume.reserve_slot() {
            Ok(slot) => Some((volume, slot)),
            Err(e) => {
                tracing::debug!("[cache] stale pre-selection: {}", e);
                None
            }
        }
    }

    /// Select under the rotation lock, evicting clean entries to make room.
    fn select_inline(&self) -> Result<(Arc<Volume>, SlotReservation), StorageError> {
        loop {
            if let Some(selection) = self.rotation.lock().select(self.strategy) {
                return Ok((selection.candidate, selection.reservation));
            }
            if !self.evict_oldest_clean() {
                return Err(StorageError::NoCacheVolumeAvailable);
            }
            self.rotation.lock().pool.readmit();
        }
    }

    /// Drop the oldest entry that is safe to lose.
    fn evict_oldest_clean(&self) -> bool {
        let Some(hash) = self.index.read().oldest_clean() else {
            return false;
        };
        self.delete(&hash);
        tracing::debug!("[cache] evicted {}", hash);
        true
    }

    // =========================================================================
    // READ / DELETE
    // =========================================================================

    fn volume_for(&self, path: &Path) -> Option<Arc<Volume>> {
        self.rotation.lock().find(|v| v.contains(path))
    }

    /// Cached copy of a block, if any. Unreadable entries are dropped.
    pub fn read(&self, hash: &str) -> Option<Vec<u8>> {
        let path = self.index.read().paths.get(hash).cloned()?;
        let result = match self.volume_for(&path) {
            Some(volume) => volume.read(hash, &path),
            None => Err(StorageError::BlockNotFound {
                hash: hash.to_string(),
            }),
        };

        match result {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("[cache] dropping unreadable entry {}: {}", hash, e);
                self.index.write().remove(hash);
                None
            }
        }
    }

    /// Remove a cached block. Returns false if it was not cached.
    pub fn delete(&self, hash: &str) -> bool {
        let Some(path) = self.index.write().remove(hash) else {
            return false;
        };
        if let Some(volume) = self.volume_for(&path) {
            if let Err(e) = volume.delete(hash, &path) {
                tracing::warn!("[cache] could not remove {}: {}", path.display(), e);
            }
        }
        true
    }
}

impl Drop for CacheTier {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.selector.take() {
            if handle.join().is_err() {
                tracing::error!("[cache] selector thread panicked");
            }
        }
    }
}

/// Keep one admissible volume waiting in the handoff channel.
///
/// The choice may be stale by the time a writer takes it; writers
/// re-check admission when they reserve the slot.
fn run_selector(
    rotation: Arc<Mutex<Rotation<Volume>>>,
    strategy: PlacementStrategy,
    tx: Sender<Arc<Volume>>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        // the slot is released under the rotation lock so inline selection
        // never sees it
        let chosen = {
            let mut rotation = rotation.lock();
            rotation.select(strategy).map(|selection| {
                selection.candidate.release(selection.reservation);
                selection.candidate
            })
        };
        let Some(mut volume) = chosen else {
            std::thread::sleep(SELECTOR_POLL);
            continue;
        };

        loop {
            match tx.send_timeout(volume, SELECTOR_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(back)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        return;
                    }
                    volume = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
}
