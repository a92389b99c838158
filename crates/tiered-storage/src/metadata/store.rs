use crate::domain::errors::StorageError;
use crate::domain::records::{BlockWhereRecord, UnmovedBlockRecord};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::Mutex;
use std::path::Path;

pub const BLOCK_DB_FILE: &str = "bmr.db";
pub const QUERY_DB_FILE: &str = "qmr.db";

pub const BLOCK_WHERE_BUCKET: &str = "bwb";
pub const BLOCK_USAGE_BUCKET: &str = "bub";
pub const UNMOVED_BLOCK_BUCKET: &str = "ubb";

pub struct MetadataStore {
    blocks: Mutex<Box<dyn KeyValueStore>>,
    queue: Mutex<Box<dyn KeyValueStore>>,
}

impl MetadataStore {
    /// Wrap two opened stores, creating the fixed buckets.
    pub fn new(
        mut blocks: Box<dyn KeyValueStore>,
        mut queue: Box<dyn KeyValueStore>,
    ) -> Result<Self, StorageError> {
        blocks.create_bucket(BLOCK_WHERE_BUCKET)?;
        blocks.create_bucket(BLOCK_USAGE_BUCKET)?;
        queue.create_bucket(UNMOVED_BLOCK_BUCKET)?;

        Ok(Self {
            blocks: Mutex::new(blocks),
            queue: Mutex::new(queue),
        })
    }

    /// Volatile store for tests and throwaway nodes.
    pub fn in_memory() -> Result<Self, StorageError> {
        use crate::adapters::storage::InMemoryKVStore;
        Self::new(
            Box::new(InMemoryKVStore::new()),
            Box::new(InMemoryKVStore::new()),
        )
    }

    /// Open (or create) the databases under `meta_dir`.
    pub fn open(meta_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(meta_dir).map_err(|e| StorageError::io(meta_dir, e))?;
        let (blocks, queue) = open_backend(meta_dir)?;

        tracing::info!("[metadata] opened databases in {}", meta_dir.display());
        Self::new(blocks, queue)
    }

    /// Delete both databases under `meta_dir`. Missing files are fine.
    pub fn remove_files(meta_dir: &Path) -> Result<(), StorageError> {
        for name in [BLOCK_DB_FILE, QUERY_DB_FILE] {
            let path = meta_dir.join(name);
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => tracing::info!("[metadata] removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }
        Ok(())
    }

    // =========================================================================
    // LOCATION INDEX
    // =========================================================================

    pub fn get(&self, hash: &str) -> Result<Option<BlockWhereRecord>, StorageError> {
        let bytes = self.blocks.lock().get(BLOCK_WHERE_BUCKET, hash.as_bytes())?;
        bytes
            .map(|b| BlockWhereRecord::decode(hash, &b))
            .transpose()
    }

    /// Insert or replace the record for `record.hash`.
    pub fn put(&self, record: &BlockWhereRecord) -> Result<(), StorageError> {
        let value = record.encode()?;
        self.blocks
            .lock()
            .put(BLOCK_WHERE_BUCKET, record.hash.as_bytes(), &value)?;
        Ok(())
    }

    /// Change the stored record of `hash` in place, holding the index lock
    /// across the read and the write.
    ///
    /// Returns the updated record, or `None` if there is no record.
    pub fn update<F>(&self, hash: &str, change: F) -> Result<Option<BlockWhereRecord>, StorageError>
    where
        F: FnOnce(&mut BlockWhereRecord),
    {
        let mut blocks = self.blocks.lock();
        let Some(bytes) = blocks.get(BLOCK_WHERE_BUCKET, hash.as_bytes())? else {
            return Ok(None);
        };
        let mut record = BlockWhereRecord::decode(hash, &bytes)?;
        change(&mut record);
        blocks.put(BLOCK_WHERE_BUCKET, hash.as_bytes(), &record.encode()?)?;
        Ok(Some(record))
    }

    /// Insert or replace several records in one write.
    pub fn put_many(&self, records: &[BlockWhereRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let operations = records
            .iter()
            .map(|r| {
                Ok(BatchOperation::put(
                    BLOCK_WHERE_BUCKET,
                    r.hash.as_bytes(),
                    r.encode()?,
                ))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        self.blocks.lock().atomic_batch_write(operations)?;
        Ok(())
    }

    pub fn delete(&self, hash: &str) -> Result<(), StorageError> {
        self.blocks.lock().delete(BLOCK_WHERE_BUCKET, hash.as_bytes())?;
        Ok(())
    }

    // =========================================================================
    // MIGRATION QUEUE
    // =========================================================================

    pub fn enqueue(&self, record: &UnmovedBlockRecord) -> Result<(), StorageError> {
        self.queue
            .lock()
            .put(UNMOVED_BLOCK_BUCKET, &record.key(), record.hash.as_bytes())?;
        Ok(())
    }

    /// Queue several entries in one write.
    pub fn enqueue_many(&self, records: &[UnmovedBlockRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let operations = records
            .iter()
            .map(|r| BatchOperation::put(UNMOVED_BLOCK_BUCKET, r.key(), r.hash.as_bytes()))
            .collect();
        self.queue.lock().atomic_batch_write(operations)?;
        Ok(())
    }

    pub fn dequeue(&self, record: &UnmovedBlockRecord) -> Result<(), StorageError> {
        self.queue.lock().delete(UNMOVED_BLOCK_BUCKET, &record.key())?;
        Ok(())
    }

    /// Queue entries created at or before `cutoff_nanos`, oldest first.
    ///
    /// Malformed entries are removed and skipped.
    pub fn unmoved_until(
        &self,
        cutoff_nanos: u64,
        limit: usize,
    ) -> Result<Vec<UnmovedBlockRecord>, StorageError> {
        let mut queue = self.queue.lock();
        let entries = queue.range_scan(
            UNMOVED_BLOCK_BUCKET,
            &UnmovedBlockRecord::time_key(0),
            &UnmovedBlockRecord::upper_bound_key(cutoff_nanos),
            limit,
        )?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match UnmovedBlockRecord::from_entry(&key, &value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("[metadata] dropping queue entry: {}", e);
                    queue.delete(UNMOVED_BLOCK_BUCKET, &key)?;
                }
            }
        }
        Ok(records)
    }

    /// Number of queued entries, for diagnostics.
    pub fn unmoved_len(&self) -> Result<usize, StorageError> {
        Ok(self.unmoved_until(u64::MAX, usize::MAX)?.len())
    }
}

#[cfg(not(feature = "rocksdb"))]
fn open_backend(
    meta_dir: &Path,
) -> Result<(Box<dyn KeyValueStore>, Box<dyn KeyValueStore>), StorageError> {
    use crate::adapters::storage::FileBackedKVStore;
    Ok((
        Box::new(FileBackedKVStore::open(meta_dir.join(BLOCK_DB_FILE))?),
        Box::new(FileBackedKVStore::open(meta_dir.join(QUERY_DB_FILE))?),
    ))
}

#[cfg(feature = "rocksdb")]
fn open_backend(
    meta_dir: &Path,
) -> Result<(Box<dyn KeyValueStore>, Box<dyn KeyValueStore>), StorageError> {
    use crate::adapters::storage::{RocksDbConfig, RocksDbStore};
    Ok((
        Box::new(RocksDbStore::open(RocksDbConfig::new(meta_dir.join(BLOCK_DB_FILE)))?),
        Box::new(RocksDbStore::open(RocksDbConfig::new(meta_dir.join(QUERY_DB_FILE)))?),
    ))
}
