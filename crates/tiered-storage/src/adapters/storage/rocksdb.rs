//! # RocksDB Metadata Backend
//!
//! One column family per bucket. Enabled with the `rocksdb` feature.

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::PathBuf;

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Smaller cache, no fsync
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

fn rocks_error(op: &str, e: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {} failed: {}", op, e),
    }
}

fn cf_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
    opts
}

/// RocksDB-backed key-value store implementing the KeyValueStore trait
pub struct RocksDbStore {
    db: RwLock<DB>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create a database, reopening every existing bucket.
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let existing = DB::list_cf(&opts, &config.path).unwrap_or_default();
        let descriptors: Vec<ColumnFamilyDescriptor> = existing
            .into_iter()
            .filter(|name| name != rocksdb::DEFAULT_COLUMN_FAMILY_NAME)
            .map(|name| ColumnFamilyDescriptor::new(name, cf_options()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, descriptors)
            .map_err(|e| rocks_error("open", e))?;

        Ok(Self {
            db: RwLock::new(db),
            config,
        })
    }

    fn write_options(&self) -> rocksdb::WriteOptions {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

fn missing(bucket: &str) -> KVStoreError {
    KVStoreError::BucketNotFound {
        bucket: bucket.to_string(),
    }
}

impl KeyValueStore for RocksDbStore {
    fn create_bucket(&mut self, bucket: &str) -> Result<(), KVStoreError> {
        let mut db = self.db.write();
        if db.cf_handle(bucket).is_some() {
            return Ok(());
        }
        db.create_cf(bucket, &cf_options())
            .map_err(|e| rocks_error("create_cf", e))
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let db = self.db.read();
        let cf = db.cf_handle(bucket).ok_or_else(|| missing(bucket))?;
        db.get_cf(cf, key).map_err(|e| rocks_error("get", e))
    }

    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(vec![BatchOperation::put(bucket, key, value)])
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(vec![BatchOperation::delete(bucket, key)])
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let db = self.db.read();
        let mut batch = WriteBatch::default();

        for op in &operations {
            let cf = db.cf_handle(op.bucket()).ok_or_else(|| missing(op.bucket()))?;
            match op {
                BatchOperation::Put { key, value, .. } => batch.put_cf(cf, key, value),
                BatchOperation::Delete { key, .. } => batch.delete_cf(cf, key),
            }
        }

        db.write_opt(batch, &self.write_options())
            .map_err(|e| rocks_error("batch write", e))
    }

    fn range_scan(
        &self,
        bucket: &str,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let db = self.db.read();
        let cf = db.cf_handle(bucket).ok_or_else(|| missing(bucket))?;
        let mut results = Vec::new();

        for item in db.iterator_cf(cf, IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(|e| rocks_error("scan", e))?;
            if key.as_ref() > end || results.len() >= limit {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }
}
