use super::buckets::Buckets;
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Switch that makes writes to chosen buckets fail. Shared with tests after
/// the store has been handed to its owner.
#[derive(Clone, Default)]
pub struct WriteFailures {
    buckets: Arc<RwLock<HashSet<String>>>,
}

impl WriteFailures {
    pub fn fail(&self, bucket: &str) {
        self.buckets.write().insert(bucket.to_string());
    }

    pub fn heal(&self, bucket: &str) {
        self.buckets.write().remove(bucket);
    }

    fn check(&self, bucket: &str) -> Result<(), KVStoreError> {
        if self.buckets.read().contains(bucket) {
            return Err(KVStoreError::IOError {
                message: format!("simulated write failure in bucket {}", bucket),
            });
        }
        Ok(())
    }
}

/// In-memory key-value store for unit tests.
///
/// Ordered like the production stores, so range scans behave the same.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: Buckets,
    failures: WriteFailures,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes can be made to fail through the returned switch.
    pub fn with_failures() -> (Self, WriteFailures) {
        let store = Self::default();
        let failures = store.failures.clone();
        (store, failures)
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn create_bucket(&mut self, bucket: &str) -> Result<(), KVStoreError> {
        self.data.create(bucket);
        Ok(())
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.data.get(bucket, key)
    }

    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(vec![BatchOperation::put(bucket, key, value)])
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(vec![BatchOperation::delete(bucket, key)])
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in &operations {
            self.failures.check(op.bucket())?;
        }
        self.data.apply(operations).map(|_| ())
    }

    fn range_scan(
        &self,
        bucket: &str,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.data.range(bucket, start, end, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryKVStore {
        let mut store = InMemoryKVStore::new();
        store.create_bucket("a").unwrap();
        store.create_bucket("b").unwrap();
        store
    }

    #[test]
    fn test_in_memory_kv_store() {
        let mut store = store();

        store.put("a", b"key1", b"value1").unwrap();
        store.put("b", b"key1", b"other").unwrap();

        assert_eq!(store.get("a", b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get("b", b"key1").unwrap(), Some(b"other".to_vec()));
        assert_eq!(store.get("a", b"key3").unwrap(), None);

        store.delete("a", b"key1").unwrap();
        assert_eq!(store.get("a", b"key1").unwrap(), None);
    }

    #[test]
    fn test_missing_bucket() {
        let store = InMemoryKVStore::new();
        assert!(matches!(
            store.get("nope", b"k"),
            Err(KVStoreError::BucketNotFound { .. })
        ));
    }

    #[test]
    fn test_batch_rejected_as_a_whole() {
        let mut store = store();
        let ops = vec![
            BatchOperation::put("a", b"x".to_vec(), b"1".to_vec()),
            BatchOperation::put("missing", b"y".to_vec(), b"2".to_vec()),
        ];

        assert!(store.atomic_batch_write(ops).is_err());
        assert_eq!(store.get("a", b"x").unwrap(), None);
    }

    #[test]
    fn test_range_scan_inclusive_and_limited() {
        let mut store = store();
        for key in ["01", "02", "03", "04"] {
            store.put("a", key.as_bytes(), b"v").unwrap();
        }

        let hits = store.range_scan("a", b"02", b"04", 10).unwrap();
        let keys: Vec<_> = hits.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"02".as_slice(), b"03", b"04"]);

        assert_eq!(store.range_scan("a", b"00", b"99", 2).unwrap().len(), 2);
        assert!(store.range_scan("a", b"05", b"01", 10).unwrap().is_empty());
    }

    #[test]
    fn test_write_failures_switch() {
        let (mut store, failures) = InMemoryKVStore::with_failures();
        store.create_bucket("a").unwrap();

        failures.fail("a");
        assert!(store.put("a", b"k", b"v").is_err());
        assert_eq!(store.get("a", b"k").unwrap(), None);

        failures.heal("a");
        assert!(store.put("a", b"k", b"v").is_ok());
    }
}
