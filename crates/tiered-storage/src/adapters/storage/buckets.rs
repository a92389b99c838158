use crate::domain::errors::KVStoreError;
use crate::ports::outbound::BatchOperation;
use std::collections::BTreeMap;

pub(super) type Bucket = BTreeMap<Vec<u8>, Vec<u8>>;

/// Ordered buckets shared by the in-memory and file-backed stores.
#[derive(Default, Clone)]
pub(super) struct Buckets {
    pub(super) map: BTreeMap<String, Bucket>,
}

/// Previous value of a key touched by a batch.
pub(super) struct Undo {
    bucket: String,
    key: Vec<u8>,
    previous: Option<Vec<u8>>,
}

impl Buckets {
    pub(super) fn create(&mut self, bucket: &str) {
        self.map.entry(bucket.to_string()).or_default();
    }

    pub(super) fn bucket(&self, bucket: &str) -> Result<&Bucket, KVStoreError> {
        self.map.get(bucket).ok_or_else(|| KVStoreError::BucketNotFound {
            bucket: bucket.to_string(),
        })
    }

    fn bucket_mut(&mut self, bucket: &str) -> Result<&mut Bucket, KVStoreError> {
        self.map
            .get_mut(bucket)
            .ok_or_else(|| KVStoreError::BucketNotFound {
                bucket: bucket.to_string(),
            })
    }

    pub(super) fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.bucket(bucket)?.get(key).cloned())
    }

    pub(super) fn range(
        &self,
        bucket: &str,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let bucket = self.bucket(bucket)?;
        if start > end {
            return Ok(Vec::new());
        }
        Ok(bucket
            .range(start.to_vec()..=end.to_vec())
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Apply a batch, returning what is needed to revert it.
    ///
    /// Every bucket is checked before anything is applied.
    pub(super) fn apply(&mut self, operations: Vec<BatchOperation>) -> Result<Vec<Undo>, KVStoreError> {
        for op in &operations {
            self.bucket(op.bucket())?;
        }

        let mut undo = Vec::with_capacity(operations.len());
        for op in operations {
            match op {
                BatchOperation::Put { bucket, key, value } => {
                    let previous = self.bucket_mut(&bucket)?.insert(key.clone(), value);
                    undo.push(Undo { bucket, key, previous });
                }
                BatchOperation::Delete { bucket, key } => {
                    let previous = self.bucket_mut(&bucket)?.remove(&key);
                    undo.push(Undo { bucket, key, previous });
                }
            }
        }
        Ok(undo)
    }

    pub(super) fn revert(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            if let Some(bucket) = self.map.get_mut(&entry.bucket) {
                match entry.previous {
                    Some(value) => {
                        bucket.insert(entry.key, value);
                    }
                    None => {
                        bucket.remove(&entry.key);
                    }
                }
            }
        }
    }
}
