use super::buckets::{Bucket, Buckets};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File-backed key-value store for production without RocksDB.
///
/// Keeps every bucket in memory and rewrites the whole file (temp file +
/// rename) after each write, so the file on disk is always a complete
/// snapshot.
///
/// File format, repeated per bucket:
///
/// ```text
/// [name_len:u32][name][entries:u32] ([key_len:u32][key][value_len:u32][value])*
/// ```
pub struct FileBackedKVStore {
    data: Buckets,
    path: PathBuf,
}

fn io_error(e: std::io::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: e.to_string(),
    }
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading it if the file exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read(&path) {
            Ok(bytes) => {
                let data = decode(&bytes)?;
                tracing::info!(
                    "[metadata] loaded {} buckets from {} ({} bytes)",
                    data.map.len(),
                    path.display(),
                    bytes.len()
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[metadata] no existing store at {}", path.display());
                Buckets::default()
            }
            Err(e) => return Err(io_error(e)),
        };

        Ok(Self { data, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_to_file(&self) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let bytes = encode(&self.data)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;

        std::fs::rename(&temp_path, &self.path).map_err(io_error)
    }
}

fn put_len(out: &mut Vec<u8>, len: usize, what: &str) -> Result<(), KVStoreError> {
    let len = u32::try_from(len).map_err(|_| KVStoreError::IOError {
        message: format!("{} of {} exceeds the store format limit", what, len),
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn put_chunk(out: &mut Vec<u8>, chunk: &[u8], what: &str) -> Result<(), KVStoreError> {
    put_len(out, chunk.len(), what)?;
    out.extend_from_slice(chunk);
    Ok(())
}

fn encode(data: &Buckets) -> Result<Vec<u8>, KVStoreError> {
    let mut out = Vec::new();
    for (name, bucket) in &data.map {
        put_chunk(&mut out, name.as_bytes(), "bucket name length")?;
        put_len(&mut out, bucket.len(), "entry count")?;
        for (key, value) in bucket {
            put_chunk(&mut out, key, "key length")?;
            put_chunk(&mut out, value, "value length")?;
        }
    }
    Ok(out)
}

struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn u32(&mut self) -> Result<u32, KVStoreError> {
        let end = self.cursor + 4;
        let raw = self.bytes.get(self.cursor..end).ok_or_else(truncated)?;
        self.cursor = end;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(raw);
        Ok(u32::from_le_bytes(buf))
    }

    fn chunk(&mut self) -> Result<&'a [u8], KVStoreError> {
        let len = self.u32()? as usize;
        let end = self.cursor + len;
        let raw = self.bytes.get(self.cursor..end).ok_or_else(truncated)?;
        self.cursor = end;
        Ok(raw)
    }

    fn done(&self) -> bool {
        self.cursor >= self.bytes.len()
    }
}

fn truncated() -> KVStoreError {
    KVStoreError::CorruptionError {
        message: "store file is truncated".to_string(),
    }
}

fn decode(bytes: &[u8]) -> Result<Buckets, KVStoreError> {
    let mut reader = Reader { bytes, cursor: 0 };
    let mut data = Buckets::default();

    while !reader.done() {
        let name = String::from_utf8(reader.chunk()?.to_vec()).map_err(|_| {
            KVStoreError::CorruptionError {
                message: "bucket name is not utf-8".to_string(),
            }
        })?;
        let entries = reader.u32()?;
        let mut bucket = Bucket::new();
        for _ in 0..entries {
            let key = reader.chunk()?.to_vec();
            let value = reader.chunk()?.to_vec();
            bucket.insert(key, value);
        }
        data.map.insert(name, bucket);
    }

    Ok(data)
}

impl KeyValueStore for FileBackedKVStore {
    fn create_bucket(&mut self, bucket: &str) -> Result<(), KVStoreError> {
        if self.data.map.contains_key(bucket) {
            return Ok(());
        }
        self.data.create(bucket);
        self.save_to_file()
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
        let undo = self.data.apply(operations)?;
        if let Err(e) = self.save_to_file() {
            self.data.revert(undo);
            return Err(e);
        }
        Ok(())
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
