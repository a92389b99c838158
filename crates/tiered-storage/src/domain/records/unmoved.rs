use crate::domain::errors::StorageError;

/// Width of the zero-padded nanosecond timestamp (u64::MAX has 20 digits).
const TIME_KEY_WIDTH: usize = 20;

/// Separator between timestamp and hash in a queue key.
const KEY_SEPARATOR: u8 = b':';

/// A block waiting for cold migration.
///
/// Keyed by `{created_at:020}:{hash}` so that byte order equals creation
/// order and two blocks created in the same nanosecond do not collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmovedBlockRecord {
    /// Creation time, nanoseconds since the Unix epoch.
    pub created_at: u64,
    pub hash: String,
}

impl UnmovedBlockRecord {
    pub fn new(created_at: u64, hash: impl Into<String>) -> Self {
        Self {
            created_at,
            hash: hash.into(),
        }
    }

    /// Queue key for this record.
    pub fn key(&self) -> Vec<u8> {
        format!("{:0width$}:{}", self.created_at, self.hash, width = TIME_KEY_WIDTH).into_bytes()
    }

    /// Smallest key of any record created at `nanos`.
    pub fn time_key(nanos: u64) -> Vec<u8> {
        format!("{:0width$}", nanos, width = TIME_KEY_WIDTH).into_bytes()
    }

    /// Key greater than every record created at or before `nanos`.
    pub fn upper_bound_key(nanos: u64) -> Vec<u8> {
        // ';' sorts directly after ':'
        format!("{:0width$};", nanos, width = TIME_KEY_WIDTH).into_bytes()
    }

    /// Rebuild a record from a queue entry.
    pub fn from_entry(key: &[u8], value: &[u8]) -> Result<Self, StorageError> {
        let corrupt = |message: &str| StorageError::Serialization {
            message: format!(
                "unmoved block key {:?}: {}",
                String::from_utf8_lossy(key),
                message
            ),
        };

        if key.len() <= TIME_KEY_WIDTH || key[TIME_KEY_WIDTH] != KEY_SEPARATOR {
            return Err(corrupt("malformed key"));
        }

        let created_at = std::str::from_utf8(&key[..TIME_KEY_WIDTH])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| corrupt("timestamp is not a number"))?;

        let hash = std::str::from_utf8(value).map_err(|_| corrupt("hash is not utf-8"))?;

        Ok(Self::new(created_at, hash))
    }
}
