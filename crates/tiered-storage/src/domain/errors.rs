//! # Domain Errors
//!
//! Error types for the tiered storage engine.
//!
//! ## Taxonomy
//!
//! - Capacity/admission: a volume or tier cannot take another block
//! - I/O: file create/write/read/compress failures, carrying the cause
//! - Configuration: fatal at startup
//! - Consistency: metadata and disk disagree

use crate::domain::tiering::TierKind;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No location record exists for this hash.
    #[error("Block meta record for {hash} not found")]
    BlockNotFound { hash: String },

    /// Hash cannot be used as a file name.
    #[error("Invalid block hash {hash:?}: {reason}")]
    InvalidHash { hash: String, reason: &'static str },

    /// The next sub-directory of a volume is already at capacity.
    #[error("Volume {} is full", path.display())]
    VolumeFull { path: PathBuf },

    /// A volume failed its admission check.
    #[error("Volume {} cannot store blocks: {reason}", path.display())]
    AdmissionRejected {
        path: PathBuf,
        reason: AdmissionFailure,
    },

    /// Every candidate volume of a tier was evicted during selection.
    #[error("Unable to select any available volume in {tier} tier")]
    NoVolumeAvailable { tier: TierKind },

    /// Every cold backend was evicted during selection.
    #[error("Unable to select any available cold storage")]
    NoColdStorageAvailable,

    /// No cache volume can take the block, even after evicting clean entries.
    #[error("Unable to select any available cache volume")]
    NoCacheVolumeAvailable,

    /// Fewer than half of the configured volumes passed admission.
    #[error(
        "At least 50% of {tier} volumes must be able to store blocks; {admitted} of {configured} admitted"
    )]
    AdmissionThreshold {
        tier: &'static str,
        admitted: usize,
        configured: usize,
    },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// Compression or decompression failed.
    #[error("Compression error: {message}")]
    Compression { message: String },

    /// Metadata store failure.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Record encoding/decoding failure.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Metadata and disk disagree about a block.
    #[error("Inconsistent state for block {hash}: {message}")]
    Inconsistent { hash: String, message: String },

    /// Invalid deployment configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bootstrap mode declared but not implemented.
    #[error("{mode} mode is not supported")]
    UnsupportedMode { mode: String },

    /// Cold backend failure.
    #[error("Cold storage error: {message}")]
    ColdStorage { message: String },

    /// Metadata directory is held by another process.
    #[error("Database locked: {message}")]
    DatabaseLocked { message: String },
}

impl StorageError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        StorageError::Io {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    /// True for errors that mean "no room", as opposed to broken hardware.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            StorageError::VolumeFull { .. }
                | StorageError::AdmissionRejected { .. }
                | StorageError::NoVolumeAvailable { .. }
                | StorageError::NoColdStorageAvailable
                | StorageError::NoCacheVolumeAvailable
        )
    }
}

/// Why a volume failed its admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionFailure {
    /// Stored block count reached `allowed_block_numbers`.
    AllowedCountLimit { allowed: u64, current: u64 },
    /// Stored block bytes reached `allowed_block_size`.
    AllowedSizeLimit { allowed: u64, current: u64 },
    /// Free bytes dropped below the required reserve.
    SizeLimit { available: u64, required: u64 },
    /// Free inodes dropped to `inodes_to_maintain` or below.
    InodesLimit { available: u64, required: u64 },
    /// The volume path is not writable.
    NotWritable,
    /// Filesystem statistics could not be read.
    Stats { message: String },
}

impl fmt::Display for AdmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionFailure::AllowedCountLimit { allowed, current } => {
                write!(f, "allowed block number limit {} reached ({})", allowed, current)
            }
            AdmissionFailure::AllowedSizeLimit { allowed, current } => {
                write!(f, "allowed block size limit {} reached ({})", allowed, current)
            }
            AdmissionFailure::SizeLimit {
                available,
                required,
            } => write!(
                f,
                "available size {} is less than size to maintain {}",
                available, required
            ),
            AdmissionFailure::InodesLimit {
                available,
                required,
            } => write!(
                f,
                "available inodes {} not above inodes to maintain {}",
                available, required
            ),
            AdmissionFailure::NotWritable => write!(f, "path is not writable"),
            AdmissionFailure::Stats { message } => write!(f, "statfs failed: {}", message),
        }
    }
}

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Storage type includes {tier} tier but {tier} tier config not provided")]
    MissingTierConfig { tier: &'static str },

    #[error("{tier} tier config has no volumes")]
    NoVolumes { tier: &'static str },

    #[error("Strategy {0} is not supported")]
    UnsupportedStrategy(String),

    #[error("Storage type {0} is not supported")]
    UnsupportedStorageType(String),

    #[error("Mode {0} is not supported")]
    UnsupportedMode(String),

    #[error("Cache write policy {0} is not supported")]
    UnsupportedCacheWrite(String),

    #[error("Invalid volume path {path:?}: {reason}")]
    InvalidVolumePath { path: String, reason: &'static str },

    #[error("Invalid quantity {0:?}")]
    InvalidQuantity(String),

    #[error("Could not read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Could not parse config: {0}")]
    Parse(String),
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
    /// Bucket was never created.
    #[error("Bucket {bucket} does not exist")]
    BucketNotFound { bucket: String },
}

impl From<KVStoreError> for StorageError {
    fn from(err: KVStoreError) -> Self {
        StorageError::Database {
            message: err.to_string(),
        }
    }
}

/// Filesystem adapter errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FSError {
    /// I/O error.
    #[error("Filesystem I/O error: {message}")]
    IOError { message: String },
    /// Permission denied.
    #[error("Filesystem permission denied")]
    PermissionDenied,
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::VolumeFull {
            path: PathBuf::from("/data/hot1"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("/data/hot1"));
        assert!(msg.contains("full"));
    }

    #[test]
    fn test_kv_error_conversion() {
        let kv_err = KVStoreError::IOError {
            message: "disk failure".to_string(),
        };
        let storage_err: StorageError = kv_err.into();

        match storage_err {
            StorageError::Database { message } => {
                assert!(message.contains("disk failure"));
            }
            _ => panic!("Expected Database"),
        }
    }

    #[test]
    fn test_config_error_conversion() {
        let err: StorageError = ConfigError::UnsupportedStrategy("fastest".into()).into();
        assert!(matches!(err, StorageError::Config(_)));
        assert!(err.to_string().contains("fastest"));
    }

    #[test]
    fn test_capacity_classification() {
        assert!(StorageError::NoColdStorageAvailable.is_capacity());
        assert!(StorageError::NoVolumeAvailable {
            tier: TierKind::Hot
        }
        .is_capacity());
        assert!(!StorageError::Database {
            message: "x".into()
        }
        .is_capacity());
    }

    #[test]
    fn test_admission_threshold_message() {
        let err = StorageError::AdmissionThreshold {
            tier: "warm",
            admitted: 1,
            configured: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("50%"));
        assert!(msg.contains("1 of 4"));
    }
}
