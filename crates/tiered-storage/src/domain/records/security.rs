//! # Record Security
//!
//! Hashes become file names, so they are validated before any path is built.

use crate::domain::errors::StorageError;

/// Longest accepted hash (512-bit digest in hex).
pub const MAX_HASH_LEN: usize = 128;

/// Validate that a block hash is non-empty hex.
///
/// # Security
///
/// Rejects separators and dots, so a hash can never escape its directory.
pub fn validate_block_hash(hash: &str) -> Result<(), StorageError> {
    let invalid = |reason| StorageError::InvalidHash {
        hash: hash.to_string(),
        reason,
    };

    if hash.is_empty() {
        return Err(invalid("hash is empty"));
    }
    if hash.len() > MAX_HASH_LEN {
        return Err(invalid("hash is too long"));
    }
    hex::decode(hash).map_err(|_| invalid("hash is not hex"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_sha256_hex() {
        let hash = "ab".repeat(32);
        assert!(validate_block_hash(&hash).is_ok());
    }

    #[test]
    fn test_rejects_path_traversal() {
        assert!(validate_block_hash("../../etc/passwd").is_err());
        assert!(validate_block_hash("abcd/ef").is_err());
    }

    #[test]
    fn test_rejects_empty_and_odd() {
        assert!(validate_block_hash("").is_err());
        assert!(validate_block_hash("abc").is_err());
    }

    #[test]
    fn test_rejects_oversized() {
        let hash = "a".repeat(MAX_HASH_LEN + 2);
        assert!(validate_block_hash(&hash).is_err());
    }
}
