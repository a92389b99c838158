//! # Compression Security
//!
//! ## Security Invariants
//!
//! - Decompression bomb prevention (max output size)

/// Maximum decompressed block size (100MB).
pub const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Validate that decompressed data doesn't exceed limits.
///
/// # Security
///
/// Decoders stop reading at `MAX_DECOMPRESSED_SIZE + 1` bytes, so an
/// oversized stream is rejected without being fully inflated.
pub fn validate_decompressed_size(decompressed_size: usize) -> Result<(), &'static str> {
    if decompressed_size > MAX_DECOMPRESSED_SIZE {
        return Err("decompressed size exceeds maximum");
    }
    Ok(())
}
