//! # Block Compression
//!
//! Every block file on a Hot, Warm, Cold or cache volume is a zlib stream of
//! the block bytes, written at best compression.

use super::security::{validate_decompressed_size, MAX_DECOMPRESSED_SIZE};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

// =============================================================================
// COMPRESSION ERROR
// =============================================================================

/// Errors during compression/decompression
#[derive(Debug)]
pub enum CompressionError {
    CompressFailed(io::Error),
    DecompressFailed(io::Error),
    /// Output exceeded the decompression limit
    TooLarge(&'static str),
}

impl std::fmt::Display for CompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionError::CompressFailed(e) => write!(f, "Compression failed: {}", e),
            CompressionError::DecompressFailed(e) => write!(f, "Decompression failed: {}", e),
            CompressionError::TooLarge(reason) => write!(f, "Decompression rejected: {}", reason),
        }
    }
}

impl std::error::Error for CompressionError {}

// =============================================================================
// COMPRESSOR TRAIT
// =============================================================================

/// Trait for block compression implementations
pub trait BlockCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;
}

// =============================================================================
// ZLIB COMPRESSOR
// =============================================================================

/// Zlib compressor, best compression by default.
pub struct ZlibCompressor {
    level: Compression,
}

impl ZlibCompressor {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// Level 9
    pub fn best() -> Self {
        Self {
            level: Compression::best(),
        }
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::best()
    }
}

impl BlockCompressor for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder
            .write_all(data)
            .map_err(CompressionError::CompressFailed)?;
        encoder.finish().map_err(CompressionError::CompressFailed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        // Read one byte past the limit so oversized output is detectable.
        let mut decoder = ZlibDecoder::new(data).take(MAX_DECOMPRESSED_SIZE as u64 + 1);
        let mut output = Vec::new();
        decoder
            .read_to_end(&mut output)
            .map_err(CompressionError::DecompressFailed)?;

        validate_decompressed_size(output.len()).map_err(CompressionError::TooLarge)?;
        Ok(output)
    }
}

// =============================================================================
// NO-OP COMPRESSOR
// =============================================================================

/// Stores block bytes unchanged.
pub struct NoOpCompressor;

impl BlockCompressor for NoOpCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }
}
