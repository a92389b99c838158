//! # Compression Module
//!
//! Zlib (DEFLATE) compression of block files.

mod compressor;
pub mod security;

#[cfg(test)]
mod tests;

pub use compressor::{BlockCompressor, CompressionError, NoOpCompressor, ZlibCompressor};
