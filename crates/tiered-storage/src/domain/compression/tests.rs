//! # Compression Tests

use super::*;

#[test]
fn test_zlib_compress_decompress() {
    let compressor = ZlibCompressor::best();

    let original = br#"{"hash":"ab12","round":1200,"miner":"node-7"}"#;
    let compressed = compressor.compress(original).expect("compress");
    let decompressed = compressor.decompress(&compressed).expect("decompress");

    assert_eq!(decompressed, original);
}

#[test]
fn test_output_is_zlib_stream() {
    let compressed = ZlibCompressor::best().compress(b"block").expect("compress");
    // zlib header: CM=8, best compression flag level
    assert_eq!(compressed[0], 0x78);
    assert_eq!(compressed[1], 0xDA);
}

#[test]
fn test_compression_reduces_size() {
    let compressor = ZlibCompressor::default();

    let original: Vec<u8> = (0..4000).map(|i| (i % 256) as u8).collect();
    let compressed = compressor.compress(&original).expect("compress");

    assert!(compressed.len() < original.len());
}

#[test]
fn test_corrupted_stream_fails() {
    let compressor = ZlibCompressor::best();
    let mut compressed = compressor.compress(b"some block bytes").expect("compress");
    compressed.truncate(compressed.len() / 2);

    assert!(compressor.decompress(&compressed).is_err());
}

#[test]
fn test_noop_compressor_passthrough() {
    let compressor = NoOpCompressor;

    let original = b"Test data that should not change";
    let compressed = compressor.compress(original).expect("compress");
    let decompressed = compressor.decompress(&compressed).expect("decompress");

    assert_eq!(compressed, original);
    assert_eq!(decompressed, original);
}

#[test]
fn test_empty_data() {
    let compressor = ZlibCompressor::new(6);

    let compressed = compressor.compress(&[]).expect("compress");
    let decompressed = compressor.decompress(&compressed).expect("decompress");

    assert!(decompressed.is_empty());
}
