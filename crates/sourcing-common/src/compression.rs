//! Gzip helpers for stored payloads

use crate::error::{Result, SourcingError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress bytes with gzip at the default level
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SourcingError::Compression(format!("gzip write failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SourcingError::Compression(format!("gzip finish failed: {e}")))?;
    Ok(compressed)
}

/// Decompress gzip-compressed bytes
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SourcingError::Compression(format!("gzip decode failed: {e}")))?;
    Ok(decompressed)
}

/// Compressed size as a fraction of the original (0.0 for empty input)
pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        0.0
    } else {
        compressed as f64 / original as f64
    }
}
