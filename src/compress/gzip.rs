//! Gzip compressor using `flate2`.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::Compressor;
use crate::error::{RpcError, Result};

/// Gzip compressor (tag 0), default compression level.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let buf = Vec::with_capacity(data.len() / 2 + 32);
        let mut encoder = GzEncoder::new(buf, Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| RpcError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| RpcError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        // One byte past the limit is enough to detect an oversized body.
        let mut decoder = GzDecoder::new(data).take((limit as u64).saturating_add(1));
        let mut out = Vec::with_capacity(data.len().saturating_mul(2).min(limit));
        decoder
            .read_to_end(&mut out)
            .map_err(|e| RpcError::Compression(e.to_string()))?;
        if out.len() > limit {
            return Err(RpcError::Compression(format!(
                "decompressed body exceeds {limit} bytes"
            )));
        }
        Ok(out)
    }
}
