//! Compressor module - stream compression of serialized bodies.
//!
//! Applied after serialization on send and before deserialization on
//! receive. The header's compress tag selects the implementation:
//!
//! - [`GzipCompressor`] (tag 0) - gzip via `flate2`

mod gzip;

pub use gzip::GzipCompressor;

use serde::{Deserialize, Serialize};

use crate::error::{RpcError, Result};

/// Compressor tag carried in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressType {
    #[default]
    Gzip = 0,
}

impl TryFrom<u8> for CompressType {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressType::Gzip),
            other => Err(RpcError::Compression(format!(
                "no compressor for tag {other}"
            ))),
        }
    }
}

/// Byte-level compression applied to frame bodies.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Inflate `data`, failing once the output would exceed `limit` bytes.
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>>;
}

static GZIP: GzipCompressor = GzipCompressor;

/// Look up the compressor for a header tag.
pub fn load_compressor(tag: u8) -> Result<&'static dyn Compressor> {
    Ok(match CompressType::try_from(tag)? {
        CompressType::Gzip => &GZIP,
    })
}
