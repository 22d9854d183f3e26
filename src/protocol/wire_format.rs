//! Wire format encoding and decoding.
//!
//! Implements the 17-byte header format:
//! ```text
//! ┌───────┬─────────┬─────────────┬──────────┬──────────┬───────────┬────────────┐
//! │ Magic │ Version │ Full length │ Msg type │ Compress │ Serialize │ Request ID │
//! │ 1 byte│ 1 byte  │ 4 bytes     │ 1 byte   │ 1 byte   │ 1 byte    │ 8 bytes    │
//! │       │         │ uint32 BE   │          │          │           │ uint64 BE  │
//! └───────┴─────────┴─────────────┴──────────┴──────────┴───────────┴────────────┘
//! ```
//!
//! `full_length` counts the header itself plus the compressed body.

use crate::error::{RpcError, Result};

/// Header size in bytes (fixed, exactly 17).
pub const HEADER_SIZE: usize = 17;

/// Constant first byte of every frame.
pub const MAGIC_NUMBER: u8 = 0x1d;

/// Protocol version carried in every frame.
pub const VERSION: u8 = 0x01;

/// Default upper bound for `full_length` (64 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Frame kind carried in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request = 0,
    Response = 1,
    /// Reserved.
    Ping = 2,
    /// Reserved.
    Pong = 3,
}

impl TryFrom<u8> for MessageType {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Response),
            2 => Ok(MessageType::Ping),
            3 => Ok(MessageType::Pong),
            other => Err(RpcError::Protocol(format!("unknown message type {other}"))),
        }
    }
}

/// Decoded header from wire format.
///
/// The compress and serialize tags are kept as raw bytes: an unknown tag is
/// only an error once something tries to load the matching implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version.
    pub version: u8,
    /// Total frame length (header + compressed body).
    pub full_length: u32,
    /// Frame kind.
    pub message_type: MessageType,
    /// Compressor tag.
    pub compress_type: u8,
    /// Serializer tag.
    pub serialize_type: u8,
    /// Correlation id.
    pub request_id: u64,
}

impl Header {
    /// Create a header for a body of `body_len` bytes.
    pub fn new(
        message_type: MessageType,
        compress_type: u8,
        serialize_type: u8,
        request_id: u64,
        body_len: usize,
    ) -> Self {
        Self {
            version: VERSION,
            full_length: (HEADER_SIZE + body_len) as u32,
            message_type,
            compress_type,
            serialize_type,
            request_id,
        }
    }

    /// Length of the body that follows the header.
    #[inline]
    pub fn body_len(&self) -> usize {
        (self.full_length as usize).saturating_sub(HEADER_SIZE)
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use rookie_rpc::protocol::{Header, MessageType, HEADER_SIZE};
    ///
    /// let header = Header::new(MessageType::Request, 0, 0, 42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// assert_eq!(u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]), 117);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = MAGIC_NUMBER;
        buf[1] = self.version;
        buf[2..6].copy_from_slice(&self.full_length.to_be_bytes());
        buf[6] = self.message_type as u8;
        buf[7] = self.compress_type;
        buf[8] = self.serialize_type;
        buf[9..17].copy_from_slice(&self.request_id.to_be_bytes());
        buf
    }

    /// Decode and validate a header.
    ///
    /// Checks:
    /// - Magic number and version match
    /// - Message type is known
    /// - `full_length` covers at least the header and stays under `max_frame_size`
    pub fn decode(buf: &[u8; HEADER_SIZE], max_frame_size: u32) -> Result<Self> {
        if buf[0] != MAGIC_NUMBER {
            return Err(RpcError::Protocol(format!(
                "magic number error: expected {:#04x}, got {:#04x}",
                MAGIC_NUMBER, buf[0]
            )));
        }

        if buf[1] != VERSION {
            return Err(RpcError::Protocol(format!(
                "unsupported protocol version {}",
                buf[1]
            )));
        }

        let full_length = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        if (full_length as usize) < HEADER_SIZE {
            return Err(RpcError::Protocol(format!(
                "frame length {full_length} shorter than header"
            )));
        }
        if full_length > max_frame_size {
            return Err(RpcError::Protocol(format!(
                "frame length {full_length} exceeds maximum {max_frame_size}"
            )));
        }

        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[9..17]);

        Ok(Self {
            version: buf[1],
            full_length,
            message_type: MessageType::try_from(buf[6])?,
            compress_type: buf[7],
            serialize_type: buf[8],
            request_id: u64::from_be_bytes(id),
        })
    }
}
