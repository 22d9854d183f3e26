//! Frame struct and the encode/decode pipeline.
//!
//! Send path: serialize, compress, prefix with the header.
//! Receive path: read header, read exactly `full_length - 17` bytes,
//! decompress, deserialize.
//!
//! # Example
//!
//! ```
//! use rookie_rpc::protocol::{
//!     decode_message, encode_message, Message, Request, DEFAULT_MAX_FRAME_SIZE,
//! };
//!
//! let request = Message::Request(Request::new(1, "Calc", "Add", vec![2.into(), 3.into()]));
//! let frame = encode_message(&request, 0, 0).unwrap();
//! assert_eq!(frame.header.full_length as usize, 17 + frame.body.len());
//! assert_eq!(decode_message(&frame, DEFAULT_MAX_FRAME_SIZE).unwrap(), request);
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::message::Message;
use super::wire_format::{Header, MessageType, HEADER_SIZE};
use crate::codec::load_serializer;
use crate::compress::load_compressor;
use crate::error::{RpcError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Compressed body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame from header and body.
    pub fn new(header: Header, body: Bytes) -> Self {
        Self { header, body }
    }

    /// Encode the frame into a contiguous buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        build_frame(&self.header, &self.body)
    }
}

/// Build a complete frame as a single byte vector.
///
/// Writes the 17 header bytes verbatim, then the body.
pub fn build_frame(header: &Header, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf
}

/// Serialize then compress `message` into a frame.
///
/// The header request id is taken from the message body.
pub fn encode_message(message: &Message, compress_type: u8, serialize_type: u8) -> Result<Frame> {
    let serializer = load_serializer(serialize_type)?;
    let compressor = load_compressor(compress_type)?;

    let serialized = serializer.serialize(message)?;
    let body = compressor.compress(&serialized)?;

    let header = Header::new(
        message.message_type(),
        compress_type,
        serialize_type,
        message.request_id(),
        body.len(),
    );
    Ok(Frame::new(header, Bytes::from(body)))
}

/// Decompress then deserialize the body of `frame`, using the header tags.
///
/// The decompressed body may not exceed `max_body_size` bytes, the same
/// bound [`read_frame`] applies on the wire.
pub fn decode_message(frame: &Frame, max_body_size: u32) -> Result<Message> {
    let header = &frame.header;
    if matches!(header.message_type, MessageType::Ping | MessageType::Pong) {
        return Err(RpcError::Protocol(format!(
            "{:?} frames are not supported",
            header.message_type
        )));
    }

    let compressor = load_compressor(header.compress_type)?;
    let serializer = load_serializer(header.serialize_type)?;

    let plain = compressor.decompress(&frame.body, max_body_size as usize)?;
    serializer.deserialize(header.message_type, &plain)
}

/// Read exactly one frame.
///
/// Blocks until the full body has arrived or the stream fails; partial
/// frames are never returned.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: u32) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; HEADER_SIZE];
    reader.read_exact(&mut head).await?;
    let header = Header::decode(&head, max_frame_size)?;

    let mut body = vec![0u8; header.body_len()];
    reader.read_exact(&mut body).await?;

    Ok(Frame::new(header, Bytes::from(body)))
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.header.encode()).await?;
    if !frame.body.is_empty() {
        writer.write_all(&frame.body).await?;
    }
    writer.flush().await?;
    Ok(())
}
