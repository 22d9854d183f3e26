//! Protocol module - wire format, framing, and message bodies.
//!
//! This module implements the binary protocol:
//! - 17-byte header encoding/decoding
//! - Frame read/write over any async stream
//! - Request/response bodies and status codes

mod frame;
mod message;
mod wire_format;

pub use frame::{build_frame, decode_message, encode_message, read_frame, write_frame, Frame};
pub use message::{Message, Request, Response, CODE_ERROR, CODE_OK, CODE_RATE_LIMITED};
pub use wire_format::{
    Header, MessageType, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE, MAGIC_NUMBER, VERSION,
};
