//! MsgPack serializer using `rmp-serde`.
//!
//! Always uses `to_vec_named` so structs are encoded as maps with field names.
//! Bodies stay self-describing: a reader needs no schema to walk them.

use super::Serializer;
use crate::error::{RpcError, Result};
use crate::protocol::{Message, MessageType, Request, Response};

/// MessagePack serializer (tag 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer;

impl MsgPackSerializer {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| RpcError::Codec(e.to_string()))
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        rmp_serde::from_slice(bytes).map_err(|e| RpcError::Codec(e.to_string()))
    }
}

impl Serializer for MsgPackSerializer {
    fn serialize(&self, message: &Message) -> Result<Vec<u8>> {
        match message {
            Message::Request(req) => Self::encode(req),
            Message::Response(rsp) => Self::encode(rsp),
        }
    }

    fn deserialize(&self, target: MessageType, bytes: &[u8]) -> Result<Message> {
        match target {
            MessageType::Request => Self::decode::<Request>(bytes).map(Message::Request),
            MessageType::Response => Self::decode::<Response>(bytes).map(Message::Response),
            other => Err(RpcError::Codec(format!("no body shape for {other:?}"))),
        }
    }
}
