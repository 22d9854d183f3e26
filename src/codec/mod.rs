//! Codec module - serialization/deserialization of frame bodies.
//!
//! Two interchangeable serializers, selected by the header's serialize tag:
//!
//! - [`MsgPackSerializer`] (tag 0) - self-describing binary codec using `rmp-serde`
//! - [`ProtobufSerializer`] (tag 1) - schema-based codec using `prost`
//!
//! There is no negotiation: a tag without an implementation is a
//! [`RpcError::Codec`] and the connection is aborted.
//!
//! # Example
//!
//! ```
//! use rookie_rpc::codec::{load_serializer, SerializeType};
//! use rookie_rpc::protocol::{Message, MessageType, Request};
//!
//! let serializer = load_serializer(SerializeType::Protobuf as u8).unwrap();
//! let request = Message::Request(Request::new(1, "Calc", "Add", vec![2.into(), 3.into()]));
//! let bytes = serializer.serialize(&request).unwrap();
//! assert_eq!(serializer.deserialize(MessageType::Request, &bytes).unwrap(), request);
//! ```

mod msgpack;
mod protobuf;

pub use msgpack::MsgPackSerializer;
pub use protobuf::ProtobufSerializer;

use serde::{Deserialize, Serialize};

use crate::error::{RpcError, Result};
use crate::protocol::{Message, MessageType};

/// Serializer tag carried in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializeType {
    /// Self-describing binary codec.
    #[default]
    MsgPack = 0,
    /// Schema-based interchange codec.
    Protobuf = 1,
}

impl TryFrom<u8> for SerializeType {
    type Error = RpcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SerializeType::MsgPack),
            1 => Ok(SerializeType::Protobuf),
            other => Err(RpcError::Codec(format!("no serializer for tag {other}"))),
        }
    }
}

/// Turns a message body into bytes and back.
pub trait Serializer: Send + Sync {
    /// Encode a request or response body.
    fn serialize(&self, message: &Message) -> Result<Vec<u8>>;

    /// Decode `bytes` into the body shape named by `target`.
    fn deserialize(&self, target: MessageType, bytes: &[u8]) -> Result<Message>;
}

static MSGPACK: MsgPackSerializer = MsgPackSerializer;
static PROTOBUF: ProtobufSerializer = ProtobufSerializer;

/// Look up the serializer for a header tag.
pub fn load_serializer(tag: u8) -> Result<&'static dyn Serializer> {
    Ok(match SerializeType::try_from(tag)? {
        SerializeType::MsgPack => &MSGPACK,
        SerializeType::Protobuf => &PROTOBUF,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(SerializeType::MsgPack as u8, 0);
        assert_eq!(SerializeType::Protobuf as u8, 1);
        assert_eq!(SerializeType::try_from(1).unwrap(), SerializeType::Protobuf);
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(load_serializer(2), Err(RpcError::Codec(_))));
    }
}
