//! Protobuf serializer using `prost`.
//!
//! Request and response bodies follow a fixed schema. Dynamic argument and
//! result values travel as a small tagged value tree that keeps the JSON
//! number kinds apart: signed and unsigned integers use varints, so every
//! `i64` and `u64` crosses the wire exactly, and floats stay floats.

use std::collections::BTreeMap;

use prost::Message as ProstMessage;
use serde_json::{Map, Number, Value};

use super::Serializer;
use crate::error::{RpcError, Result};
use crate::protocol::{Message, MessageType, Request, Response};

#[derive(Clone, PartialEq, prost::Message)]
struct RequestProto {
    #[prost(uint64, tag = "1")]
    request_id: u64,
    #[prost(string, tag = "2")]
    service_name: String,
    #[prost(string, tag = "3")]
    method_name: String,
    #[prost(message, repeated, tag = "4")]
    args: Vec<ValueProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ResponseProto {
    #[prost(uint64, tag = "1")]
    request_id: u64,
    #[prost(int32, tag = "2")]
    code: i32,
    #[prost(string, tag = "3")]
    msg: String,
    #[prost(uint32, tag = "4")]
    compress_type: u32,
    #[prost(uint32, tag = "5")]
    serialize_type: u32,
    #[prost(message, optional, tag = "6")]
    data: Option<ValueProto>,
}

/// One dynamic value. An unset kind is null.
#[derive(Clone, PartialEq, prost::Message)]
struct ValueProto {
    #[prost(oneof = "ValueKind", tags = "1, 2, 3, 4, 5, 6, 7")]
    kind: Option<ValueKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
enum ValueKind {
    #[prost(bool, tag = "1")]
    Bool(bool),
    #[prost(sint64, tag = "2")]
    Int(i64),
    #[prost(uint64, tag = "3")]
    Uint(u64),
    #[prost(double, tag = "4")]
    Double(f64),
    #[prost(string, tag = "5")]
    Str(String),
    #[prost(message, tag = "6")]
    List(ListProto),
    #[prost(message, tag = "7")]
    Object(StructProto),
}

#[derive(Clone, PartialEq, prost::Message)]
struct ListProto {
    #[prost(message, repeated, tag = "1")]
    values: Vec<ValueProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct StructProto {
    #[prost(btree_map = "string, message", tag = "1")]
    fields: BTreeMap<String, ValueProto>,
}

/// Protocol Buffers serializer (tag 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufSerializer;

impl Serializer for ProtobufSerializer {
    fn serialize(&self, message: &Message) -> Result<Vec<u8>> {
        Ok(match message {
            Message::Request(req) => RequestProto {
                request_id: req.request_id,
                service_name: req.service_name.clone(),
                method_name: req.method_name.clone(),
                args: req.args.iter().map(to_proto).collect(),
            }
            .encode_to_vec(),
            Message::Response(rsp) => ResponseProto {
                request_id: rsp.request_id,
                code: i32::from(rsp.code),
                msg: rsp.msg.clone(),
                compress_type: u32::from(rsp.compress_type),
                serialize_type: u32::from(rsp.serialize_type),
                data: Some(to_proto(&rsp.data)),
            }
            .encode_to_vec(),
        })
    }

    fn deserialize(&self, target: MessageType, bytes: &[u8]) -> Result<Message> {
        match target {
            MessageType::Request => {
                let proto = RequestProto::decode(bytes).map_err(codec_error)?;
                Ok(Message::Request(Request {
                    request_id: proto.request_id,
                    service_name: proto.service_name,
                    method_name: proto.method_name,
                    args: proto.args.into_iter().map(from_proto).collect(),
                }))
            }
            MessageType::Response => {
                let proto = ResponseProto::decode(bytes).map_err(codec_error)?;
                Ok(Message::Response(Response {
                    request_id: proto.request_id,
                    code: narrow(proto.code, "code")?,
                    msg: proto.msg,
                    compress_type: narrow(proto.compress_type, "compress_type")?,
                    serialize_type: narrow(proto.serialize_type, "serialize_type")?,
                    data: proto.data.map(from_proto).unwrap_or(Value::Null),
                }))
            }
            other => Err(RpcError::Codec(format!("no body shape for {other:?}"))),
        }
    }
}

fn codec_error(err: prost::DecodeError) -> RpcError {
    RpcError::Codec(err.to_string())
}

fn narrow<S, T>(value: S, field: &str) -> Result<T>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| RpcError::Codec(format!("{field} out of range: {value}")))
}

fn to_proto(value: &Value) -> ValueProto {
    let kind = match value {
        Value::Null => None,
        Value::Bool(b) => Some(ValueKind::Bool(*b)),
        Value::Number(n) => Some(number_to_proto(n)),
        Value::String(s) => Some(ValueKind::Str(s.clone())),
        Value::Array(items) => Some(ValueKind::List(ListProto {
            values: items.iter().map(to_proto).collect(),
        })),
        Value::Object(map) => Some(ValueKind::Object(StructProto {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), to_proto(v)))
                .collect(),
        })),
    };
    ValueProto { kind }
}

fn number_to_proto(n: &Number) -> ValueKind {
    if let Some(i) = n.as_i64() {
        ValueKind::Int(i)
    } else if let Some(u) = n.as_u64() {
        ValueKind::Uint(u)
    } else {
        ValueKind::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn from_proto(value: ValueProto) -> Value {
    match value.kind {
        None => Value::Null,
        Some(ValueKind::Bool(b)) => Value::Bool(b),
        Some(ValueKind::Int(i)) => Value::from(i),
        Some(ValueKind::Uint(u)) => Value::from(u),
        // NaN and infinities have no JSON form.
        Some(ValueKind::Double(d)) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(ValueKind::Str(s)) => Value::String(s),
        Some(ValueKind::List(list)) => {
            Value::Array(list.values.into_iter().map(from_proto).collect())
        }
        Some(ValueKind::Object(st)) => Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, from_proto(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_roundtrip() {
        let req = Message::Request(Request::new(
            77,
            "Calc",
            "Add",
            vec![json!(2), json!(-3), json!(0.25), json!("s"), json!({"a": [1, null, true]})],
        ));
        let bytes = ProtobufSerializer.serialize(&req).unwrap();
        assert_eq!(
            ProtobufSerializer
                .deserialize(MessageType::Request, &bytes)
                .unwrap(),
            req
        );
    }

    #[test]
    fn test_response_roundtrip() {
        let rsp = Message::Response(Response::ok(5, json!({"sum": 5})).with_tags(0, 1));
        let bytes = ProtobufSerializer.serialize(&rsp).unwrap();
        assert_eq!(
            ProtobufSerializer
                .deserialize(MessageType::Response, &bytes)
                .unwrap(),
            rsp
        );
    }

    #[test]
    fn test_numbers_cross_exactly() {
        let args = vec![
            json!(i64::MAX),
            json!(i64::MIN),
            json!(u64::MAX),
            json!((1u64 << 60) + 1),
            json!(2.0),
            json!(-0.5),
        ];
        let req = Message::Request(Request::new(1, "Calc", "Add", args.clone()));
        let bytes = ProtobufSerializer.serialize(&req).unwrap();

        let Message::Request(decoded) = ProtobufSerializer
            .deserialize(MessageType::Request, &bytes)
            .unwrap()
        else {
            panic!("expected request");
        };
        assert_eq!(decoded.args, args);
        assert_eq!(decoded.args[0].as_i64(), Some(i64::MAX));
        assert_eq!(decoded.args[2].as_u64(), Some(u64::MAX));
        assert!(decoded.args[4].is_f64());
        assert_eq!(decoded.args[4].as_f64(), Some(2.0));
    }

    #[test]
    fn test_non_finite_double_is_null() {
        let value = ValueProto {
            kind: Some(ValueKind::Double(f64::NAN)),
        };
        assert_eq!(from_proto(value), Value::Null);
    }

    #[test]
    fn test_missing_data_is_null() {
        let bytes = ResponseProto {
            request_id: 1,
            code: 500,
            msg: "no service found".into(),
            compress_type: 0,
            serialize_type: 1,
            data: None,
        }
        .encode_to_vec();
        match ProtobufSerializer
            .deserialize(MessageType::Response, &bytes)
            .unwrap()
        {
            Message::Response(rsp) => assert_eq!(rsp.data, Value::Null),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_code_rejected() {
        let bytes = ResponseProto {
            code: 100_000,
            ..Default::default()
        }
        .encode_to_vec();
        assert!(ProtobufSerializer
            .deserialize(MessageType::Response, &bytes)
            .is_err());
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let result = ProtobufSerializer.deserialize(MessageType::Request, &[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(RpcError::Codec(_))));
    }
}
