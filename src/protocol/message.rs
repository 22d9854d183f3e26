//! Request and response bodies carried inside a frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire_format::MessageType;

/// Status code of a successful call.
pub const CODE_OK: i16 = 200;

/// Status code of a dispatch or application failure.
pub const CODE_ERROR: i16 = 500;

/// Status code of a request rejected by admission control.
pub const CODE_RATE_LIMITED: i16 = 700;

/// A call to `service_name.method_name(args...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: u64,
    pub service_name: String,
    pub method_name: String,
    /// Positional, dynamically typed arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(
        request_id: u64,
        service_name: impl Into<String>,
        method_name: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            request_id,
            service_name: service_name.into(),
            method_name: method_name.into(),
            args,
        }
    }
}

/// Outcome of one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    /// 200 success, 500 dispatch/application error, 700 rate limited.
    pub code: i16,
    #[serde(default)]
    pub msg: String,
    /// Compressor tag that decoded the paired request.
    pub compress_type: u8,
    /// Serializer tag that decoded the paired request.
    pub serialize_type: u8,
    /// Result value, `Null` when the call failed.
    #[serde(default)]
    pub data: Value,
}

impl Response {
    /// Successful response carrying `data`.
    pub fn ok(request_id: u64, data: Value) -> Self {
        Self {
            request_id,
            code: CODE_OK,
            msg: String::new(),
            compress_type: 0,
            serialize_type: 0,
            data,
        }
    }

    /// Failed response with the given status code.
    pub fn error(request_id: u64, code: i16, msg: impl Into<String>) -> Self {
        Self {
            request_id,
            code,
            msg: msg.into(),
            compress_type: 0,
            serialize_type: 0,
            data: Value::Null,
        }
    }

    /// Echo the tags used to decode the paired request.
    pub fn with_tags(mut self, compress_type: u8, serialize_type: u8) -> Self {
        self.compress_type = compress_type;
        self.serialize_type = serialize_type;
        self
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        self.code == CODE_RATE_LIMITED
    }
}

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    /// Header message type for this body.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Request(_) => MessageType::Request,
            Message::Response(_) => MessageType::Response,
        }
    }

    /// Correlation id carried in the body.
    pub fn request_id(&self) -> u64 {
        match self {
            Message::Request(req) => req.request_id,
            Message::Response(rsp) => rsp.request_id,
        }
    }
}
