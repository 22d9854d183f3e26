//! Error types for rookie-rpc.

use thiserror::Error;

/// Main error type for all RPC operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Socket-level failure (connect, read, write, unexpected EOF).
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Malformed frame: bad magic number, unsupported version, bad length.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unknown serializer tag or a body that fails to (de)serialize.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Unknown compressor tag or a body that fails to (de)compress.
    #[error("Compression error: {0}")]
    Compression(String),

    /// No service registered under the requested name.
    #[error("no service found: {0}")]
    ServiceNotFound(String),

    /// The service exists but has no method with the requested name.
    #[error("no service method found: {service}.{method}")]
    MethodNotFound {
        /// Service name from the request.
        service: String,
        /// Method name from the request.
        method: String,
    },

    /// The supplied arguments do not fit the method's parameter types.
    #[error("argument conversion failed for {method}: {reason}")]
    ArgumentConversion {
        /// Method name from the request.
        method: String,
        /// Underlying conversion failure.
        reason: String,
    },

    /// The target method returned a business error.
    #[error("{0}")]
    Application(String),

    /// Admission control rejected the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Invalid setup (duplicate service, empty name, service without methods).
    #[error("Registration error: {0}")]
    Registration(String),

    /// Service discovery backend failure.
    #[error("Registry error: {0}")]
    Registry(String),

    /// The server answered with a non-success status code.
    #[error("remote call failed with code {code}: {msg}")]
    Remote {
        /// Response status code.
        code: i16,
        /// Response message.
        msg: String,
    },

    /// The call deadline elapsed before a response arrived.
    #[error("call cancelled: deadline exceeded")]
    Cancelled,

    /// Every retry attempt failed.
    #[error("all {attempts} attempts failed; last error: {}", last_error(.errors))]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Error of each attempt, in order.
        errors: Vec<RpcError>,
    },

    /// Connection closed before the exchange completed.
    #[error("Connection closed")]
    ConnectionClosed,
}

fn last_error(errors: &[RpcError]) -> String {
    errors
        .last()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

impl RpcError {
    /// Whether this failure is reported to the caller as a `Response{Code:500}`.
    ///
    /// Protocol, codec and transport failures instead drop the connection.
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            RpcError::ServiceNotFound(_)
                | RpcError::MethodNotFound { .. }
                | RpcError::ArgumentConversion { .. }
                | RpcError::Application(_)
        )
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
