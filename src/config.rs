//! Server and client configuration.
//!
//! Every struct has a `Default` matching the protocol's stock settings, fluent
//! setters for programmatic setup, and serde derives so it can be loaded from
//! a JSON document:
//!
//! ```
//! use rookie_rpc::config::ClientOptions;
//!
//! let options: ClientOptions = serde_json::from_str(r#"{"port": 7000, "retries": 5}"#).unwrap();
//! assert_eq!(options.port, 7000);
//! assert_eq!(options.retries, 5);
//! assert_eq!(options.host, "127.0.0.1");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::SerializeType;
use crate::compress::CompressType;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default host for servers and clients.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port for servers and clients.
pub const DEFAULT_PORT: u16 = 9222;

/// Default number of call attempts made by the proxy.
pub const DEFAULT_RETRIES: usize = 3;

/// Default dial timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on the admission-control wait.
///
/// Zero rejects a connection as soon as the bucket is empty.
pub const DEFAULT_LIMITER_TIMEOUT: Duration = Duration::ZERO;

/// Token-bucket settings for admission control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Tokens added per second.
    pub rate: u32,
    /// Bucket capacity.
    pub burst: u32,
    /// How long a connection may wait for a token before it is rejected.
    pub timeout: Duration,
}

impl LimiterConfig {
    pub fn new(rate: u32, burst: u32) -> Self {
        Self {
            rate,
            burst,
            timeout: DEFAULT_LIMITER_TIMEOUT,
        }
    }

    /// Set the admission wait bound.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host; also the host published to service discovery.
    pub host: String,
    /// Bind port; `0` picks an ephemeral port.
    pub port: u16,
    /// Admission control, disabled when `None`.
    pub limiter: Option<LimiterConfig>,
    /// Largest accepted `full_length`.
    pub max_frame_size: u32,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Enable admission control.
    pub fn limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the largest accepted frame.
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }

    /// `host:port` string for binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            limiter: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Client and proxy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Fallback host when no discovery backend is configured.
    pub host: String,
    /// Fallback port when no discovery backend is configured.
    pub port: u16,
    /// Attempts made by the proxy before giving up.
    pub retries: usize,
    /// Dial timeout per attempt.
    pub connect_timeout: Duration,
    /// Serializer used for requests.
    pub serialize_type: SerializeType,
    /// Compressor used for requests.
    pub compress_type: CompressType,
    /// Largest accepted response frame.
    pub max_frame_size: u32,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback address.
    pub fn address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the number of attempts.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Set the dial timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request serializer.
    pub fn serialize_type(mut self, serialize_type: SerializeType) -> Self {
        self.serialize_type = serialize_type;
        self
    }

    /// Set the request compressor.
    pub fn compress_type(mut self, compress_type: CompressType) -> Self {
        self.compress_type = compress_type;
        self
    }

    /// Set the largest accepted response frame.
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            retries: DEFAULT_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            serialize_type: SerializeType::MsgPack,
            compress_type: CompressType::Gzip,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.host, "127.0.0.1");
        assert_eq!(options.port, 9222);
        assert_eq!(options.retries, 3);
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.serialize_type, SerializeType::MsgPack);
        assert_eq!(options.compress_type, CompressType::Gzip);
    }

    #[test]
    fn test_client_builder() {
        let options = ClientOptions::new()
            .address("10.0.0.1", 7000)
            .retries(5)
            .connect_timeout(Duration::from_millis(250))
            .serialize_type(SerializeType::Protobuf)
            .max_frame_size(1024);

        assert_eq!(options.host, "10.0.0.1");
        assert_eq!(options.port, 7000);
        assert_eq!(options.retries, 5);
        assert_eq!(options.connect_timeout, Duration::from_millis(250));
        assert_eq!(options.serialize_type, SerializeType::Protobuf);
        assert_eq!(options.max_frame_size, 1024);
    }

    #[test]
    fn test_server_config_from_json() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"port": 0, "limiter": {"rate": 1, "burst": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.address(), "127.0.0.1:0");
        let limiter = config.limiter.unwrap();
        assert_eq!((limiter.rate, limiter.burst), (1, 1));
        assert_eq!(limiter.timeout, DEFAULT_LIMITER_TIMEOUT);
        assert!(limiter.timeout.is_zero());
    }

    #[test]
    fn test_serializer_names_in_json() {
        let options: ClientOptions =
            serde_json::from_str(r#"{"serialize_type": "protobuf"}"#).unwrap();
        assert_eq!(options.serialize_type, SerializeType::Protobuf);
    }
}
