//! Service discovery.
//!
//! The RPC core talks to a discovery backend only through the four-method
//! [`Registry`] contract: open a client, publish `name -> host:port`, resolve
//! a name, close. Backends such as etcd or nacos live outside this crate;
//! [`MemoryRegistry`] and [`StaticRegistry`] cover in-process and
//! fixed-address deployments.
//!
//! # Example
//!
//! ```
//! use rookie_rpc::registry::{MemoryRegistry, Registry, RegistryOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = MemoryRegistry::new();
//! registry.create_client(&RegistryOptions::default()).await.unwrap();
//! registry.register_service("Calc", "127.0.0.1", 9222).await.unwrap();
//! assert_eq!(registry.get_address("Calc").await.unwrap(), "127.0.0.1:9222");
//! # }
//! ```

mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT};
use crate::error::Result;

pub use memory::{MemoryRegistry, StaticRegistry};

/// Discovery backend contract.
///
/// `create_client` must be called before the other operations.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Open (or reopen) the backend connection.
    async fn create_client(&self, options: &RegistryOptions) -> Result<()>;

    /// Publish `name -> host:port`.
    async fn register_service(&self, name: &str, host: &str, port: u16) -> Result<()>;

    /// Resolve `name` to a `host:port` address.
    async fn get_address(&self, name: &str) -> Result<String>;

    /// Release the backend connection.
    async fn close(&self) -> Result<()>;
}

/// Discovery backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Backend endpoints, e.g. `["127.0.0.1:2379"]`.
    pub endpoints: Vec<String>,
    /// Backend dial timeout.
    pub dial_timeout: Duration,
    /// Name the server publishes under.
    pub service_name: String,
    /// Host the server publishes.
    pub host: String,
    /// Port the server publishes.
    pub port: u16,
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend endpoints.
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the backend dial timeout.
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            dial_timeout: DEFAULT_CONNECT_TIMEOUT,
            service_name: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = RegistryOptions::new()
            .endpoints(["127.0.0.1:2379", "127.0.0.1:2380"])
            .dial_timeout(Duration::from_secs(1));
        assert_eq!(options.endpoints.len(), 2);
        assert_eq!(options.dial_timeout, Duration::from_secs(1));
        assert_eq!(options.port, 9222);
    }

    #[test]
    fn test_options_from_json() {
        let options: RegistryOptions =
            serde_json::from_str(r#"{"endpoints": ["etcd:2379"], "service_name": "Calc"}"#)
                .unwrap();
        assert_eq!(options.endpoints, vec!["etcd:2379".to_string()]);
        assert_eq!(options.service_name, "Calc");
        assert_eq!(options.host, "127.0.0.1");
    }
}
