//! Single-shot TCP client.
//!
//! One connection carries one request: the server closes it after writing
//! the response, so a `TcpClient` must [`connect`](TcpClient::connect)
//! again before every [`invoke`](TcpClient::invoke).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::CallContext;
use crate::config::ClientOptions;
use crate::error::{RpcError, Result};
use crate::protocol::{
    decode_message, encode_message, read_frame, write_frame, Message, Request, Response,
};
use crate::registry::{Registry, RegistryOptions};
use crate::transport::dial;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Next process-wide request id.
#[inline]
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// TCP client that sends one request per connection.
pub struct TcpClient {
    options: ClientOptions,
    discovery: Option<(Arc<dyn Registry>, RegistryOptions)>,
    stream: Option<TcpStream>,
}

impl TcpClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            discovery: None,
            stream: None,
        }
    }

    /// Resolve service addresses through a discovery backend.
    pub fn with_registry(mut self, registry: Arc<dyn Registry>, options: RegistryOptions) -> Self {
        self.discovery = Some((registry, options));
        self
    }

    #[inline]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Whether a connection is open and unused.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Resolve the address of `service_name` and dial it.
    ///
    /// Without a discovery backend the configured `host:port` is used.
    pub async fn connect(&mut self, service_name: &str) -> Result<()> {
        let address = self.resolve(service_name).await?;
        tracing::debug!("Connecting to {} at {}", service_name, address);
        self.stream = Some(dial(&address, self.options.connect_timeout).await?);
        Ok(())
    }

    async fn resolve(&self, service_name: &str) -> Result<String> {
        match &self.discovery {
            Some((registry, options)) => {
                registry.create_client(options).await?;
                registry.get_address(service_name).await
            }
            None => Ok(format!("{}:{}", self.options.host, self.options.port)),
        }
    }

    /// Send `service.method(args)` and wait for the response.
    ///
    /// The wait is bounded by the context deadline; expiry yields
    /// [`RpcError::Cancelled`]. The connection is consumed either way.
    pub async fn invoke(
        &mut self,
        ctx: &CallContext,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Response> {
        let mut stream = self.stream.take().ok_or(RpcError::ConnectionClosed)?;

        let request_id = next_request_id();
        let request = Message::Request(Request::new(request_id, service, method, args));
        let frame = encode_message(
            &request,
            self.options.compress_type as u8,
            self.options.serialize_type as u8,
        )?;

        let max_frame_size = self.options.max_frame_size;
        let exchange = async {
            write_frame(&mut stream, &frame).await?;
            let reply = read_frame(&mut stream, max_frame_size).await?;
            decode_message(&reply, max_frame_size)
        };

        let reply = match ctx.deadline() {
            Some(deadline) => tokio::time::timeout_at(deadline, exchange)
                .await
                .map_err(|_| RpcError::Cancelled)??,
            None => exchange.await?,
        };

        let response = match reply {
            Message::Response(response) => response,
            Message::Request(_) => {
                return Err(RpcError::Protocol(
                    "expected a response frame, got a request".into(),
                ))
            }
        };

        // Admission rejections are sent before the request is read.
        if response.request_id != request_id && !response.is_rate_limited() {
            return Err(RpcError::Protocol(format!(
                "response id {} does not match request id {}",
                response.request_id, request_id
            )));
        }

        Ok(response)
    }

    /// Drop the connection if one is still open.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_increase() {
        let first = next_request_id();
        let second = next_request_id();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_invoke_without_connect() {
        let mut client = TcpClient::new(ClientOptions::default());
        let result = client
            .invoke(&CallContext::background(), "Calc", "Add", vec![])
            .await;
        assert!(matches!(result, Err(RpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_resolve_fallback_address() {
        let client = TcpClient::new(ClientOptions::new().address("10.0.0.7", 7000));
        assert_eq!(client.resolve("Calc").await.unwrap(), "10.0.0.7:7000");
    }

    #[tokio::test]
    async fn test_resolve_through_registry() {
        let registry = crate::registry::StaticRegistry::new().with_service("Calc", "10.0.0.8:1");
        let client = TcpClient::new(ClientOptions::default())
            .with_registry(Arc::new(registry), RegistryOptions::default());
        assert_eq!(client.resolve("Calc").await.unwrap(), "10.0.0.8:1");
        assert!(client.resolve("Other").await.is_err());
    }
}
