//! Retrying call proxy.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{CallContext, TcpClient};
use crate::config::ClientOptions;
use crate::error::{RpcError, Result};
use crate::registry::{Registry, RegistryOptions};

/// Calls remote methods with bounded retries.
///
/// Every attempt resolves the service address, opens a fresh connection and
/// invokes once. Any failure is retried immediately, including non-200
/// responses; after `retries` attempts the errors of all attempts are
/// returned as [`RpcError::RetriesExhausted`].
///
/// # Example
///
/// ```no_run
/// use rookie_rpc::{CallContext, ClientOptions, ClientProxy};
///
/// # #[tokio::main]
/// # async fn main() -> rookie_rpc::Result<()> {
/// let proxy = ClientProxy::new(ClientOptions::new().address("127.0.0.1", 9222));
/// let sum: i64 = proxy
///     .call_as(&CallContext::background(), "Calc", "Add", vec![2.into(), 3.into()])
///     .await?;
/// assert_eq!(sum, 5);
/// # Ok(())
/// # }
/// ```
pub struct ClientProxy {
    options: ClientOptions,
    discovery: Option<(Arc<dyn Registry>, RegistryOptions)>,
}

impl ClientProxy {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            discovery: None,
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

    /// Call `service.method(args)` and return the response data.
    pub async fn call(
        &self,
        ctx: &CallContext,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let retries = self.options.retries;
        let mut errors = Vec::with_capacity(retries);

        for attempt in 1..=retries {
            match self.attempt(ctx, service, method, args.clone()).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    tracing::warn!(
                        "Call {}.{} attempt {}/{} failed: {}",
                        service,
                        method,
                        attempt,
                        retries,
                        e
                    );
                    errors.push(e);
                }
            }
        }

        Err(RpcError::RetriesExhausted {
            attempts: retries,
            errors,
        })
    }

    /// Like [`call`](Self::call), deserializing the data into `T`.
    pub async fn call_as<T>(
        &self,
        ctx: &CallContext,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let data = self.call(ctx, service, method, args).await?;
        serde_json::from_value(data).map_err(|e| RpcError::Codec(e.to_string()))
    }

    async fn attempt(
        &self,
        ctx: &CallContext,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let mut client = TcpClient::new(self.options.clone());
        if let Some((registry, options)) = &self.discovery {
            client = client.with_registry(Arc::clone(registry), options.clone());
        }

        client.connect(service).await?;
        let outcome = client.invoke(ctx, service, method, args).await;
        client.close().await?;

        let response = outcome?;
        if response.is_ok() {
            Ok(response.data)
        } else {
            Err(RpcError::Remote {
                code: response.code,
                msg: response.msg,
            })
        }
    }
}
