//! RPC server: bind, register services, accept connections.
//!
//! # Example
//!
//! ```no_run
//! use rookie_rpc::{RpcServer, Service, ServerConfig};
//!
//! struct Calc;
//!
//! # #[tokio::main]
//! # async fn main() -> rookie_rpc::Result<()> {
//! let mut server = RpcServer::bind(ServerConfig::new("127.0.0.1", 9222)).await?;
//! server
//!     .register(
//!         "Calc",
//!         Service::new(Calc).method("Add", |_: &Calc, (a, b): (i64, i64)| Ok::<_, String>(a + b)),
//!     )
//!     .await?;
//! server.run().await
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{LimiterConfig, ServerConfig, DEFAULT_LIMITER_TIMEOUT};
use crate::connection::ConnectionHandler;
use crate::error::{RpcError, Result};
use crate::handler::{Service, ServiceTable};
use crate::limiter::AdmissionControl;
use crate::registry::{Registry, RegistryOptions};
use crate::transport::Listener;

/// First pause after a failed accept; doubles per consecutive failure.
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);

/// Longest pause between failed accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// TCP RPC server.
///
/// Services are registered through `&mut self` before [`run`](Self::run)
/// starts sharing the table with connection tasks; registering while the
/// server runs fails.
pub struct RpcServer {
    config: ServerConfig,
    listener: Listener,
    local_addr: SocketAddr,
    services: Arc<ServiceTable>,
    limiter: Option<Arc<AdmissionControl>>,
    discovery: Option<(Arc<dyn Registry>, RegistryOptions)>,
    shutdown: watch::Sender<bool>,
}

impl RpcServer {
    /// Bind the listener described by `config`.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = Listener::bind(&config.address()).await?;
        let local_addr = listener.local_addr()?;
        let limiter = match &config.limiter {
            Some(limiter) => Some(Arc::new(AdmissionControl::new(limiter)?)),
            None => None,
        };
        let (shutdown, _) = watch::channel(false);

        tracing::info!("RPC server listening on {}", local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
            services: Arc::new(ServiceTable::new()),
            limiter,
            discovery: None,
            shutdown,
        })
    }

    /// Address the server is bound to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Enable admission control: `rate` tokens per second, `burst` capacity.
    pub fn set_limiter(&mut self, rate: u32, burst: u32) -> Result<()> {
        let timeout = self
            .config
            .limiter
            .as_ref()
            .map(|limiter| limiter.timeout)
            .unwrap_or(DEFAULT_LIMITER_TIMEOUT);
        self.set_limiter_config(LimiterConfig::new(rate, burst).timeout(timeout))
    }

    /// Enable admission control with full settings.
    pub fn set_limiter_config(&mut self, config: LimiterConfig) -> Result<()> {
        self.limiter = Some(Arc::new(AdmissionControl::new(&config)?));
        self.config.limiter = Some(config);
        Ok(())
    }

    /// Publish registered services to a discovery backend.
    ///
    /// Applies to services registered after this call.
    pub fn set_registry(&mut self, registry: Arc<dyn Registry>, options: RegistryOptions) {
        self.discovery = Some((registry, options));
    }

    /// Register `service` under `name` and publish it when a discovery
    /// backend is configured.
    ///
    /// If publishing fails the service is removed again, so the name can be
    /// registered on a later attempt.
    pub async fn register<T>(&mut self, name: &str, service: Service<T>) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let services = Arc::get_mut(&mut self.services).ok_or_else(|| {
            RpcError::Registration(format!("cannot register {name} while the server is running"))
        })?;
        services.register(name, service)?;

        if let Err(e) = self.publish(name).await {
            tracing::warn!("Publishing service {} failed: {}", name, e);
            if let Some(services) = Arc::get_mut(&mut self.services) {
                services.deregister(name);
            }
            return Err(e);
        }

        tracing::debug!("Registered service {}", name);
        Ok(())
    }

    async fn publish(&self, name: &str) -> Result<()> {
        if let Some((registry, options)) = &self.discovery {
            registry.create_client(options).await?;
            registry
                .register_service(name, &self.config.host, self.local_addr.port())
                .await?;
        }
        Ok(())
    }

    /// Accept connections until [`stop`](Self::stop) is called.
    ///
    /// Each connection gets its own reader and writer task.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        let handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&self.services),
            self.limiter.clone(),
            self.config.max_frame_size,
        ));

        let mut accept_errors = 0u32;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        accept_errors = 0;
                        tracing::trace!("Accepted connection from {}", peer);
                        Arc::clone(&handler).serve(stream, peer.to_string());
                    }
                    Err(e) => {
                        // Errors such as EMFILE repeat until a descriptor frees up.
                        let pause = accept_backoff(accept_errors);
                        accept_errors = accept_errors.saturating_add(1);
                        tracing::error!("Accept error: {}; retrying in {:?}", e, pause);
                        tokio::select! {
                            _ = shutdown.changed() => {}
                            _ = tokio::time::sleep(pause) => {}
                        }
                    }
                },
            }
        }

        tracing::info!("RPC server on {} stopped", self.local_addr);
        Ok(())
    }

    /// Stop the accept loop.
    ///
    /// Connections already accepted finish their exchange.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Pause before the next accept after `consecutive_errors` earlier failures.
fn accept_backoff(consecutive_errors: u32) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1u32 << consecutive_errors.min(16))
        .min(ACCEPT_BACKOFF_MAX)
}
