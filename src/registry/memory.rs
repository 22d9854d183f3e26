//! In-process discovery backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Registry, RegistryOptions};
use crate::error::{RpcError, Result};

/// Shared in-memory name table.
///
/// Clones share the same table, so a server and its clients can be handed
/// copies of one registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    connected: AtomicBool,
    services: RwLock<HashMap<String, String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.inner.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RpcError::Registry("registry client not created".into()))
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn create_client(&self, _options: &RegistryOptions) -> Result<()> {
        self.inner.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn register_service(&self, name: &str, host: &str, port: u16) -> Result<()> {
        self.ensure_connected()?;
        let address = format!("{host}:{port}");
        tracing::debug!("Publishing {} at {}", name, address);
        self.inner
            .services
            .write()
            .await
            .insert(name.to_string(), address);
        Ok(())
    }

    async fn get_address(&self, name: &str) -> Result<String> {
        self.ensure_connected()?;
        self.inner
            .services
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::Registry(format!("no address for {name}")))
    }

    async fn close(&self) -> Result<()> {
        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

/// Fixed name table, configured up front.
///
/// Publishing is accepted but ignored; resolution only sees the initial
/// entries.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    services: HashMap<String, String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed `name -> address` entry.
    pub fn with_service(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.services.insert(name.into(), address.into());
        self
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn create_client(&self, _options: &RegistryOptions) -> Result<()> {
        Ok(())
    }

    async fn register_service(&self, name: &str, host: &str, port: u16) -> Result<()> {
        tracing::debug!("Static registry ignores {} at {}:{}", name, host, port);
        Ok(())
    }

    async fn get_address(&self, name: &str) -> Result<String> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::Registry(format!("no address for {name}")))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
