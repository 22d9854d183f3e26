//! Calc demo: one server, one retrying client.
//!
//! ```text
//! RUST_LOG=rookie_rpc=debug cargo run --example calc
//! ```

use std::sync::Arc;
use std::time::Duration;

use rookie_rpc::codec::SerializeType;
use rookie_rpc::registry::{MemoryRegistry, RegistryOptions};
use rookie_rpc::{CallContext, ClientOptions, ClientProxy, RpcServer, ServerConfig, Service};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Calc;

impl Calc {
    fn add(&self, a: i64, b: i64) -> Result<i64, String> {
        Ok(a + b)
    }

    fn div(&self, a: f64, b: f64) -> Result<f64, String> {
        if b == 0.0 {
            return Err("division by zero".into());
        }
        Ok(a / b)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let registry = MemoryRegistry::new();

    let mut server = RpcServer::bind(ServerConfig::new("127.0.0.1", 0)).await?;
    server.set_limiter(100, 10)?;
    server.set_registry(Arc::new(registry.clone()), RegistryOptions::default());
    server
        .register(
            "Calc",
            Service::new(Calc)
                .method("Add", |c: &Calc, (a, b): (i64, i64)| c.add(a, b))
                .method("Div", |c: &Calc, (a, b): (f64, f64)| c.div(a, b)),
        )
        .await?;

    let server = Arc::new(server);
    tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    for serialize_type in [SerializeType::MsgPack, SerializeType::Protobuf] {
        let proxy = ClientProxy::new(ClientOptions::new().serialize_type(serialize_type))
            .with_registry(Arc::new(registry.clone()), RegistryOptions::default());
        let ctx = CallContext::with_timeout(Duration::from_secs(2));

        let sum: i64 = proxy
            .call_as(&ctx, "Calc", "Add", vec![json!(2), json!(3)])
            .await?;
        info!("[{:?}] Calc.Add(2, 3) = {}", serialize_type, sum);

        match proxy
            .call(&ctx, "Calc", "Div", vec![json!(1), json!(0)])
            .await
        {
            Ok(value) => info!("[{:?}] Calc.Div(1, 0) = {}", serialize_type, value),
            Err(e) => info!("[{:?}] Calc.Div(1, 0) failed: {}", serialize_type, e),
        }
    }

    server.stop();
    Ok(())
}
