//! # rookie-rpc
//!
//! Point-to-point RPC over TCP with a fixed 17-byte binary header,
//! pluggable body serialization and compression, name-based service
//! dispatch and a retrying client proxy.
//!
//! ## Architecture
//!
//! - **Wire**: `magic | version | full_length | type | compress | serialize | request_id`,
//!   then a serialized-then-compressed body
//! - **Server**: one request per connection, served by a reader task and a
//!   writer task joined by a single-slot channel, gated by an optional token bucket
//! - **Client**: [`TcpClient`] sends one request per connection;
//!   [`ClientProxy`] retries with a fresh connection per attempt
//! - **Discovery**: services are published to and resolved from a
//!   [`Registry`](registry::Registry) backend
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rookie_rpc::{CallContext, ClientOptions, ClientProxy, RpcServer, ServerConfig, Service};
//!
//! struct Calc;
//!
//! #[tokio::main]
//! async fn main() -> rookie_rpc::Result<()> {
//!     let mut server = RpcServer::bind(ServerConfig::new("127.0.0.1", 9222)).await?;
//!     server
//!         .register(
//!             "Calc",
//!             Service::new(Calc).method("Add", |_: &Calc, (a, b): (i64, i64)| {
//!                 Ok::<_, String>(a + b)
//!             }),
//!         )
//!         .await?;
//!
//!     let server = Arc::new(server);
//!     tokio::spawn({
//!         let server = Arc::clone(&server);
//!         async move { server.run().await }
//!     });
//!
//!     let proxy = ClientProxy::new(ClientOptions::default());
//!     let sum = proxy
//!         .call(&CallContext::background(), "Calc", "Add", vec![2.into(), 3.into()])
//!         .await?;
//!     assert_eq!(sum, 5);
//!
//!     server.stop();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod compress;
pub mod config;
pub mod error;
pub mod handler;
pub mod limiter;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

mod connection;

pub use client::{CallContext, ClientProxy, TcpClient};
pub use config::{ClientOptions, LimiterConfig, ServerConfig};
pub use error::{Result, RpcError};
pub use handler::Service;
pub use server::RpcServer;
