//! Client side: single-shot invoker, retrying proxy, call context.
//!
//! - [`TcpClient`] - one connection, one request, one response
//! - [`ClientProxy`] - fresh connection per attempt, bounded retries
//! - [`CallContext`] - optional deadline bounding the response wait

mod context;
mod invoker;
mod proxy;

pub use context::CallContext;
pub use invoker::{next_request_id, TcpClient};
pub use proxy::ClientProxy;
