//! Handler module - service registration and dispatch.
//!
//! Provides:
//! - [`Service`] - a service instance plus its exposed methods
//! - [`ServiceTable`] - maps `(service, method)` names to handlers
//!
//! # Example
//!
//! ```ignore
//! use rookie_rpc::handler::{Service, ServiceTable};
//!
//! let mut table = ServiceTable::new();
//!
//! // Synchronous method: arguments arrive as a tuple
//! let calc = Service::new(Calc::default())
//!     .method("Add", |c: &Calc, (a, b): (i64, i64)| c.add(a, b))
//!     // Async method: the instance is handed over as an Arc
//!     .async_method("Slow", |c: Arc<Calc>, (n,): (u64,)| async move { c.slow(n).await });
//!
//! table.register("Calc", calc)?;
//! ```

mod registry;

pub use registry::{
    AsyncHandler, BoxFuture, Handler, HandlerResult, Service, ServiceTable, TypedHandler,
};
