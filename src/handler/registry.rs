//! Service table for dispatching requests by `(service, method)` name.
//!
//! Every method is wrapped at registration time in a fixed-signature
//! [`Handler`] that converts the positional argument list into the method's
//! parameter tuple and the return value back into a dynamic [`Value`].
//! Dispatch is a plain map lookup; nothing is resolved per call.
//!
//! # Example
//!
//! ```
//! use rookie_rpc::handler::{Service, ServiceTable};
//!
//! struct Calc;
//!
//! impl Calc {
//!     fn add(&self, a: i64, b: i64) -> Result<i64, String> {
//!         Ok(a + b)
//!     }
//! }
//!
//! let mut table = ServiceTable::new();
//! let calc = Service::new(Calc).method("Add", |c: &Calc, (a, b): (i64, i64)| c.add(a, b));
//! table.register("Calc", calc).unwrap();
//! assert!(table.contains("Calc", "Add"));
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{RpcError, Result};
use crate::protocol::{Request, Response, CODE_ERROR};

/// Result type for handler functions: the method's return value or a failure.
pub type HandlerResult = Result<Value>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for registered methods.
pub trait Handler: Send + Sync + 'static {
    /// Invoke the method with positional arguments.
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult>;
}

/// Convert positional arguments into the parameter tuple `A`.
///
/// Zero-argument methods take `()`, which only deserializes from `null`.
fn convert_args<A: DeserializeOwned>(method: &str, args: Vec<Value>) -> Result<A> {
    if args.is_empty() {
        if let Ok(unit) = serde_json::from_value(Value::Null) {
            return Ok(unit);
        }
    }
    serde_json::from_value(Value::Array(args)).map_err(|e| RpcError::ArgumentConversion {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn convert_return<R: Serialize, E: Display>(
    result: std::result::Result<R, E>,
) -> HandlerResult {
    match result {
        Ok(value) => serde_json::to_value(value).map_err(|e| RpcError::Codec(e.to_string())),
        Err(e) => Err(RpcError::Application(e.to_string())),
    }
}

/// Wrapper around a synchronous method `Fn(&T, A) -> Result<R, E>`.
pub struct TypedHandler<T, F, A, R, E> {
    instance: Arc<T>,
    method: String,
    handler: F,
    _phantom: PhantomData<fn(A) -> (R, E)>,
}

impl<T, F, A, R, E> Handler for TypedHandler<T, F, A, R, E>
where
    T: Send + Sync + 'static,
    F: Fn(&T, A) -> std::result::Result<R, E> + Send + Sync + 'static,
    A: DeserializeOwned + 'static,
    R: Serialize + 'static,
    E: Display + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        let result = convert_args::<A>(&self.method, args)
            .and_then(|parsed| convert_return((self.handler)(&self.instance, parsed)));
        Box::pin(async move { result })
    }
}

/// Wrapper around an async method `Fn(Arc<T>, A) -> impl Future<Output = Result<R, E>>`.
pub struct AsyncHandler<T, F, A, R, E, Fut> {
    instance: Arc<T>,
    method: String,
    handler: F,
    _phantom: PhantomData<fn(A) -> (R, E, Fut)>,
}

impl<T, F, A, R, E, Fut> Handler for AsyncHandler<T, F, A, R, E, Fut>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    A: DeserializeOwned + 'static,
    R: Serialize + 'static,
    E: Display + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        let parsed = match convert_args::<A>(&self.method, args) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(self.instance.clone(), parsed);
        Box::pin(async move { convert_return(fut.await) })
    }
}

/// A service instance plus the methods it exposes, built before registration.
pub struct Service<T> {
    instance: Arc<T>,
    methods: HashMap<String, Box<dyn Handler>>,
}

impl<T: Send + Sync + 'static> Service<T> {
    /// Wrap a service instance.
    pub fn new(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    /// Wrap an instance that is already shared.
    pub fn from_arc(instance: Arc<T>) -> Self {
        Self {
            instance,
            methods: HashMap::new(),
        }
    }

    /// Expose a synchronous method.
    ///
    /// `A` is the parameter tuple, e.g. `(i64, i64)`; the last return value
    /// is the `Result` error channel.
    pub fn method<F, A, R, E>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&T, A) -> std::result::Result<R, E> + Send + Sync + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
    {
        let typed = TypedHandler {
            instance: self.instance.clone(),
            method: name.to_string(),
            handler,
            _phantom: PhantomData,
        };
        self.methods.insert(name.to_string(), Box::new(typed));
        self
    }

    /// Expose an async method.
    pub fn async_method<F, A, R, E, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Arc<T>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
    {
        let typed = AsyncHandler {
            instance: self.instance.clone(),
            method: name.to_string(),
            handler,
            _phantom: PhantomData,
        };
        self.methods.insert(name.to_string(), Box::new(typed));
        self
    }

    /// Names of the exposed methods.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

/// Table mapping service names to their method handlers.
///
/// Populated during setup; the server shares it read-only once it runs.
#[derive(Default)]
pub struct ServiceTable {
    services: HashMap<String, HashMap<String, Box<dyn Handler>>>,
}

impl ServiceTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under `name`.
    ///
    /// Fails when the name is empty, already taken, or the service exposes
    /// no methods.
    pub fn register<T>(&mut self, name: &str, service: Service<T>) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RpcError::Registration("service name must not be empty".into()));
        }
        if self.services.contains_key(name) {
            return Err(RpcError::Registration(format!(
                "service {name} already registered"
            )));
        }
        if service.methods.is_empty() {
            return Err(RpcError::Registration(format!(
                "service {name} exposes no methods"
            )));
        }

        tracing::debug!(
            "Service {} exposes [{}]",
            name,
            service.method_names().collect::<Vec<_>>().join(", ")
        );
        self.services.insert(name.to_string(), service.methods);
        Ok(())
    }

    /// Remove the service registered under `name`.
    ///
    /// Returns whether it was present.
    pub fn deregister(&mut self, name: &str) -> bool {
        self.services.remove(name).is_some()
    }

    /// Whether `service.method` is registered.
    pub fn contains(&self, service: &str, method: &str) -> bool {
        self.services
            .get(service)
            .is_some_and(|methods| methods.contains_key(method))
    }

    /// Registered service names.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Look up and invoke `service.method(args)`.
    pub async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> HandlerResult {
        let methods = self
            .services
            .get(service)
            .ok_or_else(|| RpcError::ServiceNotFound(service.to_string()))?;

        let handler = methods.get(method).ok_or_else(|| RpcError::MethodNotFound {
            service: service.to_string(),
            method: method.to_string(),
        })?;

        handler.call(args).await
    }

    /// Dispatch a decoded request and build its response.
    ///
    /// Every failure becomes `Response{Code:500}` with the error as message.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request {
            request_id,
            service_name,
            method_name,
            args,
        } = request;

        match self.call(&service_name, &method_name, args).await {
            Ok(data) => Response::ok(request_id, data),
            Err(e) => {
                if e.is_dispatch_error() {
                    tracing::debug!("Dispatch of {}.{} failed: {}", service_name, method_name, e);
                } else {
                    tracing::error!("Dispatch of {}.{} failed: {}", service_name, method_name, e);
                }
                Response::error(request_id, CODE_ERROR, e.to_string())
            }
        }
    }
}
