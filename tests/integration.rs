//! Integration tests for rookie-rpc.
//!
//! Every test drives a real server bound to an ephemeral `127.0.0.1` port.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rookie_rpc::codec::SerializeType;
use rookie_rpc::protocol::{encode_message, Message, Request, CODE_ERROR, CODE_OK, CODE_RATE_LIMITED};
use rookie_rpc::registry::{MemoryRegistry, Registry, RegistryOptions};
use rookie_rpc::{
    CallContext, ClientOptions, ClientProxy, LimiterConfig, Result, RpcError, RpcServer,
    ServerConfig, Service, TcpClient,
};

struct Calc;

impl Calc {
    fn add(&self, a: i64, b: i64) -> std::result::Result<i64, String> {
        Ok(a + b)
    }

    fn div(&self, a: f64, b: f64) -> std::result::Result<f64, String> {
        if b == 0.0 {
            return Err("division by zero".to_string());
        }
        Ok(a / b)
    }
}

fn calc_service() -> Service<Calc> {
    Service::new(Calc)
        .method("Add", |c: &Calc, (a, b): (i64, i64)| c.add(a, b))
        .method("Div", |c: &Calc, (a, b): (f64, f64)| c.div(a, b))
        .method("Sum", |_: &Calc, (values,): (Vec<i64>,)| {
            Ok::<_, String>(values.iter().sum::<i64>())
        })
        .async_method("Echo", |_: Arc<Calc>, (s,): (String,)| async move {
            Ok::<_, String>(s)
        })
        .async_method("Sleep", |_: Arc<Calc>, (ms,): (u64,)| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, String>(ms)
        })
}

async fn start_server(config: ServerConfig) -> Arc<RpcServer> {
    let mut server = RpcServer::bind(config).await.unwrap();
    server.register("Calc", calc_service()).await.unwrap();

    let server = Arc::new(server);
    tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });
    server
}

async fn start_default_server() -> Arc<RpcServer> {
    start_server(ServerConfig::new("127.0.0.1", 0)).await
}

fn options_for(server: &RpcServer) -> ClientOptions {
    ClientOptions::new()
        .address("127.0.0.1", server.local_addr().port())
        .connect_timeout(Duration::from_secs(1))
}

async fn invoke_once(
    options: ClientOptions,
    service: &str,
    method: &str,
    args: Vec<Value>,
) -> Result<rookie_rpc::protocol::Response> {
    let mut client = TcpClient::new(options);
    client.connect(service).await?;
    client
        .invoke(&CallContext::background(), service, method, args)
        .await
}

/// Registry stub that resolves every name to a fixed address and counts
/// lookups.
struct CountingRegistry {
    address: String,
    lookups: AtomicUsize,
}

#[async_trait]
impl Registry for CountingRegistry {
    async fn create_client(&self, _options: &RegistryOptions) -> Result<()> {
        Ok(())
    }

    async fn register_service(&self, _name: &str, _host: &str, _port: u16) -> Result<()> {
        Ok(())
    }

    async fn get_address(&self, _name: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_invoke_add() {
    let server = start_default_server().await;

    let rsp = invoke_once(options_for(&server), "Calc", "Add", vec![json!(2), json!(3)])
        .await
        .unwrap();
    assert_eq!(rsp.code, CODE_OK);
    assert_eq!(rsp.data, json!(5));
    assert!(rsp.msg.is_empty());

    server.stop();
}

#[tokio::test]
async fn test_missing_service_is_500() {
    let server = start_default_server().await;

    let rsp = invoke_once(options_for(&server), "NoSuchService", "Add", vec![json!(1)])
        .await
        .unwrap();
    assert_eq!(rsp.code, CODE_ERROR);
    assert!(rsp.msg.contains("no service found"));
    assert_eq!(rsp.data, Value::Null);
}

#[tokio::test]
async fn test_application_error_is_500() {
    let server = start_default_server().await;

    let rsp = invoke_once(options_for(&server), "Calc", "Div", vec![json!(1), json!(0)])
        .await
        .unwrap();
    assert_eq!(rsp.code, CODE_ERROR);
    assert_eq!(rsp.msg, "division by zero");
}

#[tokio::test]
async fn test_set_limiter_rejects_second_call() {
    let mut server = RpcServer::bind(ServerConfig::new("127.0.0.1", 0)).await.unwrap();
    server.set_limiter(1, 1).unwrap();
    server.register("Calc", calc_service()).await.unwrap();
    let server = Arc::new(server);
    tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });
    let options = options_for(&server);

    let first = invoke_once(options.clone(), "Calc", "Add", vec![json!(1), json!(1)])
        .await
        .unwrap();
    let second = invoke_once(options, "Calc", "Add", vec![json!(1), json!(1)])
        .await
        .unwrap();

    assert_eq!(first.code, CODE_OK);
    assert_eq!(second.code, CODE_RATE_LIMITED);

    server.stop();
}

#[tokio::test]
async fn test_second_connection_rate_limited() {
    let limiter = LimiterConfig::new(1, 1).timeout(Duration::from_millis(100));
    let server = start_server(ServerConfig::new("127.0.0.1", 0).limiter(limiter)).await;
    let options = options_for(&server);

    let first = invoke_once(options.clone(), "Calc", "Add", vec![json!(1), json!(1)])
        .await
        .unwrap();
    let second = invoke_once(options, "Calc", "Add", vec![json!(1), json!(1)])
        .await
        .unwrap();

    assert_eq!(first.code, CODE_OK);
    assert_eq!(second.code, CODE_RATE_LIMITED);
    assert!(!second.msg.is_empty());
}

#[tokio::test]
async fn test_proxy_exhausts_retries_with_fresh_connections() {
    // Reserve a port, then free it so every dial is refused.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let registry = Arc::new(CountingRegistry {
        address: format!("127.0.0.1:{port}"),
        lookups: AtomicUsize::new(0),
    });

    let proxy = ClientProxy::new(ClientOptions::new().retries(3))
        .with_registry(registry.clone(), RegistryOptions::default());
    let err = proxy
        .call(&CallContext::background(), "Calc", "Add", vec![json!(1), json!(2)])
        .await
        .unwrap_err();

    assert_eq!(registry.lookups.load(Ordering::SeqCst), 3);
    match err {
        RpcError::RetriesExhausted { attempts, errors } => {
            assert_eq!(attempts, 3);
            assert_eq!(errors.len(), 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_proxy_retries_remote_errors() {
    let server = start_default_server().await;
    let proxy = ClientProxy::new(options_for(&server).retries(2));

    let err = proxy
        .call(&CallContext::background(), "NoSuchService", "Add", vec![])
        .await
        .unwrap_err();
    match err {
        RpcError::RetriesExhausted { errors, .. } => {
            assert_eq!(errors.len(), 2);
            assert!(errors
                .iter()
                .all(|e| matches!(e, RpcError::Remote { code: 500, .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_proxy_call_as_both_serializers() {
    let server = start_default_server().await;

    for serialize_type in [SerializeType::MsgPack, SerializeType::Protobuf] {
        let proxy = ClientProxy::new(options_for(&server).serialize_type(serialize_type));
        let ctx = CallContext::background();

        let sum: i64 = proxy
            .call_as(&ctx, "Calc", "Add", vec![json!(2), json!(3)])
            .await
            .unwrap();
        assert_eq!(sum, 5, "{serialize_type:?}");

        // Above 2^53, where a double would round.
        let big: i64 = proxy
            .call_as(&ctx, "Calc", "Add", vec![json!((1i64 << 60) + 1), json!(0)])
            .await
            .unwrap();
        assert_eq!(big, (1i64 << 60) + 1, "{serialize_type:?}");

        let total: i64 = proxy
            .call_as(&ctx, "Calc", "Sum", vec![json!([1, 2, 3, 4])])
            .await
            .unwrap();
        assert_eq!(total, 10, "{serialize_type:?}");

        let quotient: f64 = proxy
            .call_as(&ctx, "Calc", "Div", vec![json!(1), json!(4)])
            .await
            .unwrap();
        assert_eq!(quotient, 0.25, "{serialize_type:?}");
    }
}

#[tokio::test]
async fn test_concurrent_calls_are_isolated() {
    let server = start_default_server().await;
    let options = options_for(&server);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let options = options.clone();
        tasks.push(tokio::spawn(async move {
            let text = format!("message-{i}");
            let rsp = invoke_once(options, "Calc", "Echo", vec![json!(text.clone())])
                .await
                .unwrap();
            (text, rsp)
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let (text, rsp) = task.await.unwrap();
        assert_eq!(rsp.code, CODE_OK);
        assert_eq!(rsp.data, json!(text));
        assert!(ids.insert(rsp.request_id), "duplicate request id");
    }
    assert_eq!(ids.len(), 16);
}

#[tokio::test]
async fn test_bad_magic_closes_without_response() {
    let server = start_default_server().await;

    let request = Message::Request(Request::new(1, "Calc", "Add", vec![json!(1), json!(2)]));
    let mut bytes = encode_message(&request, 0, 0).unwrap().to_bytes();
    bytes[0] = 0x00;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(&bytes).await.unwrap();

    let mut reply = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut reply)).await;
    // Either a clean EOF or a reset; never a response frame.
    if let Ok(Ok(_)) = read {
        assert!(reply.is_empty());
    }
}

#[tokio::test]
async fn test_deadline_cancels_call() {
    let server = start_default_server().await;

    let mut client = TcpClient::new(options_for(&server));
    client.connect("Calc").await.unwrap();
    let err = client
        .invoke(
            &CallContext::with_timeout(Duration::from_millis(50)),
            "Calc",
            "Sleep",
            vec![json!(500)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Cancelled));
}

#[tokio::test]
async fn test_discovery_round_trip() {
    let registry = MemoryRegistry::new();

    let mut server = RpcServer::bind(ServerConfig::new("127.0.0.1", 0)).await.unwrap();
    server.set_registry(Arc::new(registry.clone()), RegistryOptions::default());
    server.register("Calc", calc_service()).await.unwrap();
    let server = Arc::new(server);
    tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    // The fallback address is wrong on purpose; resolution must go through
    // the registry.
    let proxy = ClientProxy::new(ClientOptions::new().address("127.0.0.1", 1).retries(1))
        .with_registry(Arc::new(registry), RegistryOptions::default());
    let echoed: String = proxy
        .call_as(&CallContext::background(), "Calc", "Echo", vec![json!("hello")])
        .await
        .unwrap();
    assert_eq!(echoed, "hello");

    server.stop();
}
