//! Per-connection request handling.
//!
//! Each accepted connection carries exactly one request and one response.
//! Two tasks share it:
//!
//! ```text
//! Reader task ── admission ─► read_frame ─► decode ─► dispatch ─┐
//!                                                               │ oneshot
//! Writer task ◄─────────────────────────────────────────────────┘
//!      └─► encode (request's tags) ─► write_frame ─► shutdown
//! ```
//!
//! The single-slot channel delivers the response exactly once. When the
//! reader gives up (protocol or codec failure, or a handler panic) it drops
//! its sender and the writer closes the connection without writing.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot;

use crate::error::{RpcError, Result};
use crate::handler::ServiceTable;
use crate::limiter::AdmissionControl;
use crate::protocol::{
    decode_message, encode_message, read_frame, write_frame, Message, Request, Response,
    CODE_RATE_LIMITED,
};

/// Longest time a rejected connection is drained before it is closed.
const LINGER_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared state every connection task reads from.
pub(crate) struct ConnectionHandler {
    services: Arc<ServiceTable>,
    limiter: Option<Arc<AdmissionControl>>,
    max_frame_size: u32,
}

impl ConnectionHandler {
    pub(crate) fn new(
        services: Arc<ServiceTable>,
        limiter: Option<Arc<AdmissionControl>>,
        max_frame_size: u32,
    ) -> Self {
        Self {
            services,
            limiter,
            max_frame_size,
        }
    }

    /// Spawn the reader and writer tasks for one connection.
    pub(crate) fn serve<S>(self: Arc<Self>, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(write_response(writer, rx, peer.clone()));
        tokio::spawn(async move { self.read_request(reader, tx, peer).await });
    }

    async fn read_request<S>(
        &self,
        mut reader: ReadHalf<S>,
        tx: oneshot::Sender<Response>,
        peer: String,
    ) where
        S: AsyncRead + AsyncWrite,
    {
        if let Some(limiter) = &self.limiter {
            if let Err(e) = limiter.acquire().await {
                tracing::warn!("Rejecting connection from {}: {}", peer, e);
                let _ = tx.send(Response::error(0, CODE_RATE_LIMITED, e.to_string()));
                // Closing with the request unread would reset the socket
                // before the client sees the rejection.
                drain(&mut reader).await;
                return;
            }
        }

        let (request, compress_type, serialize_type) = match self.receive(&mut reader).await {
            Ok(received) => received,
            Err(e) => {
                tracing::debug!("Dropping connection from {}: {}", peer, e);
                return;
            }
        };

        let response = self.services.dispatch(request).await;
        let _ = tx.send(response.with_tags(compress_type, serialize_type));
    }

    /// Read and decode the connection's one request frame.
    async fn receive<R>(&self, reader: &mut R) -> Result<(Request, u8, u8)>
    where
        R: AsyncRead + Unpin,
    {
        let frame = read_frame(reader, self.max_frame_size).await?;
        let header = frame.header;

        match decode_message(&frame, self.max_frame_size)? {
            Message::Request(request) => {
                Ok((request, header.compress_type, header.serialize_type))
            }
            Message::Response(_) => Err(RpcError::Protocol(
                "expected a request frame, got a response".into(),
            )),
        }
    }
}

async fn write_response<S>(mut writer: WriteHalf<S>, rx: oneshot::Receiver<Response>, peer: String)
where
    S: AsyncRead + AsyncWrite,
{
    if let Ok(response) = rx.await {
        let (compress_type, serialize_type) = (response.compress_type, response.serialize_type);
        let sent = match encode_message(&Message::Response(response), compress_type, serialize_type)
        {
            Ok(frame) => write_frame(&mut writer, &frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            tracing::error!("Failed to send response to {}: {}", peer, e);
        }
    }

    let _ = writer.shutdown().await;
}

/// Discard inbound bytes until the peer closes or the linger bound elapses.
async fn drain<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let mut sink = tokio::io::sink();
    let _ = tokio::time::timeout(LINGER_TIMEOUT, tokio::io::copy(reader, &mut sink)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimiterConfig;
    use crate::handler::Service;
    use crate::protocol::{Frame, Header, MessageType, CODE_ERROR, CODE_OK, DEFAULT_MAX_FRAME_SIZE};
    use serde_json::json;
    use tokio::io::{duplex, AsyncReadExt};

    struct Calc;

    fn handler(limiter: Option<LimiterConfig>) -> Arc<ConnectionHandler> {
        handler_with_max(limiter, DEFAULT_MAX_FRAME_SIZE)
    }

    fn handler_with_max(
        limiter: Option<LimiterConfig>,
        max_frame_size: u32,
    ) -> Arc<ConnectionHandler> {
        let mut services = ServiceTable::new();
        services
            .register(
                "Calc",
                Service::new(Calc)
                    .method("Add", |_: &Calc, (a, b): (i64, i64)| Ok::<_, String>(a + b))
                    .method("Len", |_: &Calc, (s,): (String,)| Ok::<_, String>(s.len()))
                    .method("Panic", |_: &Calc, ()| -> std::result::Result<i64, String> {
                        panic!("handler failure")
                    }),
            )
            .unwrap();
        let limiter = limiter.map(|c| Arc::new(AdmissionControl::new(&c).unwrap()));
        Arc::new(ConnectionHandler::new(
            Arc::new(services),
            limiter,
            max_frame_size,
        ))
    }

    async fn exchange(
        handler: Arc<ConnectionHandler>,
        frame: Vec<u8>,
    ) -> Option<Response> {
        let (mut client, server) = duplex(64 * 1024);
        handler.serve(server, "test".into());

        client.write_all(&frame).await.unwrap();
        let reply = read_frame(&mut client, DEFAULT_MAX_FRAME_SIZE).await.ok()?;
        match decode_message(&reply, DEFAULT_MAX_FRAME_SIZE).unwrap() {
            Message::Response(rsp) => Some(rsp),
            other => panic!("expected response, got {other:?}"),
        }
    }

    fn request_frame(id: u64, method: &str, args: Vec<serde_json::Value>, serialize: u8) -> Vec<u8> {
        let req = Message::Request(Request::new(id, "Calc", method, args));
        encode_message(&req, 0, serialize).unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_dispatches_and_echoes_tags() {
        let rsp = exchange(handler(None), request_frame(9, "Add", vec![json!(2), json!(3)], 1))
            .await
            .unwrap();
        assert_eq!(rsp.request_id, 9);
        assert_eq!(rsp.code, CODE_OK);
        assert_eq!(rsp.data, json!(5));
        assert_eq!(rsp.serialize_type, 1);
        assert_eq!(rsp.compress_type, 0);
    }

    #[tokio::test]
    async fn test_unknown_method_is_500() {
        let rsp = exchange(handler(None), request_frame(3, "Mul", vec![], 0))
            .await
            .unwrap();
        assert_eq!(rsp.code, CODE_ERROR);
        assert_eq!(rsp.request_id, 3);
        assert!(rsp.msg.contains("no service method found"));
    }

    #[tokio::test]
    async fn test_bad_magic_closes_without_response() {
        let mut frame = request_frame(1, "Add", vec![json!(1), json!(1)], 0);
        frame[0] = 0x00;
        assert!(exchange(handler(None), frame).await.is_none());
    }

    #[tokio::test]
    async fn test_response_frame_rejected() {
        let rsp = Message::Response(Response::ok(1, json!(1)));
        let frame = encode_message(&rsp, 0, 0).unwrap().to_bytes();
        assert!(exchange(handler(None), frame).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_inflated_body_closes_without_response() {
        // 16 MiB of zeros gzips to a few KiB.
        let payload = json!("\0".repeat(16 * 1024 * 1024));
        let frame = request_frame(1, "Len", vec![payload], 0);
        assert!(frame.len() < 256 * 1024);

        let handler = handler_with_max(None, 256 * 1024);
        assert!(exchange(handler, frame).await.is_none());
    }

    #[tokio::test]
    async fn test_handler_panic_closes_connection() {
        let frame = request_frame(1, "Panic", vec![], 0);
        assert!(exchange(handler(None), frame).await.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_connection_gets_700() {
        let handler = handler(Some(LimiterConfig::new(1, 1)));

        let first = exchange(handler.clone(), request_frame(1, "Add", vec![json!(1), json!(1)], 0))
            .await
            .unwrap();
        assert_eq!(first.code, CODE_OK);

        let second = exchange(handler, request_frame(2, "Add", vec![json!(1), json!(1)], 0))
            .await
            .unwrap();
        assert_eq!(second.code, CODE_RATE_LIMITED);
        assert!(second.is_rate_limited());
    }

    #[tokio::test]
    async fn test_truncated_body_closes_without_response() {
        let (mut client, server) = duplex(1024);
        handler(None).serve(server, "test".into());

        let header = Header::new(MessageType::Request, 0, 0, 1, 100);
        let frame = Frame::new(header, bytes::Bytes::from_static(b"short"));
        client.write_all(&frame.to_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
