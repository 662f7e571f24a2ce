//! Relays requests to an upstream server.
//!
//! How the upstream is reached is up to a [`Connector`]; [`tcp_connector`]
//! speaks plain HTTP/1.1 to a fixed address, opening one upstream connection
//! per request. Upstream failures before the response head are answered with
//! `502 Bad Gateway`.

use std::fmt;
use std::future;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use http::header::{CONTENT_LENGTH, HeaderName, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::codec::{MAX_HEADER_BYTES, MAX_HEADER_NUM, PayloadDecoder};
use crate::protocol::{Message, PayloadItem, PayloadSize, ReplyError, RequestHeader, ResponseHead};
use crate::reply::request_body::{ReqBody, ReqBodySender};
use crate::reply::{ReplyContext, ReplyMessage, ReplyProducer};

/// Response received from an upstream.
pub struct Upstream {
    pub head: ResponseHead,
    pub size: PayloadSize,
    pub body: BoxStream<'static, Result<Bytes, ReplyError>>,
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream").field("status", &self.head.status()).field("size", &self.size).finish()
    }
}

/// Forwards one request and resolves to the upstream response.
pub type Connector = Arc<dyn Fn(Request<ReqBody>) -> BoxFuture<'static, Result<Upstream, ReplyError>> + Send + Sync>;

/// Connection-scoped headers that are never forwarded.
const HOP_BY_HOP: [&str; 7] = ["connection", "keep-alive", "proxy-connection", "te", "trailer", "upgrade", "proxy-authorization"];

pub struct ProxyReply {
    connector: Connector,
    body_sender: Option<ReqBodySender>,
    state: State,
}

enum State {
    Idle,
    Connecting(BoxFuture<'static, Result<Upstream, ReplyError>>),
    Relaying(BoxStream<'static, Result<Bytes, ReplyError>>),
    Eof,
    Done,
}

impl fmt::Debug for ProxyReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Idle => "idle",
            State::Connecting(_) => "connecting",
            State::Relaying(_) => "relaying",
            State::Eof => "eof",
            State::Done => "done",
        };
        f.debug_struct("ProxyReply").field("state", &state).finish()
    }
}

impl ProxyReply {
    pub fn new(connector: Connector) -> Self {
        Self { connector, body_sender: None, state: State::Idle }
    }

    /// Relays to a plain HTTP/1.1 server at `addr`.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self::new(tcp_connector(addr))
    }
}

impl ReplyProducer for ProxyReply {
    fn begin(&mut self, request: &RequestHeader) -> Result<(), ReplyError> {
        let (body, sender) = ReqBody::channel(request.payload_size());

        let mut forwarded = Request::new(body);
        *forwarded.method_mut() = request.method().clone();
        *forwarded.uri_mut() = request.uri().clone();
        *forwarded.version_mut() = request.version();
        *forwarded.headers_mut() = request.headers().clone();

        self.body_sender = Some(sender);
        self.state = State::Connecting((self.connector)(forwarded));
        Ok(())
    }

    fn consume_body(&mut self, chunk: Bytes) {
        if let Some(sender) = &mut self.body_sender {
            sender.send(chunk);
        }
    }

    fn end_of_body(&mut self) {
        if let Some(sender) = &mut self.body_sender {
            sender.finish();
        }
    }

    fn poll_body_ready(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match &mut self.body_sender {
            Some(sender) => sender.poll_ready(cx),
            None => Poll::Ready(()),
        }
    }

    fn buffered_body(&self) -> usize {
        self.body_sender.as_ref().map_or(0, ReqBodySender::queued)
    }

    fn poll_next_chunk(&mut self, cx: &mut Context<'_>, _ctx: &mut ReplyContext<'_>) -> Poll<Result<ReplyMessage, ReplyError>> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Idle | State::Done => Poll::Ready(Err(ReplyError::body("no response in progress"))),

            State::Connecting(mut future) => match future.poll_unpin(cx) {
                Poll::Pending => {
                    self.state = State::Connecting(future);
                    Poll::Pending
                }
                Poll::Ready(Ok(upstream)) => {
                    debug!(status = %upstream.head.status(), size = ?upstream.size, "upstream responded");
                    self.state = if upstream.size.is_empty() { State::Eof } else { State::Relaying(upstream.body) };
                    Poll::Ready(Ok(Message::Header((upstream.head, upstream.size))))
                }
                Poll::Ready(Err(e)) => {
                    warn!(cause = %e, "upstream request failed");
                    if let Some(mut sender) = self.body_sender.take() {
                        sender.abort();
                    }
                    let mut head = Response::new(());
                    *head.status_mut() = StatusCode::BAD_GATEWAY;
                    self.state = State::Eof;
                    Poll::Ready(Ok(Message::Header((head, PayloadSize::Empty))))
                }
            },

            State::Relaying(mut body) => match body.poll_next_unpin(cx) {
                Poll::Pending => {
                    self.state = State::Relaying(body);
                    Poll::Pending
                }
                Poll::Ready(Some(Ok(bytes))) => {
                    self.state = State::Relaying(body);
                    Poll::Ready(Ok(Message::Payload(PayloadItem::Chunk(bytes))))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Err(e)),
                Poll::Ready(None) => Poll::Ready(Ok(Message::Payload(PayloadItem::Eof))),
            },

            State::Eof => Poll::Ready(Ok(Message::Payload(PayloadItem::Eof))),
        }
    }

    fn abandon(&mut self) {
        debug!("proxy reply abandoned");
        if let Some(mut sender) = self.body_sender.take() {
            sender.abort();
        }
        self.state = State::Done;
    }
}

/// Connector speaking HTTP/1.1 over a new TCP connection to `addr` per request.
pub fn tcp_connector(addr: SocketAddr) -> Connector {
    Arc::new(move |request| forward(addr, request).boxed())
}

async fn forward(addr: SocketAddr, request: Request<ReqBody>) -> Result<Upstream, ReplyError> {
    let stream = TcpStream::connect(addr).await.map_err(|e| ReplyError::upstream(format!("connect {addr}: {e}")))?;
    let (mut reader, mut writer) = stream.into_split();

    let (parts, mut body) = request.into_parts();
    let chunked = parts.headers.contains_key(TRANSFER_ENCODING);

    let mut head = BytesMut::with_capacity(1024);
    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    head.put_slice(format!("{} {} HTTP/1.1\r\n", parts.method, target).as_bytes());
    write_headers(&parts.headers, &mut head);
    head.put_slice(b"connection: close\r\n\r\n");
    writer.write_all(&head).await?;

    while let Some(frame) = body.frame().await {
        let Ok(data) = frame?.into_data() else { continue };
        if chunked {
            writer.write_all(format!("{:X}\r\n", data.len()).as_bytes()).await?;
            writer.write_all(&data).await?;
            writer.write_all(b"\r\n").await?;
        } else {
            writer.write_all(&data).await?;
        }
    }
    if chunked {
        writer.write_all(b"0\r\n\r\n").await?;
    }
    writer.flush().await?;

    let mut buf = BytesMut::with_capacity(4096);
    let (head, size) = loop {
        if reader.read_buf(&mut buf).await? == 0 {
            return Err(ReplyError::upstream("upstream closed before the response head"));
        }
        if let Some(parsed) = parse_response_head(&mut buf)? {
            break parsed;
        }
    };

    let rest = Cursor::new(buf.freeze()).chain(reader);
    let body = match size {
        UpstreamBody::Framed(size) => decoded_body(rest, size),
        UpstreamBody::UntilClose => ReaderStream::new(rest).map(|item| item.map_err(ReplyError::from)).boxed(),
    };
    let size = match size {
        UpstreamBody::Framed(size) => size,
        UpstreamBody::UntilClose => PayloadSize::Chunked,
    };
    Ok(Upstream { head, size, body })
}

enum UpstreamBody {
    Framed(PayloadSize),
    UntilClose,
}

fn decoded_body<R>(reader: R, size: PayloadSize) -> BoxStream<'static, Result<Bytes, ReplyError>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    FramedRead::new(reader, PayloadDecoder::from(size))
        .take_while(|item| future::ready(!matches!(item, Ok(PayloadItem::Eof))))
        .map(|item| match item {
            Ok(item) => Ok(item.into_bytes().unwrap_or_default()),
            Err(e) => Err(ReplyError::upstream(e)),
        })
        .boxed()
}

fn write_headers(headers: &HeaderMap, dst: &mut BytesMut) {
    for (name, value) in headers {
        if is_hop_by_hop(name) {
            continue;
        }
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn parse_response_head(buf: &mut BytesMut) -> Result<Option<(ResponseHead, UpstreamBody)>, ReplyError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut response = httparse::Response::new(&mut headers);
    let head_len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) if buf.len() > MAX_HEADER_BYTES => {
            return Err(ReplyError::upstream("upstream response head too large"));
        }
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(ReplyError::upstream(format!("invalid upstream response: {e}"))),
    };

    let status = response
        .code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| ReplyError::upstream("invalid upstream status"))?;

    let mut head = Response::new(());
    *head.status_mut() = status;

    let mut chunked = false;
    let mut length = None;
    for header in response.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ReplyError::upstream)?;
        if name == TRANSFER_ENCODING {
            chunked = true;
            continue;
        }
        if name == CONTENT_LENGTH {
            let value = std::str::from_utf8(header.value).ok().and_then(|value| value.trim().parse::<u64>().ok());
            length = Some(value.ok_or_else(|| ReplyError::upstream("invalid upstream content-length"))?);
            continue;
        }
        if is_hop_by_hop(&name) {
            continue;
        }
        let value = HeaderValue::from_bytes(header.value).map_err(ReplyError::upstream)?;
        head.headers_mut().append(name, value);
    }

    let body = match (chunked, length) {
        _ if status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED => {
            UpstreamBody::Framed(PayloadSize::Empty)
        }
        (true, _) => UpstreamBody::Framed(PayloadSize::Chunked),
        (false, Some(length)) => UpstreamBody::Framed(PayloadSize::new_length(length)),
        (false, None) => UpstreamBody::UntilClose,
    };

    let _ = buf.split_to(head_len);
    Ok(Some((head, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::DisconnectWatch;
    use futures::future::poll_fn;
    use http::Method;
    use tokio::net::TcpListener;

    async fn collect(reply: &mut ProxyReply) -> (StatusCode, PayloadSize, Vec<u8>) {
        let mut watch = DisconnectWatch::default();
        let mut status = None;
        let mut size = None;
        let mut body = Vec::new();
        loop {
            match poll_fn(|cx| reply.poll_next_chunk(cx, &mut ReplyContext::new(&mut watch, true))).await.unwrap() {
                Message::Header((head, payload_size)) => {
                    status = Some(head.status());
                    size = Some(payload_size);
                }
                Message::Payload(PayloadItem::Chunk(bytes)) => body.extend_from_slice(&bytes),
                Message::Payload(PayloadItem::Eof) => return (status.unwrap(), size.unwrap(), body),
            }
        }
    }

    /// Upstream answering one request with `response`; resolves to what it received.
    async fn upstream(response: &'static [u8]) -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response).await.unwrap();
            received
        });
        (addr, task)
    }

    #[tokio::test]
    async fn relays_chunked_upstream_response() {
        let (addr, task) = upstream(b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n5\r\nhello\r\n0\r\n\r\n").await;

        let mut reply = ProxyReply::tcp(addr);
        let request: RequestHeader =
            Request::builder().method(Method::GET).uri("/api?x=1").header("x-trace", "abc").header("connection", "keep-alive").body(()).unwrap().into();
        reply.begin(&request).unwrap();
        reply.end_of_body();

        let (status, size, body) = collect(&mut reply).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(size, PayloadSize::Chunked);
        assert_eq!(body, b"hello");

        let received = String::from_utf8(task.await.unwrap()).unwrap();
        assert!(received.starts_with("GET /api?x=1 HTTP/1.1\r\n"));
        assert!(received.contains("x-trace: abc\r\n"));
        assert!(!received.contains("keep-alive"));
    }

    #[tokio::test]
    async fn relays_length_response() {
        let (addr, _task) = upstream(b"HTTP/1.1 201 Created\r\ncontent-length: 3\r\n\r\nabc").await;
        let mut reply = ProxyReply::tcp(addr);
        reply.begin(&Request::builder().uri("/").body(()).unwrap().into()).unwrap();

        assert_eq!(collect(&mut reply).await, (StatusCode::CREATED, PayloadSize::Length(3), b"abc".to_vec()));
    }

    #[tokio::test]
    async fn connector_failure_is_bad_gateway() {
        let connector: Connector = Arc::new(|_request| async { Err(ReplyError::upstream("refused")) }.boxed());
        let mut reply = ProxyReply::new(connector);
        reply.begin(&Request::builder().uri("/").body(()).unwrap().into()).unwrap();

        let (status, size, body) = collect(&mut reply).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(size, PayloadSize::Empty);
        assert!(body.is_empty());
    }
}
