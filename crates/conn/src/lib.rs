//! The per-connection request/response pipeline of an embedded HTTP/1.x server
//!
//! This crate owns a single accepted socket from the first read to the close: it
//! parses requests incrementally, dispatches each one to a reply producer, streams
//! the response back, and enforces timeouts and disconnect detection, while
//! keeping per-operation heap allocation off the hot path.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1, keep-alive and pipelined requests
//! - Content-Length and chunked request and response bodies
//! - Expect-continue mechanism
//! - Three interchangeable reply producers: application code, static files and
//!   a reverse-proxy relay, recycled across keep-alive requests
//! - Request bodies read on the producer's demand, with a cap on unconsumed bytes
//! - Independent read, body, write and keep-alive deadlines
//! - Disconnect detection while a response is produced
//! - A registry of live connections for bulk shutdown
//! - Zero-copy request bodies and a single-slot scratch arena for response framing
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, Response};
//! use micro_conn::handler::make_handler;
//! use micro_conn::protocol::RequestHeader;
//! use micro_conn::reply::{DynamicReply, ReplyKind, ReplySlots, ReqBody, StaticReply};
//! use micro_conn::server::Server;
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber)?;
//!
//!     let handler = make_handler(|request: &RequestHeader, slots: &mut ReplySlots| {
//!         if request.uri().path().starts_with("/api") {
//!             slots.get_or_insert_with(ReplyKind::Dynamic, || DynamicReply::from_fn(hello));
//!             ReplyKind::Dynamic
//!         } else {
//!             slots.get_or_insert_with(ReplyKind::Static, || StaticReply::from_dir("./public"));
//!             ReplyKind::Static
//!         }
//!     });
//!
//!     Server::builder().address("127.0.0.1:8080").handler(handler).build()?.start().await?;
//!     Ok(())
//! }
//!
//! async fn hello(request: Request<ReqBody>) -> Result<Response<String>, std::convert::Infallible> {
//!     Ok(Response::new(format!("hello {}\r\n", request.uri().path())))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the connection state machine, [`connection::HttpConnection`]
//! - [`codec`]: request parsing and response framing
//! - [`reply`]: the [`reply::ReplyProducer`] trait and its three implementations
//! - [`handler`]: the [`handler::RequestHandler`] selecting a producer per request
//! - [`registry`]: live connection tracking and bulk stop
//! - [`server`]: the accept loop
//! - [`buffer`], [`arena`], [`timer`]: receive chunks, write scratch, deadlines
//! - [`protocol`]: message types and errors
//! - [`config`], [`metrics`]: per-connection settings and counters
//!
//! # Error Handling
//!
//! - [`protocol::ConnectionError`]: fatal outcome of a connection
//! - [`protocol::ParseError`]: request parsing errors, answered with a stock reply
//! - [`protocol::SendError`]: response framing errors
//! - [`protocol::ReplyError`]: reply producer failures
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No TLS support; any split `AsyncRead`/`AsyncWrite` pair can be driven though
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod arena;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod reply;
pub mod server;
pub mod timer;

mod utils;
pub(crate) use utils::ensure;
