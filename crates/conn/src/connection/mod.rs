//! Connection handling.
//!
//! [`HttpConnection`] owns one accepted socket from the first read to the close:
//!
//! - feeds received bytes to a [`RequestParser`](crate::codec::RequestParser)
//! - dispatches every request head to a [`RequestHandler`](crate::handler::RequestHandler)
//!   and streams the request body into the selected reply producer
//! - writes the producer's response through the arena-backed response encoder
//! - enforces the read, body, write and keep-alive deadlines
//! - watches for peers going away while a response is produced
//! - keeps the socket alive across requests, pipelined ones included

mod http_connection;

pub use http_connection::{CloseReason, HttpConnection};
