//! HTTP response header handling.
//!
//! [`ResponseHead`] is the header portion of a response before any body is attached.
//! The stock replies are fixed byte strings the connection can send without asking
//! a reply producer, when parsing or dispatching failed.

use bytes::Bytes;
use http::{Response, StatusCode};

/// Type alias for HTTP response headers.
pub type ResponseHead = Response<()>;

/// Interim response sent to requests carrying `Expect: 100-continue`.
pub const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Returns the minimal fixed reply for `status`, closing the connection.
///
/// Only error statuses have a dedicated text, anything else falls back to `500`.
pub fn stock_reply(status: StatusCode) -> Bytes {
    let raw: &'static [u8] = match status {
        StatusCode::BAD_REQUEST => b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        StatusCode::NOT_FOUND => b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        StatusCode::PAYLOAD_TOO_LARGE => b"HTTP/1.1 413 Payload Too Large\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE => {
            b"HTTP/1.1 431 Request Header Fields Too Large\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
        }
        StatusCode::BAD_GATEWAY => b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        StatusCode::SERVICE_UNAVAILABLE => b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        _ => b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    };
    Bytes::from_static(raw)
}
