//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and adds the connection-level
//! questions the pipeline asks about a request: does it carry a body, does the
//! client want the socket kept open afterwards, does it expect `100 Continue`.

use http::header::{CONNECTION, CONTENT_LENGTH, EXPECT, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

use crate::protocol::PayloadSize;

/// Represents a parsed HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the client allows the connection to be reused after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is present,
    /// HTTP/1.0 requires an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let tokens = self.headers().get_all(CONNECTION).iter().flat_map(|value| value.as_bytes().split(|b| *b == b','));

        let mut close = false;
        let mut keep_alive = false;
        for token in tokens {
            let token = token.trim_ascii();
            if token.eq_ignore_ascii_case(b"close") {
                close = true;
            } else if token.eq_ignore_ascii_case(b"keep-alive") {
                keep_alive = true;
            }
        }

        match self.version() {
            Version::HTTP_11 => !close,
            Version::HTTP_10 => keep_alive && !close,
            _ => false,
        }
    }

    /// Whether the request carries `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.headers().get(EXPECT).is_some_and(|value| {
            let slice = value.as_bytes();
            slice.len() >= 4 && slice[..4].eq_ignore_ascii_case(b"100-")
        })
    }

    /// Body framing announced by the head.
    ///
    /// Heads coming out of the parser already had conflicting framing rejected.
    pub fn payload_size(&self) -> PayloadSize {
        if self.headers().contains_key(TRANSFER_ENCODING) {
            return PayloadSize::new_chunked();
        }
        self.headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map_or(PayloadSize::new_empty(), PayloadSize::new_length)
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
