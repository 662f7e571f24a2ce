//! Serializes response heads.
//!
//! The encoder fills in the framing headers that match the body the producer
//! announced, and the `connection` header matching what the connection will do
//! once the response is sent. Everything else is written as the producer set it.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Version};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, ResponseHead, SendError};

/// Status line and final CRLF, on top of the headers themselves.
const HEAD_OVERHEAD: usize = 64;

/// How the body following the head is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Length(u64),
    Chunked,
    /// the body ends when the connection closes (HTTP/1.0 peers with an unsized body)
    Close,
    Empty,
}

/// Per-response facts the head depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeContext {
    /// the connection intends to stay open after this response
    pub keep_alive: bool,
    /// the request was HTTP/1.0
    pub http10: bool,
    /// the request was HEAD: framing headers are sent but no body
    pub head_only: bool,
}

/// Encoder for response heads implementing the [`Encoder`] trait.
#[derive(Debug, Clone, Copy)]
pub struct HeaderEncoder {
    ctx: EncodeContext,
}

impl HeaderEncoder {
    pub fn new(ctx: EncodeContext) -> Self {
        Self { ctx }
    }

    /// Picks the framing for `payload_size` and whether the connection survives it.
    pub fn framing(&self, head: &ResponseHead, payload_size: PayloadSize) -> (Framing, bool) {
        let framing = match payload_size {
            PayloadSize::Length(n) => Framing::Length(n),
            PayloadSize::Chunked if self.ctx.http10 => Framing::Close,
            PayloadSize::Chunked => Framing::Chunked,
            PayloadSize::Empty => Framing::Empty,
        };
        let keep_alive = self.ctx.keep_alive && framing != Framing::Close && !wants_close(head.headers());
        (framing, keep_alive)
    }

    /// Upper bound of the encoded size of `head`, used to size the scratch buffer.
    pub fn estimate(head: &ResponseHead) -> usize {
        head.headers().iter().map(|(name, value)| name.as_str().len() + value.len() + 4).sum::<usize>() + HEAD_OVERHEAD * 2
    }
}

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;
        let (framing, keep_alive) = self.framing(&head, payload_size);

        match head.version() {
            Version::HTTP_11 | Version::HTTP_10 => {
                let status = head.status();
                write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or_default())?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(io::ErrorKind::Unsupported).into());
            }
        }

        let headers = head.headers_mut();
        match framing {
            Framing::Length(n) => {
                headers.remove(TRANSFER_ENCODING);
                headers.insert(CONTENT_LENGTH, n.into());
            }
            Framing::Chunked => {
                headers.remove(CONTENT_LENGTH);
                headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            Framing::Close => {
                headers.remove(CONTENT_LENGTH);
                headers.remove(TRANSFER_ENCODING);
            }
            Framing::Empty => {
                headers.remove(TRANSFER_ENCODING);
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
        }

        if !keep_alive {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        } else if self.ctx.http10 {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        for (name, value) in headers.iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .flat_map(|value| value.as_bytes().split(|b| *b == b','))
        .any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close"))
}

/// `io::Write` adapter appending to a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
