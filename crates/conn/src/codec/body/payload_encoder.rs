//! Frames response body items for the wire.
//!
//! Body bytes are passed through untouched; only chunk-size lines are encoded,
//! into scratch leased from the connection's [`HandlerMemory`].

use std::io::Write;

use bytes::{BufMut, Bytes};

use crate::arena::HandlerMemory;
use crate::codec::header::Framing;
use crate::codec::pending_write::PendingWrite;
use crate::protocol::{PayloadItem, SendError};

/// Hex digits of a `u64` plus CRLF.
const CHUNK_LINE_MAX: usize = 16 + 2;

const CRLF: &[u8] = b"\r\n";
const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
    finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// bytes still owed for a content-length body
    Length(u64),
    Chunked,
    /// raw bytes, delimited by closing the connection
    Close,
    /// response to a HEAD request: every body item is dropped
    Discard,
    NoBody,
}

impl PayloadEncoder {
    pub fn new(framing: Framing, head_only: bool) -> Self {
        let kind = match framing {
            _ if head_only => Kind::Discard,
            Framing::Length(n) => Kind::Length(n),
            Framing::Chunked => Kind::Chunked,
            Framing::Close => Kind::Close,
            Framing::Empty => Kind::NoBody,
        };
        Self { kind, finished: false }
    }

    pub fn is_finish(&self) -> bool {
        self.finished
    }

    /// Frames `item` into the next write. Empty data chunks produce an empty write.
    pub fn encode(&mut self, item: PayloadItem, memory: &mut HandlerMemory) -> Result<PendingWrite, SendError> {
        if self.finished {
            return Err(SendError::invalid_body("payload item after end of body"));
        }

        match item {
            PayloadItem::Chunk(bytes) => self.encode_chunk(bytes, memory),
            PayloadItem::Eof => {
                self.finished = true;
                match self.kind {
                    Kind::Length(0) | Kind::Close | Kind::Discard | Kind::NoBody => Ok(PendingWrite::empty()),
                    Kind::Length(remaining) => {
                        Err(SendError::invalid_body(format!("body ended {remaining} bytes short of content-length")))
                    }
                    Kind::Chunked => Ok(PendingWrite::from_static(LAST_CHUNK)),
                }
            }
        }
    }

    fn encode_chunk(&mut self, bytes: Bytes, memory: &mut HandlerMemory) -> Result<PendingWrite, SendError> {
        match &mut self.kind {
            _ if bytes.is_empty() => Ok(PendingWrite::empty()),
            Kind::Discard => Ok(PendingWrite::empty()),
            Kind::Length(remaining) => {
                let len = bytes.len() as u64;
                if len > *remaining {
                    return Err(SendError::invalid_body(format!("body exceeds content-length by {} bytes", len - *remaining)));
                }
                *remaining -= len;
                Ok(PendingWrite::from_bytes(bytes))
            }
            Kind::Chunked => {
                let mut line = memory.allocate(CHUNK_LINE_MAX);
                write!(line.buf_mut().writer(), "{:X}\r\n", bytes.len())?;
                Ok(PendingWrite::new(line, bytes, CRLF))
            }
            Kind::Close => Ok(PendingWrite::from_bytes(bytes)),
            Kind::NoBody => Err(SendError::invalid_body("body data for a response announced as empty")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;

    fn drain(mut write: PendingWrite, memory: &mut HandlerMemory) -> Vec<u8> {
        let mut out = Vec::new();
        while write.has_remaining() {
            out.extend_from_slice(write.chunk());
            write.advance(write.chunk().len());
        }
        memory.deallocate(write.into_scratch());
        out
    }

    #[test]
    fn chunked_framing_uses_scratch() {
        let mut memory = HandlerMemory::new();
        let mut encoder = PayloadEncoder::new(Framing::Chunked, false);

        let write = encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello world")), &mut memory).unwrap();
        assert!(memory.in_use());
        assert_eq!(drain(write, &mut memory), b"B\r\nhello world\r\n");
        assert!(!memory.in_use());

        let write = encoder.encode(PayloadItem::Chunk(Bytes::new()), &mut memory).unwrap();
        assert!(write.is_empty());

        let write = encoder.encode(PayloadItem::Eof, &mut memory).unwrap();
        assert_eq!(drain(write, &mut memory), b"0\r\n\r\n");
        assert!(encoder.is_finish());
        assert_eq!(memory.stats().heap_fallbacks, 0);
    }

    #[test]
    fn length_must_match() {
        let mut memory = HandlerMemory::new();
        let mut encoder = PayloadEncoder::new(Framing::Length(4), false);
        assert!(encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abcde")), &mut memory).is_err());

        let mut encoder = PayloadEncoder::new(Framing::Length(4), false);
        let write = encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ab")), &mut memory).unwrap();
        assert_eq!(drain(write, &mut memory), b"ab");
        assert!(encoder.encode(PayloadItem::Eof, &mut memory).is_err());
    }

    #[test]
    fn head_only_discards_body() {
        let mut memory = HandlerMemory::new();
        let mut encoder = PayloadEncoder::new(Framing::Chunked, true);
        assert!(encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut memory).unwrap().is_empty());
        assert!(encoder.encode(PayloadItem::Eof, &mut memory).unwrap().is_empty());
        assert!(encoder.encode(PayloadItem::Eof, &mut memory).is_err());
    }
}
