//! Decoder for request bodies using chunked transfer encoding.
//!
//! See [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//! The decoder keeps its position between calls, so the framing of one chunk may be
//! split across any number of receive buffers.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    remaining: u64,
    size_digits: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// hex digits of the chunk size
    Size,
    /// whitespace after the size
    SizeLws,
    /// ignored chunk extension, up to CR
    Extension,
    /// LF closing the size line
    SizeLf,
    /// chunk data
    Body,
    BodyCr,
    BodyLf,
    /// start of a trailer line, or the final CRLF
    TrailerStart,
    Trailer,
    TrailerLf,
    EndLf,
    End,
}

/// Upper bound of hex digits accepted in a chunk size line.
const MAX_SIZE_DIGITS: u8 = 16;

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, remaining: 0, size_digits: 0 }
    }

    pub fn is_finish(&self) -> bool {
        self.state == State::End
    }

    fn next_state(&mut self, byte: u8) -> Result<State, ParseError> {
        let next = match (self.state, byte) {
            (State::Size, b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => {
                self.size_digits += 1;
                if self.size_digits > MAX_SIZE_DIGITS {
                    return Err(ParseError::invalid_body("chunk size overflow"));
                }
                // checked by the pattern above
                let digit = (byte as char).to_digit(16).unwrap_or_default();
                self.remaining = self
                    .remaining
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(u64::from(digit)))
                    .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))?;
                State::Size
            }
            (State::Size, _) if self.size_digits == 0 => return Err(ParseError::invalid_body("missing chunk size")),
            (State::Size | State::SizeLws, b'\t' | b' ') => State::SizeLws,
            (State::Size | State::SizeLws, b';') => State::Extension,
            (State::Size | State::SizeLws | State::Extension, b'\r') => State::SizeLf,
            (State::Extension, b'\n') => return Err(ParseError::invalid_body("chunk extension contains newline")),
            (State::Extension, _) => State::Extension,
            (State::SizeLf, b'\n') if self.remaining == 0 => State::TrailerStart,
            (State::SizeLf, b'\n') => State::Body,
            (State::BodyCr, b'\r') => State::BodyLf,
            (State::BodyLf, b'\n') => {
                self.size_digits = 0;
                State::Size
            }
            (State::TrailerStart, b'\r') => State::EndLf,
            (State::Trailer, b'\r') => State::TrailerLf,
            (State::TrailerStart | State::Trailer, _) => State::Trailer,
            (State::TrailerLf, b'\n') => State::TrailerStart,
            (State::EndLf, b'\n') => State::End,
            (state, byte) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {byte:#04x} in chunked state {state:?}")));
            }
        };
        Ok(next)
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Returns the next data chunk, `Eof` after the last-chunk and trailers, or
    /// `None` once `src` is exhausted.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == State::End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            if self.state == State::Body {
                let len = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
                let bytes = src.split_to(len).freeze();
                self.remaining -= len as u64;
                if self.remaining == 0 {
                    self.state = State::BodyCr;
                }
                trace!(len, "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            let byte = src.get_u8();
            self.state = self.next_state(byte)?;
        }
    }
}
