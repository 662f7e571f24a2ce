//! Decoder for request payloads.
//!
//! Selects the framing from the [`PayloadSize`] announced by the request head:
//! - Content-Length: hand out exactly that many bytes
//! - chunked transfer encoding: delegate to [`ChunkedDecoder`]
//! - no body: report `Eof` right away

use std::cmp;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// bytes still expected for a content-length payload
    Length(u64),

    /// transfer-encoding chunked payload
    Chunked(ChunkedDecoder),

    /// have no body with the request
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(size) }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => PayloadDecoder::fix_length(size),
            PayloadSize::Chunked => PayloadDecoder::chunked(),
            PayloadSize::Empty => PayloadDecoder::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(0) | Kind::NoBody => Ok(Some(PayloadItem::Eof)),
            Kind::Length(remaining) => {
                if src.is_empty() {
                    return Ok(None);
                }

                let len = cmp::min(*remaining, src.len() as u64);
                let bytes = src.split_to(len as usize).freeze();
                *remaining -= len;
                Ok(Some(PayloadItem::Chunk(bytes)))
            }
            Kind::Chunked(decoder) => decoder.decode(src),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_payload_stops_at_boundary() {
        let mut buffer = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);
        let mut decoder = PayloadDecoder::fix_length(10);

        let payload = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(payload.as_bytes().map(|b| &b[..]), Some(&b"1012345678"[..]));
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }

    #[test]
    fn length_payload_needs_more() {
        let mut decoder = PayloadDecoder::from(PayloadSize::Length(4));
        let mut buffer = BytesMut::from(&b"ab"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_chunk());
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);

        let mut buffer = BytesMut::from(&b"cd"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_chunk());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn empty_payload_is_eof_without_input() {
        let mut decoder = PayloadDecoder::from(PayloadSize::Empty);
        assert!(decoder.is_empty());
        assert_eq!(decoder.decode(&mut BytesMut::new()).unwrap(), Some(PayloadItem::Eof));
    }
}
