//! Incremental HTTP/1.x request parser.
//!
//! The parser works in two phases:
//! 1. Head: everything buffered is moved into a contiguous accumulator and
//!    handed to [`HeaderDecoder`]; bytes following the head are pushed back
//!    into the chain.
//! 2. Body: [`PayloadDecoder`] runs directly on the chain's front chunk, so
//!    body bytes are handed out without copying.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::buffer::BufferChain;
use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::codec::{ParseStatus, RequestParser};
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

#[derive(Debug, Default)]
pub struct Http1Parser {
    header_decoder: HeaderDecoder,
    head_buf: BytesMut,
    state: State,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Head,
    Body(PayloadDecoder),
    /// request fully parsed, waiting for `reset`
    Done,
}

impl Http1Parser {
    pub fn new() -> Self {
        Self::default()
    }

    fn feed_head(&mut self, chain: &mut BufferChain) -> Result<ParseStatus, ParseError> {
        if chain.is_empty() {
            return Ok(ParseStatus::NeedMore);
        }

        chain.drain_into(&mut self.head_buf);
        let Some((header, payload_size)) = self.header_decoder.decode(&mut self.head_buf)? else {
            return Ok(ParseStatus::NeedMore);
        };

        // pipelined bytes belong to the body or to the next request
        chain.unread(self.head_buf.split());

        self.state = match payload_size {
            PayloadSize::Empty => State::Done,
            size => State::Body(size.into()),
        };
        trace!(method = %header.method(), uri = %header.uri(), ?payload_size, "request head complete");
        Ok(ParseStatus::Headers(header))
    }
}

impl RequestParser for Http1Parser {
    fn feed(&mut self, chain: &mut BufferChain) -> Result<ParseStatus, ParseError> {
        let decoder = match &mut self.state {
            State::Head => return self.feed_head(chain),
            State::Done => return Ok(ParseStatus::NeedMore),
            State::Body(decoder) => decoder,
        };

        loop {
            let item = match chain.front_mut() {
                Some(front) => decoder.decode(front),
                // a finished body may still have its end to report
                None => decoder.decode(&mut BytesMut::new()),
            };
            chain.sync();

            match item? {
                Some(PayloadItem::Chunk(bytes)) => return Ok(ParseStatus::Body(bytes)),
                Some(PayloadItem::Eof) => {
                    self.state = State::Done;
                    return Ok(ParseStatus::BodyComplete);
                }
                None if chain.is_empty() => return Ok(ParseStatus::NeedMore),
                // the front chunk ran dry, continue with the next one
                None => {}
            }
        }
    }

    fn reset(&mut self) {
        self.head_buf.clear();
        self.state = State::Head;
    }

    fn body_pending(&self) -> bool {
        matches!(self.state, State::Body(_))
    }

    fn is_idle(&self) -> bool {
        matches!(self.state, State::Head) && self.head_buf.is_empty()
    }
}
