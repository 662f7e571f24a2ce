//! Request parsing and response framing.
//!
//! - Request side: the [`RequestParser`] trait the connection drives, and its
//!   HTTP/1.x implementation [`Http1Parser`] built from [`HeaderDecoder`] and
//!   [`PayloadDecoder`]
//! - Response side: [`ResponseEncoder`] turns producer messages into
//!   [`PendingWrite`]s, encoding framing into arena scratch and passing body
//!   bytes through
//!
//! # Example
//!
//! ```
//! use micro_conn::buffer::BufferChain;
//! use micro_conn::codec::{Http1Parser, ParseStatus, RequestParser};
//!
//! let mut chain = BufferChain::new();
//! chain.extend_from_slice(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n");
//!
//! let mut parser = Http1Parser::new();
//! match parser.feed(&mut chain).unwrap() {
//!     ParseStatus::Headers(header) => assert_eq!(header.uri().path(), "/index.html"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert!(!parser.body_pending());
//! ```

mod body;
mod header;
mod http1_parser;
mod pending_write;
mod response_encoder;

use bytes::Bytes;

use crate::buffer::BufferChain;
use crate::protocol::{ParseError, RequestHeader};

pub use body::{ChunkedDecoder, PayloadDecoder, PayloadEncoder};
pub use header::{EncodeContext, Framing, HeaderDecoder, HeaderEncoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use http1_parser::Http1Parser;
pub use pending_write::PendingWrite;
pub use response_encoder::ResponseEncoder;

/// Progress reported by a [`RequestParser`].
#[derive(Debug)]
pub enum ParseStatus {
    /// the buffered bytes do not complete anything yet
    NeedMore,
    /// a request head was parsed; body items follow if the request has a body
    Headers(RequestHeader),
    /// the next piece of the request body
    Body(Bytes),
    /// the request body ended
    BodyComplete,
}

/// Turns the bytes of a connection into requests.
///
/// A parser consumes from the [`BufferChain`] what it understood and leaves the
/// rest, including bytes of pipelined requests, in the chain. Once a request is
/// complete it reports `NeedMore` until [`reset`](RequestParser::reset).
pub trait RequestParser: Send {
    fn feed(&mut self, chain: &mut BufferChain) -> Result<ParseStatus, ParseError>;

    /// Prepares for the next request of a keep-alive cycle.
    fn reset(&mut self);

    /// Whether the head was parsed and body bytes are still expected.
    fn body_pending(&self) -> bool;

    /// Whether nothing of a request has been consumed yet.
    fn is_idle(&self) -> bool;
}

impl<P: RequestParser + ?Sized> RequestParser for Box<P> {
    fn feed(&mut self, chain: &mut BufferChain) -> Result<ParseStatus, ParseError> {
        (**self).feed(chain)
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn body_pending(&self) -> bool {
        (**self).body_pending()
    }

    fn is_idle(&self) -> bool {
        (**self).is_idle()
    }
}
