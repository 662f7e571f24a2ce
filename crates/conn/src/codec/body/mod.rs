//! Request body decoding and response body framing.
//!
//! - [`PayloadDecoder`]: reads a request body framed by content-length or chunked
//!   transfer encoding, resuming across receive buffers
//! - [`PayloadEncoder`]: frames response body items into [`PendingWrite`](super::PendingWrite)s

mod chunked_decoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
