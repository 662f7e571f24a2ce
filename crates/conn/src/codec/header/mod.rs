//! Request head parsing and response head serialization.

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use header_encoder::{EncodeContext, Framing, HeaderEncoder};
