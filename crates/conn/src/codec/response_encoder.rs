use bytes::Bytes;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::arena::HandlerMemory;
use crate::codec::body::PayloadEncoder;
use crate::codec::header::{EncodeContext, HeaderEncoder};
use crate::codec::pending_write::PendingWrite;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Turns the message stream of a reply producer into socket writes.
///
/// Expects one header followed by payload items up to `Eof`; the encoder is
/// ready for the next response once `Eof` was encoded.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    payload_encoder: Option<PayloadEncoder>,
    keep_alive: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Frames `item`. Heads are encoded into scratch leased from `memory`, which the
    /// caller returns through [`PendingWrite::into_scratch`] once the write completed.
    pub fn encode(
        &mut self,
        item: Message<(ResponseHead, PayloadSize), Bytes>,
        ctx: EncodeContext,
        memory: &mut HandlerMemory,
    ) -> Result<PendingWrite, SendError> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(SendError::invalid_body("response head while a body is in progress"));
                }

                let mut header_encoder = HeaderEncoder::new(ctx);
                let (framing, keep_alive) = header_encoder.framing(&head, payload_size);

                let mut scratch = memory.allocate(HeaderEncoder::estimate(&head));
                if let Err(e) = header_encoder.encode((head, payload_size), scratch.buf_mut()) {
                    memory.deallocate(scratch);
                    return Err(e);
                }

                self.payload_encoder = Some(PayloadEncoder::new(framing, ctx.head_only));
                self.keep_alive = keep_alive;
                Ok(PendingWrite::with_head(scratch))
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(SendError::invalid_body("payload item before the response head"));
                };

                let write = payload_encoder.encode(payload_item, memory)?;
                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }
                Ok(write)
            }
        }
    }

    /// Whether a head was encoded and its body is not finished yet.
    pub fn in_progress(&self) -> bool {
        self.payload_encoder.is_some()
    }

    /// Whether the last encoded head left the connection reusable.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn reset(&mut self) {
        self.payload_encoder = None;
        self.keep_alive = false;
    }
}
