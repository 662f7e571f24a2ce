use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use futures::channel::mpsc;
use http_body::{Body, Frame, SizeHint};
use tracing::warn;

use crate::protocol::{PayloadSize, ReplyError};

/// Chunks queued between the connection and the body reader.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Request body handed to applications and upstreams.
///
/// The connection pushes body chunks from its own task through a
/// [`ReqBodySender`] as the reader asks for them; the body ends once the
/// request body is complete, or fails when the request was abandoned first.
#[derive(Debug)]
pub struct ReqBody {
    receiver: Option<mpsc::Receiver<Bytes>>,
    shared: Arc<Shared>,
    size: PayloadSize,
}

#[derive(Debug, Default)]
struct Shared {
    queued: AtomicUsize,
    aborted: AtomicBool,
}

/// Producer side of a [`ReqBody`].
#[derive(Debug)]
pub(crate) struct ReqBodySender {
    sender: Option<mpsc::Sender<Bytes>>,
    shared: Arc<Shared>,
    /// the reader went away, the rest of the body is dropped
    discarding: bool,
}

impl ReqBody {
    pub(crate) fn channel(size: PayloadSize) -> (ReqBody, ReqBodySender) {
        let shared = Arc::new(Shared::default());
        if size.is_empty() {
            let sender = ReqBodySender { sender: None, shared: Arc::clone(&shared), discarding: true };
            return (ReqBody { receiver: None, shared, size: PayloadSize::Empty }, sender);
        }

        let (sender, receiver) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let body = ReqBody { receiver: Some(receiver), shared: Arc::clone(&shared), size };
        (body, ReqBodySender { sender: Some(sender), shared, discarding: false })
    }

    pub fn empty() -> Self {
        Self { receiver: None, shared: Arc::default(), size: PayloadSize::Empty }
    }
}

impl ReqBodySender {
    /// Ready when the reader can take another chunk, or when it went away.
    pub(crate) fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(sender) = &mut self.sender else {
            return Poll::Ready(());
        };
        if ready!(sender.poll_ready(cx)).is_err() {
            self.discard();
        }
        Poll::Ready(())
    }

    pub(crate) fn send(&mut self, chunk: Bytes) {
        let Some(sender) = &mut self.sender else {
            return;
        };

        let len = chunk.len();
        match sender.try_send(chunk) {
            Ok(()) => {
                self.shared.queued.fetch_add(len, Ordering::AcqRel);
            }
            Err(e) if e.is_disconnected() => self.discard(),
            Err(_) => {
                warn!("request body chunk delivered without demand, aborting the body");
                self.abort();
            }
        }
    }

    /// Bytes sent but not yet read.
    pub(crate) fn queued(&self) -> usize {
        if self.discarding || self.sender.as_ref().is_some_and(mpsc::Sender::is_closed) {
            return 0;
        }
        self.shared.queued.load(Ordering::Acquire)
    }

    pub(crate) fn finish(&mut self) {
        self.sender = None;
    }

    pub(crate) fn abort(&mut self) {
        if self.sender.take().is_some() {
            self.shared.aborted.store(true, Ordering::Release);
        }
    }

    fn discard(&mut self) {
        self.sender = None;
        self.discarding = true;
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ReplyError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let Some(receiver) = &mut self.receiver else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(receiver).poll_next(cx)) {
            Some(chunk) => {
                self.shared.queued.fetch_sub(chunk.len(), Ordering::AcqRel);
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            None => {
                self.receiver = None;
                if self.shared.aborted.load(Ordering::Acquire) {
                    return Poll::Ready(Some(Err(ReplyError::body("request aborted before the body was complete"))));
                }
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.receiver.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        self.size.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn collects_sent_chunks() {
        let (body, mut sender) = ReqBody::channel(PayloadSize::Length(11));
        assert_eq!(body.size_hint().exact(), Some(11));

        sender.send(Bytes::from_static(b"hello "));
        sender.send(Bytes::from_static(b"world"));
        assert_eq!(sender.queued(), 11);
        sender.finish();

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn abort_fails_the_body() {
        let (body, mut sender) = ReqBody::channel(PayloadSize::Chunked);
        sender.send(Bytes::from_static(b"partial"));
        sender.abort();
        assert!(body.collect().await.is_err());
    }

    #[tokio::test]
    async fn empty_body_ends_immediately() {
        let (body, mut sender) = ReqBody::channel(PayloadSize::Empty);
        sender.send(Bytes::from_static(b"ignored"));
        assert_eq!(sender.queued(), 0);
        assert!(body.is_end_stream());
        assert!(body.collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn full_channel_withholds_demand() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let (mut body, mut sender) = ReqBody::channel(PayloadSize::Chunked);

        let mut sent = 0;
        while sender.poll_ready(&mut cx).is_ready() {
            sender.send(Bytes::from_static(b"0123456789"));
            sent += 1;
            assert!(sent <= BODY_CHANNEL_CAPACITY + 1, "the channel never filled up");
        }
        assert_eq!(sender.queued(), sent * 10);

        // reading one chunk frees a slot again
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), "0123456789");
        assert_eq!(sender.queued(), (sent - 1) * 10);
        assert!(sender.poll_ready(&mut cx).is_ready());
    }

    #[test]
    fn dropped_reader_discards_the_rest() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let (body, mut sender) = ReqBody::channel(PayloadSize::Length(20));
        sender.send(Bytes::from_static(b"0123456789"));
        drop(body);

        assert_eq!(sender.queued(), 0);
        assert!(sender.poll_ready(&mut cx).is_ready());
        sender.send(Bytes::from_static(b"0123456789"));
        assert_eq!(sender.queued(), 0);
    }
}
