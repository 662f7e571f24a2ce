//! Response producers.
//!
//! A [`ReplyProducer`] supplies the response of one request incrementally: a
//! head, then body chunks, then `Eof`. The connection only ever asks for the next
//! item, so dynamic application output, static files and proxied upstream
//! responses look the same to it.
//!
//! Producers live in [`ReplySlots`], one slot per [`ReplyKind`], and are reused
//! by the following requests of a keep-alive connection.

mod dynamic;
mod proxy;
mod request_body;
mod static_file;

use std::fmt;
use std::task::{Context, Poll};

use bytes::Bytes;

use crate::metrics::ConnectionMetrics;
use crate::protocol::{Message, PayloadSize, ReplyError, RequestHeader, ResponseHead};

pub use dynamic::{BoxError, DynamicReply, ResponseBody};
pub use proxy::{Connector, ProxyReply, Upstream, tcp_connector};
pub use request_body::ReqBody;
pub use static_file::StaticReply;

/// Item yielded by [`ReplyProducer::poll_next_chunk`].
pub type ReplyMessage = Message<(ResponseHead, PayloadSize)>;

/// Supplies the response to one request at a time.
///
/// Call order for every request: [`begin`](Self::begin), then any interleaving of
/// body deliveries and [`poll_next_chunk`](Self::poll_next_chunk) until it yields
/// `Eof`. [`abandon`](Self::abandon) may end the cycle early.
pub trait ReplyProducer: Send {
    /// Starts producing the response for `request`, dropping any state of the previous one.
    fn begin(&mut self, request: &RequestHeader) -> Result<(), ReplyError>;

    /// Receives the next piece of the request body.
    fn consume_body(&mut self, _chunk: Bytes) {}

    /// The request body is complete.
    fn end_of_body(&mut self) {}

    /// Ready once the producer can take the next request body chunk.
    ///
    /// While this is pending the connection stops reading the request body and
    /// the body deadline runs. The task is woken when demand returns.
    fn poll_body_ready(&mut self, _cx: &mut Context<'_>) -> Poll<()> {
        Poll::Ready(())
    }

    /// Request body bytes handed over but not yet taken by the producer's reader.
    fn buffered_body(&self) -> usize {
        0
    }

    /// Yields the response head first, then body chunks, then `Eof`.
    fn poll_next_chunk(&mut self, cx: &mut Context<'_>, ctx: &mut ReplyContext<'_>) -> Poll<Result<ReplyMessage, ReplyError>>;

    /// The response will not be sent to the end; release whatever it holds.
    fn abandon(&mut self) {}

    /// Whether the connection may be reused after this response.
    fn keep_alive(&self) -> bool {
        true
    }
}

/// Selects a slot of [`ReplySlots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Dynamic,
    Static,
    Proxy,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyKind::Dynamic => f.write_str("dynamic"),
            ReplyKind::Static => f.write_str("static"),
            ReplyKind::Proxy => f.write_str("proxy"),
        }
    }
}

/// The recycled producers of one connection.
pub struct ReplySlots {
    dynamic: Option<Box<dyn ReplyProducer>>,
    static_file: Option<Box<dyn ReplyProducer>>,
    proxy: Option<Box<dyn ReplyProducer>>,
    metrics: ConnectionMetrics,
}

impl fmt::Debug for ReplySlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySlots")
            .field("dynamic", &self.dynamic.is_some())
            .field("static_file", &self.static_file.is_some())
            .field("proxy", &self.proxy.is_some())
            .finish()
    }
}

impl Default for ReplySlots {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplySlots {
    pub fn new() -> Self {
        Self::with_metrics(ConnectionMetrics::new())
    }

    pub(crate) fn with_metrics(metrics: ConnectionMetrics) -> Self {
        Self { dynamic: None, static_file: None, proxy: None, metrics }
    }

    fn slot(&mut self, kind: ReplyKind) -> &mut Option<Box<dyn ReplyProducer>> {
        match kind {
            ReplyKind::Dynamic => &mut self.dynamic,
            ReplyKind::Static => &mut self.static_file,
            ReplyKind::Proxy => &mut self.proxy,
        }
    }

    /// Returns the producer of `kind`, creating it with `create` when the slot is empty.
    pub fn get_or_insert_with<P, F>(&mut self, kind: ReplyKind, create: F) -> &mut dyn ReplyProducer
    where
        P: ReplyProducer + 'static,
        F: FnOnce() -> P,
    {
        let metrics = self.metrics.clone();
        self.slot(kind).get_or_insert_with(|| {
            metrics.producer_created();
            Box::new(create())
        })
        .as_mut()
    }

    /// Puts `producer` in the slot of `kind`, replacing the previous one.
    pub fn insert<P: ReplyProducer + 'static>(&mut self, kind: ReplyKind, producer: P) {
        self.metrics.producer_created();
        *self.slot(kind) = Some(Box::new(producer));
    }

    pub fn get_mut(&mut self, kind: ReplyKind) -> Option<&mut (dyn ReplyProducer + 'static)> {
        self.slot(kind).as_deref_mut()
    }

    pub fn is_occupied(&self, kind: ReplyKind) -> bool {
        match kind {
            ReplyKind::Dynamic => self.dynamic.is_some(),
            ReplyKind::Static => self.static_file.is_some(),
            ReplyKind::Proxy => self.proxy.is_some(),
        }
    }
}

type DisconnectCallback = Box<dyn FnOnce() + Send>;

/// Holds the callback a producer registered for peer disconnects.
#[derive(Default)]
pub struct DisconnectWatch {
    callback: Option<DisconnectCallback>,
}

impl fmt::Debug for DisconnectWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisconnectWatch").field("registered", &self.callback.is_some()).finish()
    }
}

impl DisconnectWatch {
    /// Registers `callback`. Returns false, dropping `callback`, when one is already pending.
    pub fn register(&mut self, callback: DisconnectCallback) -> bool {
        if self.callback.is_some() {
            return false;
        }
        self.callback = Some(callback);
        true
    }

    pub fn is_registered(&self) -> bool {
        self.callback.is_some()
    }

    /// Invokes the pending callback. Returns whether one was pending.
    pub fn fire(&mut self) -> bool {
        match self.callback.take() {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Drops the pending callback without invoking it.
    pub fn clear(&mut self) {
        self.callback = None;
    }
}

/// What a producer may ask of its connection while it is polled.
#[derive(Debug)]
pub struct ReplyContext<'a> {
    disconnect: &'a mut DisconnectWatch,
    body_complete: bool,
}

impl<'a> ReplyContext<'a> {
    pub fn new(disconnect: &'a mut DisconnectWatch, body_complete: bool) -> Self {
        Self { disconnect, body_complete }
    }

    /// Asks the connection to watch for the peer going away while this response
    /// is in progress. `callback` runs at most once. A second registration while
    /// one is pending is ignored.
    pub fn detect_disconnect<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.disconnect.register(Box::new(callback));
    }

    /// Whether the whole request body was delivered.
    pub fn body_complete(&self) -> bool {
        self.body_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed;

    impl ReplyProducer for Fixed {
        fn begin(&mut self, _request: &RequestHeader) -> Result<(), ReplyError> {
            Ok(())
        }

        fn poll_next_chunk(&mut self, _cx: &mut Context<'_>, _ctx: &mut ReplyContext<'_>) -> Poll<Result<ReplyMessage, ReplyError>> {
            Poll::Ready(Ok(Message::Payload(crate::protocol::PayloadItem::Eof)))
        }
    }

    #[test]
    fn slots_are_created_once() {
        let metrics = ConnectionMetrics::new();
        let mut slots = ReplySlots::with_metrics(metrics.clone());
        assert!(!slots.is_occupied(ReplyKind::Static));

        for _ in 0..3 {
            slots.get_or_insert_with(ReplyKind::Static, || Fixed);
        }
        assert!(slots.is_occupied(ReplyKind::Static));
        assert!(slots.get_mut(ReplyKind::Dynamic).is_none());
        assert_eq!(metrics.snapshot().producers_created, 1);

        slots.insert(ReplyKind::Proxy, Fixed);
        assert_eq!(metrics.snapshot().producers_created, 2);
    }

    #[test]
    fn disconnect_callback_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut watch = DisconnectWatch::default();

        let counter = Arc::clone(&calls);
        let mut ctx = ReplyContext::new(&mut watch, false);
        ctx.detect_disconnect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        // ignored, the first registration is still pending
        ctx.detect_disconnect(|| panic!("second registration must not run"));

        assert!(watch.is_registered());
        assert!(watch.fire());
        assert!(!watch.fire());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn producers_take_body_by_default() {
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        let mut producer = Fixed;
        assert!(producer.poll_body_ready(&mut cx).is_ready());
        assert_eq!(producer.buffered_body(), 0);

        let mut watch = DisconnectWatch::default();
        let ctx = ReplyContext::new(&mut watch, true);
        assert!(format!("{ctx:?}").contains("body_complete: true"));
    }
}
