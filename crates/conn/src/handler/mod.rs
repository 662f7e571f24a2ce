//! Request dispatch.
//!
//! A [`RequestHandler`] looks at a parsed request head and decides which kind of
//! reply producer answers it. It fills the matching slot of the connection's
//! [`ReplySlots`] when the slot is still empty; on later requests of a keep-alive
//! connection the producer already sitting in the slot is reused.
//!
//! ```
//! use micro_conn::handler::make_handler;
//! use micro_conn::reply::{ReplyKind, StaticReply};
//!
//! let handler = make_handler(|_request, slots| {
//!     slots.get_or_insert_with(ReplyKind::Static, || StaticReply::from_bytes(mime::TEXT_PLAIN, "hello"));
//!     ReplyKind::Static
//! });
//! # let _ = handler;
//! ```

use std::sync::Arc;

use crate::protocol::RequestHeader;
use crate::reply::{ReplyKind, ReplySlots};

#[cfg_attr(test, mockall::automock)]
pub trait RequestHandler: Send + Sync {
    /// Selects the producer kind answering `request`.
    ///
    /// The slot of the returned kind must hold a producer once this returns,
    /// otherwise the request is answered with `500`.
    fn dispatch(&self, request: &RequestHeader, slots: &mut ReplySlots) -> ReplyKind;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> RequestHandler for HandlerFn<F>
where
    F: Fn(&RequestHeader, &mut ReplySlots) -> ReplyKind + Send + Sync,
{
    fn dispatch(&self, request: &RequestHeader, slots: &mut ReplySlots) -> ReplyKind {
        (self.f)(request, slots)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn dispatch(&self, request: &RequestHeader, slots: &mut ReplySlots) -> ReplyKind {
        (**self).dispatch(request, slots)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    fn dispatch(&self, request: &RequestHeader, slots: &mut ReplySlots) -> ReplyKind {
        (**self).dispatch(request, slots)
    }
}

pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&RequestHeader, &mut ReplySlots) -> ReplyKind + Send + Sync,
{
    HandlerFn { f }
}
