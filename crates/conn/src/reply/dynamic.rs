//! Replies computed by application code.
//!
//! The application is an async function from `Request<ReqBody>` to a response
//! whose body implements [`http_body::Body`]. The request body streams into the
//! function while it runs; the response body is relayed frame by frame.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use tracing::{debug, error};

use crate::protocol::{Message, PayloadItem, PayloadSize, ReplyError, RequestHeader, ResponseHead};
use crate::reply::request_body::{ReqBody, ReqBodySender};
use crate::reply::{ReplyContext, ReplyMessage, ReplyProducer};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Response body type produced by [`DynamicReply`] applications.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

type App = Arc<dyn Fn(Request<ReqBody>) -> BoxFuture<'static, Result<Response<ResponseBody>, BoxError>> + Send + Sync>;

pub struct DynamicReply {
    app: App,
    body_sender: Option<ReqBodySender>,
    state: State,
    watching: bool,
}

enum State {
    Idle,
    Calling(BoxFuture<'static, Result<Response<ResponseBody>, BoxError>>),
    Streaming(ResponseBody),
    Done,
}

impl fmt::Debug for DynamicReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Idle => "idle",
            State::Calling(_) => "calling",
            State::Streaming(_) => "streaming",
            State::Done => "done",
        };
        f.debug_struct("DynamicReply").field("state", &state).finish()
    }
}

impl DynamicReply {
    /// Wraps an async application function.
    ///
    /// ```
    /// use http::{Request, Response};
    /// use micro_conn::reply::{DynamicReply, ReqBody};
    ///
    /// let reply = DynamicReply::from_fn(|request: Request<ReqBody>| async move {
    ///     let body = format!("hello {}", request.uri().path());
    ///     Ok::<_, std::convert::Infallible>(Response::new(body))
    /// });
    /// ```
    pub fn from_fn<F, Fut, B, E>(f: F) -> Self
    where
        F: Fn(Request<ReqBody>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<B>, E>> + Send + 'static,
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
        E: Into<BoxError>,
    {
        let app: App = Arc::new(move |request| {
            f(request)
                .map(|result| {
                    result
                        .map(|response| response.map(|body| body.map_err(Into::<BoxError>::into).boxed_unsync()))
                        .map_err(Into::<BoxError>::into)
                })
                .boxed()
        });
        Self { app, body_sender: None, state: State::Idle, watching: false }
    }

    fn fail(&mut self, reason: impl fmt::Display) -> Poll<Result<ReplyMessage, ReplyError>> {
        self.state = State::Done;
        Poll::Ready(Err(ReplyError::body(reason)))
    }
}

impl ReplyProducer for DynamicReply {
    fn begin(&mut self, request: &RequestHeader) -> Result<(), ReplyError> {
        let (body, sender) = ReqBody::channel(request.payload_size());

        let mut inner = Request::new(body);
        *inner.method_mut() = request.method().clone();
        *inner.uri_mut() = request.uri().clone();
        *inner.version_mut() = request.version();
        *inner.headers_mut() = request.headers().clone();

        self.body_sender = Some(sender);
        self.state = State::Calling((self.app)(inner));
        self.watching = false;
        Ok(())
    }

    fn consume_body(&mut self, chunk: Bytes) {
        if let Some(sender) = &mut self.body_sender {
            sender.send(chunk);
        }
    }

    fn end_of_body(&mut self) {
        if let Some(sender) = &mut self.body_sender {
            sender.finish();
        }
    }

    fn poll_body_ready(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match &mut self.body_sender {
            Some(sender) => sender.poll_ready(cx),
            None => Poll::Ready(()),
        }
    }

    fn buffered_body(&self) -> usize {
        self.body_sender.as_ref().map_or(0, ReqBodySender::queued)
    }

    fn poll_next_chunk(&mut self, cx: &mut Context<'_>, ctx: &mut ReplyContext<'_>) -> Poll<Result<ReplyMessage, ReplyError>> {
        // a streamed body may run for long, notice a client that goes away meanwhile
        if !self.watching && ctx.body_complete() && matches!(self.state, State::Streaming(_)) {
            ctx.detect_disconnect(|| debug!("client went away while streaming the response"));
            self.watching = true;
        }

        loop {
            match &mut self.state {
                State::Idle | State::Done => return Poll::Ready(Err(ReplyError::body("no response in progress"))),

                State::Calling(future) => {
                    let response = match future.poll_unpin(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Ok(response)) => response,
                        Poll::Ready(Err(e)) => {
                            error!(cause = %e, "application failed to produce a response");
                            return self.fail(e);
                        }
                    };

                    let (parts, body) = response.into_parts();
                    let payload_size = PayloadSize::from(body.size_hint());
                    self.state = State::Streaming(body);
                    return Poll::Ready(Ok(Message::Header((ResponseHead::from_parts(parts, ()), payload_size))));
                }

                State::Streaming(body) => match std::pin::Pin::new(body).poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        self.state = State::Done;
                        return Poll::Ready(Ok(Message::Payload(PayloadItem::Eof)));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(data) => return Poll::Ready(Ok(Message::Payload(PayloadItem::Chunk(data)))),
                        // trailers are not relayed
                        Err(_) => continue,
                    },
                    Poll::Ready(Some(Err(e))) => {
                        error!(cause = %e, "resolve response body error");
                        return self.fail(e);
                    }
                },
            }
        }
    }

    fn abandon(&mut self) {
        debug!("dynamic reply abandoned");
        if let Some(mut sender) = self.body_sender.take() {
            sender.abort();
        }
        self.state = State::Done;
    }
}
