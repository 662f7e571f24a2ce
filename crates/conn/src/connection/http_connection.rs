use std::fmt;
use std::io;
use std::sync::Arc;
use std::task::Poll;

use bytes::Buf;
use futures::future::poll_fn;
use http::{Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::arena::HandlerMemory;
use crate::buffer::BufferChain;
use crate::codec::{EncodeContext, Http1Parser, ParseStatus, PendingWrite, RequestParser, ResponseEncoder};
use crate::config::ConnectionConfig;
use crate::handler::RequestHandler;
use crate::metrics::ConnectionMetrics;
use crate::protocol::{
    CONTINUE_RESPONSE, ConnectionError, Message, ParseError, PayloadItem, ReplyError, RequestHeader, TimeoutSide, stock_reply,
};
use crate::registry::{ConnectionId, Registration, Retirement};
use crate::reply::{DisconnectWatch, ReplyContext, ReplyKind, ReplyMessage, ReplyProducer, ReplySlots};
use crate::timer::Deadline;

/// Why a connection was closed, reported to [`HttpConnection::on_closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// the peer closed the socket between requests
    PeerClosed,
    /// the last response finished and the connection was not kept alive
    Completed,
    /// the registry asked the connection to stop, or the socket was aborted
    Stopped,
    /// the peer went away while a request was in progress
    Disconnected,
    Timeout(TimeoutSide),
    Transport,
    Protocol,
    Reply,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("peer closed"),
            CloseReason::Completed => f.write_str("completed"),
            CloseReason::Stopped => f.write_str("stopped"),
            CloseReason::Disconnected => f.write_str("disconnected"),
            CloseReason::Timeout(side) => write!(f, "{side} timeout"),
            CloseReason::Transport => f.write_str("transport error"),
            CloseReason::Protocol => f.write_str("protocol error"),
            CloseReason::Reply => f.write_str("reply error"),
        }
    }
}

/// Outstanding operations. Both may be set at once.
#[derive(Debug, Default, Clone, Copy)]
struct StateFlags {
    reading: bool,
    writing: bool,
}

/// Hand-off between the producer and the write path of the current response.
#[derive(Debug, Default, Clone, Copy)]
struct ResponseFlags {
    waiting_response: bool,
    have_response: bool,
    response_done: bool,
}

/// What the outstanding read is waiting for; decides its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPhase {
    Head,
    KeepAlive,
    Body,
    /// watching for the peer going away while a response is produced
    Passive,
}

/// The request currently being answered.
#[derive(Debug, Clone, Copy)]
struct Exchange {
    kind: ReplyKind,
    ctx: EncodeContext,
    body_done: bool,
    /// the producer is ready for the next request body chunk
    demand: bool,
}

enum Event {
    Read(io::Result<usize>),
    Written(io::Result<Option<usize>>),
    Produced(Result<ReplyMessage, ReplyError>),
    BodyDemand,
    ReadTimeout,
    WriteTimeout,
    Stop,
}

type CloseCallback = Box<dyn FnOnce(CloseReason) + Send>;

/// An HTTP/1.x connection driving requests and responses over one socket.
///
/// The connection runs as a single future: every socket operation, deadline and
/// producer poll of it is raced in one `select!` and handled in turn, so there is
/// at most one read and one write outstanding at any time, and dropping the
/// future cancels all of them together.
///
/// # Type Parameters
///
/// * `R`: The async readable half of the socket
/// * `W`: The async writable half of the socket
/// * `H`: The [`RequestHandler`] selecting reply producers
pub struct HttpConnection<R, W, H: ?Sized> {
    reader: R,
    writer: W,
    handler: Arc<H>,
    config: ConnectionConfig,

    parser: Box<dyn RequestParser>,
    chain: BufferChain,
    encoder: ResponseEncoder,
    memory: HandlerMemory,
    slots: ReplySlots,
    exchange: Option<Exchange>,

    state: StateFlags,
    response: ResponseFlags,
    read_phase: ReadPhase,
    read_timer: Deadline,
    write_timer: Deadline,
    pending_write: Option<PendingWrite>,
    disconnect: DisconnectWatch,

    metrics: ConnectionMetrics,
    id: Option<ConnectionId>,
    stop: CancellationToken,
    retirement: Option<Retirement>,
    on_closed: Option<CloseCallback>,

    served: u64,
    read_eof: bool,
    closing: Option<CloseReason>,
    closed: Option<CloseReason>,
    error: Option<ConnectionError>,
}

impl<R, W, H: ?Sized> fmt::Debug for HttpConnection<R, W, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("response", &self.response)
            .field("served", &self.served)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<R, W, H> HttpConnection<R, W, H>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: RequestHandler + ?Sized,
{
    pub fn new(reader: R, writer: W, handler: Arc<H>, config: ConnectionConfig) -> Self {
        let metrics = ConnectionMetrics::new();
        Self {
            reader,
            writer,
            handler,
            chain: BufferChain::with_chunk_size(config.get_chunk_size()),
            config,
            parser: Box::new(Http1Parser::new()),
            encoder: ResponseEncoder::new(),
            memory: HandlerMemory::new(),
            slots: ReplySlots::with_metrics(metrics.clone()),
            exchange: None,
            state: StateFlags::default(),
            response: ResponseFlags::default(),
            read_phase: ReadPhase::Head,
            read_timer: Deadline::new(),
            write_timer: Deadline::new(),
            pending_write: None,
            disconnect: DisconnectWatch::default(),
            metrics,
            id: None,
            stop: CancellationToken::new(),
            retirement: None,
            on_closed: None,
            served: 0,
            read_eof: false,
            closing: None,
            closed: None,
            error: None,
        }
    }

    /// Ties the connection to a registry: it stops when the registry stops it and
    /// retires its entry when it closes.
    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.id = Some(registration.id);
        self.stop = registration.stop;
        self.retirement = Some(registration.retirement);
        self
    }

    pub fn with_parser<P: RequestParser + 'static>(mut self, parser: P) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Registers `callback` to run once the connection is closed.
    pub fn on_closed<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(CloseReason) + Send + 'static,
    {
        self.on_closed = Some(Box::new(callback));
        self
    }

    /// Handle to this connection's counters, usable after it was moved into `process`.
    pub fn metrics(&self) -> ConnectionMetrics {
        self.metrics.clone()
    }

    /// Serves requests until the connection closes.
    ///
    /// Returns `Ok` when the peer closed, the last response completed, or the
    /// connection was stopped; anything else is reported as an error.
    pub async fn process(mut self) -> Result<(), ConnectionError> {
        self.start();
        while self.closed.is_none() {
            self.advance();
            if self.closed.is_some() {
                break;
            }

            let event = self.next_event().await;
            self.handle(event);
        }

        self.finish().await;
        self.error.take().map_or(Ok(()), Err)
    }

    fn start(&mut self) {
        debug!(id = ?self.id, "start serving connection");
        self.schedule_read();
    }

    /// Feeds buffered bytes to the parser as far as the current exchange allows,
    /// then issues the read the new state needs.
    fn advance(&mut self) {
        while self.can_parse() {
            if self.awaiting_demand() {
                break;
            }
            match self.parser.feed(&mut self.chain) {
                Ok(ParseStatus::NeedMore) => break,
                Ok(ParseStatus::Headers(header)) => self.on_headers(header),
                Ok(ParseStatus::Body(bytes)) => {
                    if let Some(exchange) = &mut self.exchange {
                        exchange.demand = false;
                    }
                    if let Some(producer) = self.active_producer() {
                        producer.consume_body(bytes);
                    }
                    if !self.check_buffered() {
                        break;
                    }
                }
                Ok(ParseStatus::BodyComplete) => self.on_body_complete(),
                Err(e) => {
                    self.on_parse_error(e);
                    break;
                }
            }
        }

        self.schedule_read();
        self.metrics.set_state(self.state.reading, self.state.writing, self.exchange.is_some());
    }

    fn can_parse(&self) -> bool {
        if self.closed.is_some() || self.closing.is_some() {
            return false;
        }
        self.exchange.is_none() || self.parser.body_pending()
    }

    /// The request body is stalled until the producer asks for more of it.
    fn awaiting_demand(&self) -> bool {
        self.exchange.is_some_and(|exchange| !exchange.demand)
            && self.parser.body_pending()
            && !self.response.response_done
            && self.closing.is_none()
            && self.closed.is_none()
    }

    /// Bytes received but not consumed yet: the receive chain plus what the
    /// producer has queued for its reader.
    fn buffered_bytes(&mut self) -> usize {
        let queued = self.active_producer().map_or(0, |producer| producer.buffered_body());
        self.chain.len() + queued
    }

    /// Answers `413` and returns false once the buffered bytes exceed the limit.
    fn check_buffered(&mut self) -> bool {
        let buffered = self.buffered_bytes();
        let max = self.config.get_max_buffered_bytes();
        if buffered > max {
            self.on_parse_error(ParseError::too_large_body(buffered, max));
            return false;
        }
        true
    }

    fn desired_read(&self) -> Option<ReadPhase> {
        if self.read_eof || self.closing.is_some() || self.closed.is_some() {
            return None;
        }

        match &self.exchange {
            None if self.served > 0 && self.parser.is_idle() && self.chain.is_empty() => Some(ReadPhase::KeepAlive),
            None => Some(ReadPhase::Head),
            Some(_) if self.parser.body_pending() => (!self.awaiting_demand()).then_some(ReadPhase::Body),
            Some(_)
                if self.disconnect.is_registered()
                    && !self.response.response_done
                    && self.chain.len() < self.config.get_max_buffered_bytes() =>
            {
                Some(ReadPhase::Passive)
            }
            Some(_) => None,
        }
    }

    /// Issues, re-arms or withdraws the outstanding read.
    fn schedule_read(&mut self) {
        match (self.state.reading, self.desired_read()) {
            (false, Some(phase)) => {
                self.state.reading = true;
                self.metrics.read_issued();
                self.arm_read(phase);
            }
            (true, Some(phase)) if phase != self.read_phase => self.arm_read(phase),
            (true, None) => {
                self.state.reading = false;
                self.metrics.read_completed();
                self.read_timer.cancel();
            }
            (false, None) if !self.awaiting_demand() => self.read_timer.cancel(),
            _ => {}
        }

        // a producer that never asks for its body still hits the body deadline
        if self.awaiting_demand() && !self.read_timer.is_armed() {
            self.read_phase = ReadPhase::Body;
            self.read_timer.arm(self.config.get_body_timeout());
        }
    }

    fn arm_read(&mut self, phase: ReadPhase) {
        self.read_phase = phase;
        match phase {
            ReadPhase::Head => self.read_timer.arm(self.config.get_read_timeout()),
            ReadPhase::KeepAlive => self.read_timer.arm(self.config.get_keep_alive_timeout()),
            ReadPhase::Body => self.read_timer.arm(self.config.get_body_timeout()),
            ReadPhase::Passive => self.read_timer.cancel(),
        }
    }

    fn producing(&self) -> bool {
        self.exchange.is_some()
            && !self.response.response_done
            && self.pending_write.is_none()
            && self.closing.is_none()
            && self.closed.is_none()
    }

    async fn next_event(&mut self) -> Event {
        let reading = self.state.reading;
        let writing = self.state.writing;
        let producing = self.producing();
        let awaiting_demand = self.awaiting_demand();
        let kind = self.exchange.map(|exchange| exchange.kind);
        let body_complete = self.exchange.is_some_and(|exchange| exchange.body_done);

        let Self { reader, writer, chain, pending_write, read_timer, write_timer, slots, disconnect, stop, .. } = self;

        select! {
            biased;

            () = stop.cancelled() => Event::Stop,

            result = write_step(writer, pending_write), if writing => Event::Written(result),

            result = read_step(reader, chain), if reading => Event::Read(result),

            event = poll_fn(|cx| {
                let producer = match kind {
                    Some(kind) => slots.get_mut(kind),
                    None => None,
                };
                let Some(producer) = producer else {
                    return Poll::Ready(Event::Produced(Err(ReplyError::body("reply slot is empty"))));
                };
                if awaiting_demand && producer.poll_body_ready(cx).is_ready() {
                    return Poll::Ready(Event::BodyDemand);
                }
                if producing {
                    let mut ctx = ReplyContext::new(&mut *disconnect, body_complete);
                    if let Poll::Ready(result) = producer.poll_next_chunk(cx, &mut ctx) {
                        return Poll::Ready(Event::Produced(result));
                    }
                }
                Poll::Pending
            }), if producing || awaiting_demand => event,

            () = read_timer.expired() => Event::ReadTimeout,

            () = write_timer.expired() => Event::WriteTimeout,
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Read(result) => self.on_read(result),
            Event::Written(result) => self.on_written(result),
            Event::Produced(result) => self.on_produced(result),
            Event::BodyDemand => {
                if let Some(exchange) = &mut self.exchange {
                    exchange.demand = true;
                }
            }
            Event::ReadTimeout => self.on_read_timeout(),
            Event::WriteTimeout => {
                warn!("write deadline expired, closing connection");
                self.fail(CloseReason::Timeout(TimeoutSide::Write), ConnectionError::Timeout(TimeoutSide::Write));
            }
            Event::Stop => {
                info!("stop requested, closing connection");
                self.close(CloseReason::Stopped);
            }
        }
    }

    fn on_read(&mut self, result: io::Result<usize>) {
        self.state.reading = false;
        self.metrics.read_completed();
        self.read_timer.cancel();

        match result {
            Ok(0) => self.on_eof(),
            Ok(n) => {
                self.chain.commit(n);
                // passive reads stop by themselves once the limit is reached
                if self.read_phase != ReadPhase::Passive {
                    self.check_buffered();
                }
            }
            Err(e) => {
                let passive = self.read_phase == ReadPhase::Passive;
                self.on_transport_error(e, passive);
            }
        }
    }

    fn on_eof(&mut self) {
        self.read_eof = true;
        match &self.exchange {
            None => {
                if !self.parser.is_idle() || !self.chain.is_empty() {
                    debug!(buffered = self.chain.len(), "peer closed in the middle of a request head");
                }
                self.close(CloseReason::PeerClosed);
            }
            // what is left to write still goes out, then the connection closes
            Some(_) if self.response.response_done => self.maybe_finish(),
            Some(_) => {
                debug!("peer closed while the request was in progress");
                self.close(CloseReason::Disconnected);
            }
        }
    }

    fn on_read_timeout(&mut self) {
        if self.read_phase == ReadPhase::KeepAlive {
            debug!(served = self.served, "keep-alive timeout, closing idle connection");
            self.close(CloseReason::Timeout(TimeoutSide::Read));
        } else {
            warn!(phase = ?self.read_phase, "read deadline expired, closing connection");
            self.fail(CloseReason::Timeout(TimeoutSide::Read), ConnectionError::Timeout(TimeoutSide::Read));
        }
    }

    fn on_transport_error(&mut self, e: io::Error, passive: bool) {
        if e.kind() == io::ErrorKind::ConnectionAborted {
            debug!(cause = %e, "connection aborted");
            self.close(CloseReason::Stopped);
        } else if passive {
            debug!(cause = %e, "peer went away while the response was produced");
            self.close(CloseReason::Disconnected);
        } else {
            error!(cause = %e, "connection transport error");
            self.fail(CloseReason::Transport, e.into());
        }
    }

    fn on_parse_error(&mut self, e: ParseError) {
        warn!(cause = %e, "can't parse request");
        self.reply_and_close(e.status_code(), CloseReason::Protocol, e.into());
    }

    fn on_headers(&mut self, header: RequestHeader) {
        self.metrics.request_received();

        let ctx = EncodeContext {
            keep_alive: self.config.is_keep_alive() && header.keep_alive() && !self.read_eof,
            http10: header.version() == Version::HTTP_10,
            head_only: header.method() == Method::HEAD,
        };

        let kind = self.handler.dispatch(&header, &mut self.slots);
        debug!(method = %header.method(), uri = %header.uri(), %kind, "dispatch request");

        let Some(producer) = self.slots.get_mut(kind) else {
            error!(%kind, "handler selected an empty reply slot");
            let e = ConnectionError::dispatch(format!("no {kind} producer in its slot"));
            self.reply_and_close(StatusCode::INTERNAL_SERVER_ERROR, CloseReason::Reply, e);
            return;
        };

        if let Err(e) = producer.begin(&header) {
            error!(cause = %e, %kind, "reply producer can't begin");
            self.reply_and_close(StatusCode::INTERNAL_SERVER_ERROR, CloseReason::Reply, e.into());
            return;
        }

        let body_done = !self.parser.body_pending();
        if body_done {
            producer.end_of_body();
        }

        self.exchange = Some(Exchange { kind, ctx, body_done, demand: false });
        self.response = ResponseFlags { waiting_response: true, ..ResponseFlags::default() };

        if !body_done && header.expects_continue() {
            info!("receive expect request header, sent continue response");
            self.start_write(PendingWrite::from_static(CONTINUE_RESPONSE));
        }
    }

    fn on_body_complete(&mut self) {
        let Some(exchange) = &mut self.exchange else {
            return;
        };
        exchange.body_done = true;
        if let Some(producer) = self.active_producer() {
            producer.end_of_body();
        }
        self.maybe_finish();
    }

    fn on_produced(&mut self, result: Result<ReplyMessage, ReplyError>) {
        let Some(exchange) = self.exchange else {
            return;
        };

        let message = match result {
            Ok(message) => message,
            Err(e) => {
                error!(cause = %e, kind = %exchange.kind, "reply producer failed");
                self.reply_error(e.into());
                return;
            }
        };

        let is_head = message.is_header();
        let is_eof = matches!(message, Message::Payload(PayloadItem::Eof));

        let mut ctx = exchange.ctx;
        if is_head {
            ctx.keep_alive &= self.slots.get_mut(exchange.kind).is_some_and(|producer| producer.keep_alive());
        }

        match self.encoder.encode(message, ctx, &mut self.memory) {
            Ok(write) => {
                if is_head {
                    self.response.have_response = true;
                }
                if is_eof {
                    self.response.waiting_response = false;
                    self.response.response_done = true;
                }
                self.start_write(write);
            }
            Err(e) => {
                error!(cause = %e, "can't encode response");
                self.reply_error(e.into());
            }
        }
    }

    /// A failure of the current response: answered with `500` unless its head is already out.
    fn reply_error(&mut self, error: ConnectionError) {
        if self.response.have_response {
            self.fail(CloseReason::Reply, error);
        } else {
            self.reply_and_close(StatusCode::INTERNAL_SERVER_ERROR, CloseReason::Reply, error);
        }
    }

    fn start_write(&mut self, write: PendingWrite) {
        if write.is_empty() {
            self.memory.deallocate(write.into_scratch());
            self.on_write_complete();
            return;
        }

        self.state.writing = true;
        self.metrics.write_issued();
        self.write_timer.arm(self.config.get_write_timeout());
        self.pending_write = Some(write);
    }

    fn on_written(&mut self, result: io::Result<Option<usize>>) {
        match result {
            // partial progress, the same write continues on the next turn
            Ok(Some(n)) if n > 0 => {}
            Ok(Some(_)) => self.on_transport_error(io::ErrorKind::WriteZero.into(), false),
            Ok(None) => {
                self.state.writing = false;
                self.metrics.write_completed();
                self.write_timer.cancel();
                if let Some(write) = self.pending_write.take() {
                    self.memory.deallocate(write.into_scratch());
                }
                self.metrics.record_arena(self.memory.stats());
                self.on_write_complete();
            }
            Err(e) => self.on_transport_error(e, false),
        }
    }

    fn on_write_complete(&mut self) {
        if let Some(reason) = self.closing.take() {
            self.close(reason);
        } else if self.response.response_done {
            self.maybe_finish();
        }
    }

    /// Ends the exchange once the response is out and the request body was drained.
    fn maybe_finish(&mut self) {
        let Some(exchange) = self.exchange else {
            return;
        };
        if !self.response.response_done || self.pending_write.is_some() {
            return;
        }
        if !exchange.body_done && !self.read_eof {
            return;
        }

        let keep_alive = self.encoder.keep_alive() && exchange.body_done && !self.read_eof && self.error.is_none();

        self.metrics.response_completed();
        self.exchange = None;
        self.response = ResponseFlags::default();
        self.disconnect.clear();
        self.encoder.reset();

        if !keep_alive {
            debug!(served = self.served + 1, "response complete, closing connection");
            self.close(CloseReason::Completed);
            return;
        }

        self.parser.reset();
        self.chain.compact();
        self.served += 1;
        debug!(served = self.served, buffered = self.chain.len(), "response complete, keep connection alive");
    }

    fn active_producer(&mut self) -> Option<&mut (dyn ReplyProducer + 'static)> {
        let kind = self.exchange.as_ref()?.kind;
        self.slots.get_mut(kind)
    }

    fn reply_and_close(&mut self, status: StatusCode, reason: CloseReason, error: ConnectionError) {
        if self.error.is_none() {
            self.error = Some(error);
        }

        if self.closed.is_none() && self.closing.is_none() && self.pending_write.is_none() && !self.response.have_response {
            debug!(%status, "sending stock reply before closing");
            self.closing = Some(reason);
            self.start_write(PendingWrite::from_bytes(stock_reply(status)));
        } else {
            self.close(reason);
        }
    }

    fn fail(&mut self, reason: CloseReason, error: ConnectionError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.close(reason);
    }

    /// Terminates the connection. Returns false when it was already closed.
    ///
    /// Outstanding operations are withdrawn, both deadlines cancelled, and an
    /// unfinished response abandoned after its disconnect callback ran.
    fn close(&mut self, reason: CloseReason) -> bool {
        if self.closed.is_some() {
            return false;
        }
        self.closed = Some(reason);
        self.closing = None;

        if self.state.reading {
            self.state.reading = false;
            self.metrics.read_completed();
        }
        if self.state.writing {
            self.state.writing = false;
            self.metrics.write_completed();
        }
        self.read_timer.cancel();
        self.write_timer.cancel();
        if let Some(write) = self.pending_write.take() {
            self.memory.deallocate(write.into_scratch());
        }

        if let Some(exchange) = self.exchange.take() {
            if !self.response.response_done {
                if self.disconnect.fire() {
                    debug!("disconnect callback invoked");
                }
                if let Some(producer) = self.slots.get_mut(exchange.kind) {
                    producer.abandon();
                }
            }
        }
        self.disconnect.clear();
        self.response = ResponseFlags::default();
        true
    }

    /// Shuts the write half down and reports the close, once.
    async fn finish(&mut self) {
        let reason = self.closed.unwrap_or(CloseReason::Completed);

        match tokio::time::timeout(self.config.get_write_timeout(), self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(cause = %e, "can't shut down the write half"),
            Err(_) => debug!("shutting down the write half timed out"),
        }

        self.metrics.record_arena(self.memory.stats());
        self.metrics.set_state(false, false, false);
        self.metrics.set_closed();

        if let Some(retirement) = &mut self.retirement {
            retirement.retire();
        }
        if let Some(callback) = self.on_closed.take() {
            callback(reason);
        }
        debug!(%reason, served = self.served, "connection closed");
    }
}

async fn read_step<R: AsyncRead + Unpin>(reader: &mut R, chain: &mut BufferChain) -> io::Result<usize> {
    reader.read_buf(chain.read_target()).await
}

/// Writes what is left of the outstanding write, or flushes once nothing is left.
async fn write_step<W: AsyncWrite + Unpin>(writer: &mut W, pending: &mut Option<PendingWrite>) -> io::Result<Option<usize>> {
    match pending {
        Some(write) if write.has_remaining() => writer.write_buf(write).await.map(Some),
        _ => writer.flush().await.map(|()| None),
    }
}
