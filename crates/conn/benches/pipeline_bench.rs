use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Response, StatusCode};
use micro_conn::arena::HandlerMemory;
use micro_conn::buffer::BufferChain;
use micro_conn::codec::{EncodeContext, Http1Parser, ParseStatus, RequestParser, ResponseEncoder};
use micro_conn::config::ConnectionConfig;
use micro_conn::connection::HttpConnection;
use micro_conn::handler::make_handler;
use micro_conn::protocol::{Message, PayloadItem, PayloadSize, RequestHeader};
use micro_conn::reply::{ReplyKind, ReplySlots, StaticReply};

const SIMPLE: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

const PIPELINED: &[u8] = b"GET /a HTTP/1.1\r\nHost: localhost\r\n\r\n\
POST /b HTTP/1.1\r\nHost: localhost\r\nContent-Length: 11\r\n\r\nhello world\
POST /c HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";

fn bench_parser(c: &mut Criterion) {
    c.bench_function("parse_pipelined_requests", |b| {
        b.iter(|| {
            let mut chain = BufferChain::new();
            chain.extend_from_slice(PIPELINED);
            let mut parser = Http1Parser::new();
            let mut requests = 0;
            loop {
                match parser.feed(&mut chain).unwrap() {
                    ParseStatus::Headers(header) => {
                        requests += 1;
                        black_box(header);
                    }
                    ParseStatus::Body(bytes) => {
                        black_box(bytes);
                    }
                    ParseStatus::BodyComplete => {}
                    ParseStatus::NeedMore if chain.is_empty() => break,
                    ParseStatus::NeedMore => parser.reset(),
                }
            }
            assert_eq!(requests, 3);
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    let body = Bytes::from_static(b"Hello World!");

    c.bench_function("encode_chunked_response", |b| {
        let mut memory = HandlerMemory::new();
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut head = Response::new(());
            *head.status_mut() = StatusCode::OK;

            let items = [
                Message::Header((head, PayloadSize::Chunked)),
                Message::Payload(PayloadItem::Chunk(body.clone())),
                Message::Payload(PayloadItem::Eof),
            ];
            for item in items {
                let mut write = encoder.encode(item, EncodeContext::default(), &mut memory).unwrap();
                black_box(write.remaining());
                write.advance(write.remaining());
                memory.deallocate(write.into_scratch());
            }
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let handler = Arc::new(make_handler(|_request: &RequestHeader, slots: &mut ReplySlots| {
        slots.get_or_insert_with(ReplyKind::Static, || StaticReply::from_bytes(mime::TEXT_PLAIN, "Hello World!"));
        ReplyKind::Static
    }));

    c.bench_function("process_simple_request", |b| {
        b.to_async(&runtime).iter(|| async {
            let connection = HttpConnection::new(Cursor::new(SIMPLE), tokio::io::sink(), Arc::clone(&handler), ConnectionConfig::new());
            black_box(connection.process().await.unwrap());
        });
    });

    c.bench_function("process_pipelined_requests", |b| {
        b.to_async(&runtime).iter(|| async {
            let connection = HttpConnection::new(Cursor::new(PIPELINED), tokio::io::sink(), Arc::clone(&handler), ConnectionConfig::new());
            let metrics = connection.metrics();
            connection.process().await.unwrap();
            assert_eq!(black_box(metrics.snapshot()).responses_completed, 3);
        });
    });
}

criterion_group!(benches, bench_parser, bench_response_encoder, bench_http_connection);
criterion_main!(benches);
