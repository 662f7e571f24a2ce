//! Decoder for HTTP/1.x request heads.
//!
//! `httparse` borrows the receive buffer while it runs, so the decoder first
//! records the byte ranges of the target and of every header, releases the
//! borrow, then splits the head off the buffer once and slices names and values
//! out of the frozen bytes. Header values share the received allocation.
//!
//! Limits: 64 headers, 8 KiB for the whole head.

use std::ops::Range;

use bytes::BytesMut;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire head
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Parses a request head into a [`RequestHeader`] and the framing of its body.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

/// Positions recorded while `httparse` still borrows the buffer.
struct ParsedHead {
    method: Method,
    target: Range<usize>,
    version: Version,
    headers: [(Range<usize>, Range<usize>); MAX_HEADER_NUM],
    header_count: usize,
    head_len: usize,
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(parsed) = parse_head(src)? else {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        };

        trace!(head_len = parsed.head_len, headers = parsed.header_count, "parsed request head");
        ensure!(parsed.head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(parsed.head_len, MAX_HEADER_BYTES));

        let head = src.split_to(parsed.head_len).freeze();
        let uri = Uri::from_maybe_shared(head.slice(parsed.target.clone())).map_err(|_| ParseError::InvalidUri)?;

        let mut request = Request::new(());
        *request.method_mut() = parsed.method;
        *request.uri_mut() = uri;
        *request.version_mut() = parsed.version;

        let headers = request.headers_mut();
        headers.reserve(parsed.header_count);
        for (name, value) in &parsed.headers[..parsed.header_count] {
            let name = HeaderName::from_bytes(&head[name.clone()]).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_maybe_shared(head.slice(value.clone())).map_err(ParseError::invalid_header)?;
            headers.append(name, value);
        }

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(&header)?;
        Ok(Some((header, payload_size)))
    }
}

fn parse_head(src: &[u8]) -> Result<Option<ParsedHead>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut req = httparse::Request::new(&mut headers);

    let head_len = match req.parse(src) {
        Ok(Status::Complete(len)) => len,
        Ok(Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => return Err(ParseError::too_many_headers(MAX_HEADER_NUM)),
        Err(e) => return Err(ParseError::invalid_header(e)),
    };

    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        other => return Err(ParseError::InvalidVersion(other)),
    };
    let method = req.method.ok_or(ParseError::InvalidMethod)?;
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
    let target = range_of(src, req.path.ok_or(ParseError::InvalidUri)?.as_bytes());

    let mut parsed = ParsedHead {
        method,
        target,
        version,
        headers: std::array::from_fn(|_| (0..0, 0..0)),
        header_count: req.headers.len(),
        head_len,
    };
    for (header, slot) in req.headers.iter().zip(parsed.headers.iter_mut()) {
        *slot = (range_of(src, header.name.as_bytes()), range_of(src, header.value));
    }

    Ok(Some(parsed))
}

/// Byte range of `part` inside `whole`; `part` must borrow from `whole`.
fn range_of(whole: &[u8], part: &[u8]) -> Range<usize> {
    let start = part.as_ptr() as usize - whole.as_ptr() as usize;
    start..start + part.len()
}

/// Selects the body framing from Content-Length and Transfer-Encoding.
///
/// Framing headers are honored for every method so a body sent with a `GET`
/// cannot be mistaken for the next pipelined request.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
    let te_header = header.headers().get(TRANSFER_ENCODING);
    let mut cl_values = header.headers().get_all(CONTENT_LENGTH).iter();
    let cl_header = cl_values.next();

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::new_empty()),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::new_chunked())
            } else {
                Err(ParseError::invalid_header("transfer-encoding without a final chunked coding"))
            }
        }

        (None, Some(cl_value)) => {
            let length = parse_content_length(cl_value)?;
            // repeated content-length headers must agree
            for other in cl_values {
                ensure!(
                    parse_content_length(other)? == length,
                    ParseError::invalid_content_length("conflicting content-length values")
                );
            }
            Ok(PayloadSize::new_length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer-encoding and content-length both present")),
    }
}

fn parse_content_length(value: &HeaderValue) -> Result<u64, ParseError> {
    let value = value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
    let value = value.trim();
    ensure!(
        !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
        ParseError::invalid_content_length(format!("value {value} is not a decimal length"))
    );
    value.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {value} is not u64")))
}

/// Whether `chunked` is the final transfer coding.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode(raw: &str) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        let mut buf = BytesMut::from(raw);
        HeaderDecoder.decode(&mut buf)
    }

    #[test]
    fn curl_request() {
        let raw = indoc! {"
        GET /index.html?lang=en HTTP/1.1\r
        Host: 127.0.0.1:8080\r
        User-Agent: curl/7.79.1\r
        Accept: */*\r
        \r
        "};

        let (header, payload) = decode(raw).unwrap().unwrap();
        assert_eq!(payload, PayloadSize::Empty);
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), Some("lang=en"));
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::USER_AGENT).unwrap(), "curl/7.79.1");
    }

    #[test]
    fn leaves_body_bytes_in_buffer() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let (header, payload) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn partial_head_needs_more() {
        assert!(decode("GET / HTTP/1.1\r\nHost: exam").unwrap().is_none());
        assert!(decode("").unwrap().is_none());
    }

    #[test]
    fn http10_request() {
        let (header, _) = decode("GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").unwrap().unwrap();
        assert_eq!(header.version(), Version::HTTP_10);
        assert!(header.keep_alive());
    }

    #[test]
    fn chunked_framing() {
        let (_, payload) = decode("POST / HTTP/1.1\r\nTransfer-Encoding: gzip, Chunked\r\n\r\n").unwrap().unwrap();
        assert_eq!(payload, PayloadSize::Chunked);

        assert!(decode("POST / HTTP/1.1\r\nTransfer-Encoding: chunked, gzip\r\n\r\n").is_err());
    }

    #[test]
    fn get_with_body_is_framed() {
        let (_, payload) = decode("GET / HTTP/1.1\r\nContent-Length: 3\r\n\r\n").unwrap().unwrap();
        assert_eq!(payload, PayloadSize::Length(3));
    }

    #[test]
    fn invalid_content_length() {
        assert!(matches!(
            decode("POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n"),
            Err(ParseError::InvalidContentLength { .. })
        ));
        assert!(matches!(
            decode("POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\n"),
            Err(ParseError::InvalidContentLength { .. })
        ));
        assert!(matches!(
            decode("POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n"),
            Err(ParseError::InvalidContentLength { .. })
        ));
    }

    #[test]
    fn oversized_head() {
        let mut raw = String::from("GET / HTTP/1.1\r\nX-Filler: ");
        raw.push_str(&"a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode(&raw), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn too_many_headers() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADER_NUM {
            raw.push_str(&format!("X-H{i}: v\r\n"));
        }
        raw.push_str("\r\n");
        let err = decode(&raw).unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = decode("\x01\x02 nonsense\r\n\r\n").unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }
}
