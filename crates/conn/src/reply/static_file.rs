//! Static content: files below a document root, or one fixed in-memory body.

use std::fmt;
use std::io;
use std::mem;
use std::path::{Component, Path, PathBuf};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Response, StatusCode};
use mime::Mime;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::protocol::{Message, PayloadItem, PayloadSize, ReplyError, RequestHeader, ResponseHead};
use crate::reply::{ReplyContext, ReplyMessage, ReplyProducer};

/// Read size for file bodies.
const READ_CHUNK: usize = 8 * 1024;

const INDEX_FILE: &str = "index.html";

enum Source {
    Dir(PathBuf),
    Bytes { content_type: HeaderValue, body: Bytes },
}

enum State {
    Idle,
    Opening(BoxFuture<'static, io::Result<(File, u64, PathBuf)>>),
    /// a head decided in `begin`, followed by an optional in-memory body
    Head { head: ResponseHead, size: PayloadSize, body: Option<Bytes> },
    Memory(Bytes),
    Streaming(ReaderStream<File>),
    Eof,
    Done,
}

pub struct StaticReply {
    source: Source,
    state: State,
}

impl fmt::Debug for StaticReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Dir(root) => root.display().to_string(),
            Source::Bytes { body, .. } => format!("{} bytes in memory", body.len()),
        };
        f.debug_struct("StaticReply").field("source", &source).finish()
    }
}

impl StaticReply {
    /// Serves files below `root`. Directories resolve to their `index.html`.
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self { source: Source::Dir(root.into()), state: State::Idle }
    }

    /// Answers every request with `body`.
    pub fn from_bytes(content_type: Mime, body: impl Into<Bytes>) -> Self {
        let content_type = HeaderValue::from_str(content_type.as_ref()).unwrap_or(HeaderValue::from_static("application/octet-stream"));
        Self { source: Source::Bytes { content_type, body: body.into() }, state: State::Idle }
    }
}

impl ReplyProducer for StaticReply {
    fn begin(&mut self, request: &RequestHeader) -> Result<(), ReplyError> {
        if !matches!(request.method(), &Method::GET | &Method::HEAD) {
            self.state = empty_head(StatusCode::METHOD_NOT_ALLOWED);
            return Ok(());
        }

        self.state = match &self.source {
            Source::Bytes { content_type, body } => {
                let mut head = status_head(StatusCode::OK);
                head.headers_mut().insert(CONTENT_TYPE, content_type.clone());
                State::Head { head, size: PayloadSize::new_length(body.len() as u64), body: Some(body.clone()) }
            }
            Source::Dir(root) => match resolve(root, request.uri().path()) {
                Some(path) => State::Opening(open(path).boxed()),
                None => {
                    debug!(path = request.uri().path(), "rejected static path");
                    empty_head(StatusCode::NOT_FOUND)
                }
            },
        };
        Ok(())
    }

    fn poll_next_chunk(&mut self, cx: &mut Context<'_>, _ctx: &mut ReplyContext<'_>) -> Poll<Result<ReplyMessage, ReplyError>> {
        match mem::replace(&mut self.state, State::Done) {
            State::Idle | State::Done => Poll::Ready(Err(ReplyError::body("no response in progress"))),

            State::Head { head, size, body } => {
                self.state = match body {
                    Some(body) if !body.is_empty() => State::Memory(body),
                    _ => State::Eof,
                };
                Poll::Ready(Ok(Message::Header((head, size))))
            }

            State::Opening(mut future) => match future.poll_unpin(cx) {
                Poll::Pending => {
                    self.state = State::Opening(future);
                    Poll::Pending
                }
                Poll::Ready(Ok((file, len, path))) => {
                    debug!(path = %path.display(), len, "serving static file");
                    let mut head = status_head(StatusCode::OK);
                    head.headers_mut().insert(CONTENT_TYPE, content_type_for(&path));
                    self.state = State::Streaming(ReaderStream::with_capacity(file, READ_CHUNK));
                    Poll::Ready(Ok(Message::Header((head, PayloadSize::new_length(len)))))
                }
                Poll::Ready(Err(e)) => {
                    let status = match e.kind() {
                        io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                        _ => {
                            warn!(cause = %e, "failed to open static file");
                            StatusCode::FORBIDDEN
                        }
                    };
                    self.state = State::Eof;
                    Poll::Ready(Ok(Message::Header((status_head(status), PayloadSize::Empty))))
                }
            },

            State::Memory(body) => {
                self.state = State::Eof;
                Poll::Ready(Ok(Message::Payload(PayloadItem::Chunk(body))))
            }

            State::Streaming(mut stream) => match stream.poll_next_unpin(cx) {
                Poll::Pending => {
                    self.state = State::Streaming(stream);
                    Poll::Pending
                }
                Poll::Ready(Some(Ok(bytes))) => {
                    self.state = State::Streaming(stream);
                    Poll::Ready(Ok(Message::Payload(PayloadItem::Chunk(bytes))))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Err(e.into())),
                Poll::Ready(None) => Poll::Ready(Ok(Message::Payload(PayloadItem::Eof))),
            },

            State::Eof => Poll::Ready(Ok(Message::Payload(PayloadItem::Eof))),
        }
    }

    fn abandon(&mut self) {
        self.state = State::Done;
    }
}

async fn open(path: PathBuf) -> io::Result<(File, u64, PathBuf)> {
    let mut path = path;
    let mut metadata = tokio::fs::metadata(&path).await?;
    if metadata.is_dir() {
        path.push(INDEX_FILE);
        metadata = tokio::fs::metadata(&path).await?;
    }
    if !metadata.is_file() {
        return Err(io::Error::from(io::ErrorKind::NotFound));
    }
    let file = File::open(&path).await?;
    Ok((file, metadata.len(), path))
}

/// Maps a request path onto `root`, refusing anything that would leave it.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

fn empty_head(status: StatusCode) -> State {
    State::Head { head: status_head(status), size: PayloadSize::Empty, body: None }
}

fn status_head(status: StatusCode) -> ResponseHead {
    let mut head = Response::new(());
    *head.status_mut() = status;
    head
}

fn content_type_for(path: &Path) -> HeaderValue {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    let mime = match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js" | "mjs") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("csv") => mime::TEXT_CSV_UTF_8,
        Some("xml") => mime::TEXT_XML,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("svg") => mime::IMAGE_SVG,
        Some("bmp") => mime::IMAGE_BMP,
        Some("woff") => mime::FONT_WOFF,
        Some("woff2") => mime::FONT_WOFF2,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    HeaderValue::from_str(mime.as_ref()).unwrap_or(HeaderValue::from_static("application/octet-stream"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::DisconnectWatch;
    use futures::future::poll_fn;
    use http::Request;

    struct TempRoot(PathBuf);

    impl TempRoot {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("micro-conn-{name}-{}", std::process::id()));
            std::fs::create_dir_all(dir.join("docs")).unwrap();
            std::fs::write(dir.join("hello.txt"), b"hello static").unwrap();
            std::fs::write(dir.join("docs").join("index.html"), b"<h1>docs</h1>").unwrap();
            Self(dir)
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn get(path: &str) -> RequestHeader {
        Request::builder().method(Method::GET).uri(path).body(()).unwrap().into()
    }

    /// Polls `reply` to the end, returning status, content type and body.
    async fn run(reply: &mut StaticReply, request: &RequestHeader) -> (StatusCode, Option<HeaderValue>, Vec<u8>) {
        reply.begin(request).unwrap();
        let mut watch = DisconnectWatch::default();
        let mut status = None;
        let mut content_type = None;
        let mut body = Vec::new();
        loop {
            let message = poll_fn(|cx| reply.poll_next_chunk(cx, &mut ReplyContext::new(&mut watch, true))).await.unwrap();
            match message {
                Message::Header((head, _)) => {
                    status = Some(head.status());
                    content_type = head.headers().get(CONTENT_TYPE).cloned();
                }
                Message::Payload(PayloadItem::Chunk(bytes)) => body.extend_from_slice(&bytes),
                Message::Payload(PayloadItem::Eof) => break,
            }
        }
        (status.unwrap(), content_type, body)
    }

    #[tokio::test]
    async fn serves_files_and_index() {
        let root = TempRoot::new("serve");
        let mut reply = StaticReply::from_dir(&root.0);

        let (status, content_type, body) = run(&mut reply, &get("/hello.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.unwrap(), "text/plain; charset=utf-8");
        assert_eq!(body, b"hello static");

        // the same producer serves the next request of the connection
        let (status, content_type, body) = run(&mut reply, &get("/docs/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.unwrap(), "text/html; charset=utf-8");
        assert_eq!(body, b"<h1>docs</h1>");
    }

    #[tokio::test]
    async fn missing_and_escaping_paths_are_not_found() {
        let root = TempRoot::new("missing");
        let mut reply = StaticReply::from_dir(&root.0);

        assert_eq!(run(&mut reply, &get("/nope.txt")).await.0, StatusCode::NOT_FOUND);
        assert_eq!(run(&mut reply, &get("/../hello.txt")).await.0, StatusCode::NOT_FOUND);
        assert!(resolve(Path::new("/srv"), "/a/./b").is_some_and(|path| path == Path::new("/srv/a/b")));
    }

    #[tokio::test]
    async fn in_memory_body() {
        let mut reply = StaticReply::from_bytes(mime::TEXT_PLAIN, "pong");
        let (status, content_type, body) = run(&mut reply, &get("/ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.unwrap(), "text/plain");
        assert_eq!(body, b"pong");

        let post = Request::builder().method(Method::POST).uri("/ping").body(()).unwrap().into();
        assert_eq!(run(&mut reply, &post).await.0, StatusCode::METHOD_NOT_ALLOWED);
    }
}
