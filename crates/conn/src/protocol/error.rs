use http::StatusCode;
use std::fmt;
use std::io;
use thiserror::Error;

/// Which deadline of a connection expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSide {
    Read,
    Write,
}

impl fmt::Display for TimeoutSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutSide::Read => f.write_str("read"),
            TimeoutSide::Write => f.write_str("write"),
        }
    }
}

/// Fatal outcome of a connection, returned by [`HttpConnection::process`](crate::connection::HttpConnection::process).
///
/// Cancellation (an explicit stop, or an aborted socket) is not an error and never shows up here.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: io::Error,
    },

    #[error("{0} deadline expired")]
    Timeout(TimeoutSide),

    #[error("protocol error: {source}")]
    Protocol {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("reply producer error: {source}")]
    Reply {
        #[from]
        source: ReplyError,
    },

    #[error("dispatch error: {reason}")]
    Dispatch { reason: String },
}

impl ConnectionError {
    pub fn dispatch<S: ToString>(str: S) -> Self {
        Self::Dispatch { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("buffered request data too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: usize, max_size: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Status of the stock reply answering this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            ParseError::TooLargeBody { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Failure reported by a reply producer.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("resource not found: {path}")]
    NotFound { path: String },

    #[error("upstream error: {reason}")]
    Upstream { reason: String },

    #[error("body error: {reason}")]
    Body { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ReplyError {
    pub fn not_found<S: ToString>(path: S) -> Self {
        Self::NotFound { path: path.to_string() }
    }

    pub fn upstream<S: ToString>(str: S) -> Self {
        Self::Upstream { reason: str.to_string() }
    }

    pub fn body<S: ToString>(str: S) -> Self {
        Self::Body { reason: str.to_string() }
    }
}
