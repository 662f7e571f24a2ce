//! Core HTTP protocol types shared by the codec, the reply producers and the connection.
//!
//! - **Message Handling** ([`message`]): [`Message`], [`PayloadItem`], [`PayloadSize`]
//! - **Request Processing** ([`request`]): [`RequestHeader`]
//! - **Response Processing** ([`response`]): [`ResponseHead`] and stock replies
//! - **Error Handling** ([`error`]): [`ConnectionError`], [`ParseError`], [`SendError`], [`ReplyError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::CONTINUE_RESPONSE;
pub use response::ResponseHead;
pub use response::stock_reply;

mod error;
pub use error::ConnectionError;
pub use error::ParseError;
pub use error::ReplyError;
pub use error::SendError;
pub use error::TimeoutSide;
