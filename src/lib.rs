//! This crate models HTTP messages as immutable values and converts them
//! to and from their wire format.  It also provides a URI type following
//! [IETF RFC 3986](https://tools.ietf.org/html/rfc3986), which requests use
//! for their targets.

#![warn(clippy::pedantic)]
#![allow(clippy::non_ascii_literal)]
#![allow(clippy::module_name_repetitions)]

mod codec;
mod error;
pub mod grammar;
mod header_block;
mod headers;
mod lexer;
mod message;
mod request;
mod response;
mod stream;
mod uri;

pub use crate::codec::{
    train_case,
    ParseOptions,
};
pub use crate::error::Error;
pub use crate::header_block::{
    parse_header_block,
    parse_header_lines,
    HeaderBlock,
};
pub use crate::headers::{
    inject_content_type,
    HeaderValues,
    Headers,
};
pub use crate::lexer::LineLexer;
pub use crate::message::{
    HttpMessage,
    Message,
};
pub use crate::request::{
    Request,
    RequestTargetForm,
};
pub use crate::response::{
    reason_phrase,
    Response,
};
pub use crate::stream::{
    Body,
    CachingStream,
    MemoryStream,
    RelativeStream,
    SharedStream,
    Stream,
};
pub use crate::uri::Uri;
