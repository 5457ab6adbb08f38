//! Pieces shared by the request and response codecs: the limits applied
//! while parsing, and the rules for laying out a generated message.

use crate::{
    error::Error,
    stream::Body,
};

// This is the character sequence corresponding to a carriage return (CR)
// followed by a line feed (LF), which officially delimits each
// line of an HTTP message.
pub(crate) const CRLF: &str = "\r\n";

/// These are the limits applied while parsing a message.  A limit of
/// `None` means there is no limit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseOptions {
    /// This is the maximum number of bytes in any one line of the start
    /// line or header section, not counting the line terminator.
    pub line_limit: Option<usize>,

    /// This is the maximum number of bytes in the start line and header
    /// section together, line terminators included.
    pub header_section_limit: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self{
            line_limit: Some(8192),
            header_section_limit: Some(1_048_576),
        }
    }
}

/// Render a header name with each hyphen-delimited segment capitalized,
/// for example `content-type` becomes `Content-Type`.  Letters other than
/// the first of each segment are left alone.
#[must_use]
pub fn train_case(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Render each value of each header as its own `Name: value` line, with
/// lines separated (not terminated) by CRLF.
pub(crate) fn serialize_headers<'a, I>(headers: I) -> String
    where I: IntoIterator<Item = (&'a str, &'a [String])>
{
    let mut lines = Vec::new();
    for (name, values) in headers {
        let name = train_case(name);
        for value in values {
            lines.push(format!("{}: {}", name, value));
        }
    }
    lines.join(CRLF)
}

/// Join the start line, rendered headers and body of a message.  The
/// headers are only preceded by CRLF if there are any, and the blank line
/// separating the header section from the body only appears if there is a
/// body.
pub(crate) fn assemble(
    start_line: &str,
    headers: &str,
    body: &Body,
) -> Result<Vec<u8>, Error> {
    let body = body.to_bytes()?;
    let mut output = Vec::with_capacity(
        start_line.len() + headers.len() + body.len() + 2 * CRLF.len()
    );
    output.extend_from_slice(start_line.as_bytes());
    if !headers.is_empty() {
        output.extend_from_slice(CRLF.as_bytes());
        output.extend_from_slice(headers.as_bytes());
    }
    if !body.is_empty() {
        output.extend_from_slice(CRLF.as_bytes());
        output.extend_from_slice(CRLF.as_bytes());
        output.extend(body);
    }
    tracing::debug!(length = output.len(), "generated message");
    Ok(output)
}
