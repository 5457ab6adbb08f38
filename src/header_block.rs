use crate::{
    codec::ParseOptions,
    error::Error,
    grammar::is_tchar,
    headers::Headers,
    lexer::LineLexer,
    stream::{
        lock,
        Body,
        RelativeStream,
        SharedStream,
    },
};

// Optional whitespace (OWS) consists of spaces and horizontal tabs.
fn trim_ows(text: &str) -> &str {
    text.trim_matches(|c: char| c == ' ' || c == '\t')
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

// Split a `name ":" OWS value` line, or return `None` if the line doesn't
// have that form.
fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let delimiter = line.find(':')?;
    let name = &line[..delimiter];
    if name.is_empty() || !name.bytes().all(is_tchar) {
        return None;
    }
    Some((name, trim_ows(&line[delimiter + 1..])))
}

/// Read header lines from the lexer until a blank line (or the end of the
/// stream), returning the headers in the order their names first appear.
///
/// A line starting with a space or tab continues the value of the header
/// on the line before it; the folded text is joined to that value with a
/// single space.  A line which isn't valid UTF-8 is read as ISO-8859-1.
///
/// # Errors
///
/// * [`Error::MalformedHeader`] for a line which is neither a header nor a
///   continuation.
/// * [`Error::UnexpectedContinuation`] for a continuation line with no
///   header before it.
/// * Any error from [`Headers::assert_valid_header`] or from the lexer.
pub fn parse_header_lines(lexer: &mut LineLexer<'_>) -> Result<Headers, Error> {
    let mut headers: Vec<(String, Vec<String>)> = Vec::new();
    loop {
        let line = lexer.next_field_line()?;
        if line.is_empty() {
            break;
        }
        if is_continuation(&line) {
            let current = headers.last_mut()
                .and_then(|(_, values)| values.last_mut())
                .ok_or_else(|| Error::UnexpectedContinuation(line.clone()))?;
            tracing::debug!("unfolding obsolete line folding");
            let folded = trim_ows(&line);
            if !folded.is_empty() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(folded);
            }
            continue;
        }
        let (name, value) = split_header_line(&line)
            .ok_or_else(|| Error::MalformedHeader(line.clone()))?;
        tracing::trace!(name, "parsed header");
        match headers.last_mut() {
            Some((last_name, values)) if last_name == name => values.push(value.into()),
            _ => headers.push((name.into(), vec![value.into()])),
        }
    }
    Headers::from_pairs(headers)
}

/// This is the result of splitting a message into its header section and
/// body.
pub struct HeaderBlock {
    pub headers: Headers,

    /// This view of the message stream begins right after the blank line
    /// ending the header section.
    pub body: Body,
}

// Lex an optional start line and then the header section from the stream,
// holding its lock throughout, and split off the body view.
fn read_head<F, T>(
    stream: &SharedStream,
    options: &ParseOptions,
    start: F,
) -> Result<(T, HeaderBlock), Error>
    where F: FnOnce(&mut LineLexer<'_>) -> Result<T, Error>
{
    let (start, headers, offset) = {
        let mut guard = lock(stream);
        let mut lexer = LineLexer::new(&mut *guard, options);
        let start = start(&mut lexer)?;
        let headers = parse_header_lines(&mut lexer)?;
        tracing::trace!(consumed = lexer.consumed(), "parsed header section");
        let offset = guard.tell()?;
        (start, headers, offset)
    };
    Ok((start, HeaderBlock{
        headers,
        body: Body::new(RelativeStream::new(stream.clone(), offset)),
    }))
}

/// Parse the header section of a message from the given shared stream,
/// which must be positioned at the first header line.  The body of the
/// result shares the stream, but begins where the header section ends, so
/// reading it never yields header bytes and never copies the body.
///
/// # Errors
///
/// Returns any error from [`parse_header_lines`] or from the stream.
pub fn parse_header_block(
    stream: &SharedStream,
    options: &ParseOptions,
) -> Result<HeaderBlock, Error> {
    read_head(stream, options, |_| Ok(()))
        .map(|((), block)| block)
}

/// Read the start line of a message from the given shared stream, hand it
/// to `parse_start_line`, and then parse the header section following it.
/// The limits in `options` apply to the start line and header section
/// together.
pub(crate) fn parse_message_head<F, T>(
    stream: &SharedStream,
    options: &ParseOptions,
    parse_start_line: F,
) -> Result<(T, HeaderBlock), Error>
    where F: FnOnce(&str) -> Result<T, Error>
{
    read_head(stream, options, |lexer| {
        let line = lexer.next_line()?;
        parse_start_line(&line)
    })
}
