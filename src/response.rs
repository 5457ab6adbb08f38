use crate::{
    codec::{
        assemble,
        serialize_headers,
        ParseOptions,
    },
    error::Error,
    header_block::parse_message_head,
    headers::{
        inject_content_type,
        Headers,
    },
    message::{
        HttpMessage,
        Message,
    },
    stream::{
        lock,
        Body,
        MemoryStream,
        SharedStream,
    },
    uri::Uri,
};
use serde::Serialize;
use serde_json::ser::{
    CharEscape,
    CompactFormatter,
    Formatter,
    Serializer,
};
use std::{
    io::Write,
    sync::{
        Arc,
        Mutex,
    },
};

/// Return the standard reason phrase for the given status code, or an
/// empty string if the code has none.
#[must_use]
pub fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => "",
    }
}

fn assert_valid_status_code(status_code: u16) -> Result<(), Error> {
    if (100..=599).contains(&status_code) {
        Ok(())
    } else {
        Err(Error::InvalidStatusCode(status_code))
    }
}

struct StatusLine {
    protocol_version: String,
    status_code: u16,
    reason_phrase: String,
}

fn parse_status_line(status_line: &str) -> Result<StatusLine, Error> {
    let no_status_line = || Error::NoStatusLine(status_line.into());
    let (protocol_version, rest) = status_line.strip_prefix("HTTP/")
        .and_then(|rest| rest.split_once(' '))
        .ok_or_else(no_status_line)?;
    let version_ok = match protocol_version.as_bytes() {
        [major @ .., b'.', minor] => {
            matches!(major.first(), Some(b'1'..=b'9'))
                && major.iter().all(u8::is_ascii_digit)
                && minor.is_ascii_digit()
        },
        _ => false,
    };
    if !version_ok {
        return Err(no_status_line());
    }
    let status_code = rest.get(..3)
        .filter(|code| {
            let code = code.as_bytes();
            matches!(code[0], b'1'..=b'5') && code.iter().all(u8::is_ascii_digit)
        })
        .and_then(|code| code.parse().ok())
        .ok_or_else(no_status_line)?;
    let reason_phrase = match &rest[3..] {
        "" => "",
        after if after.starts_with(char::is_whitespace) => match after.trim_start() {
            "" => return Err(no_status_line()),
            reason_phrase => reason_phrase,
        },
        _ => return Err(no_status_line()),
    };
    Ok(StatusLine{
        protocol_version: protocol_version.into(),
        status_code,
        reason_phrase: reason_phrase.into(),
    })
}

// This writes JSON the way `serde_json`'s compact formatter does, except
// that the characters which could let JSON embedded in HTML break out of its
// element or attribute, and everything outside ASCII, are written as
// `\uXXXX` escapes.  The slash is left alone.
struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> std::io::Result<()>
        where W: ?Sized + std::io::Write
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escape = match c {
                '<' => "\\u003C",
                '>' => "\\u003E",
                '&' => "\\u0026",
                '\'' => "\\u0027",
                c if c.is_ascii() => continue,
                _ => "",
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            if escape.is_empty() {
                let mut units = [0; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            } else {
                writer.write_all(escape.as_bytes())?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W>(
        &mut self,
        writer: &mut W,
        char_escape: CharEscape,
    ) -> std::io::Result<()>
        where W: ?Sized + std::io::Write
    {
        match char_escape {
            CharEscape::Quote => writer.write_all(b"\\u0022"),
            other => CompactFormatter.write_char_escape(writer, other),
        }
    }
}

/// This represents an HTTP response: a status code and reason phrase,
/// along with the headers and body every [`Message`] has.
///
/// Responses are immutable; the `with_` methods here and in
/// [`HttpMessage`] return changed copies.
#[derive(Clone, Debug)]
pub struct Response {
    message: Message,
    reason_phrase: String,
    status_code: u16,
}

impl Response {
    /// Make a response with the given status code, its standard reason
    /// phrase, no headers and an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] unless the status code is in
    /// the range 100 to 599.
    pub fn new(status_code: u16) -> Result<Self, Error> {
        Self::from_parts(status_code, Headers::new(), Body::empty())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] unless the status code is in
    /// the range 100 to 599.
    pub fn from_parts(
        status_code: u16,
        headers: Headers,
        body: Body,
    ) -> Result<Self, Error> {
        assert_valid_status_code(status_code)?;
        Ok(Self{
            message: Message::new(headers, body),
            reason_phrase: reason_phrase(status_code).into(),
            status_code,
        })
    }

    /// Make a `text/plain` response with the given text as its body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] for a status code out of range.
    pub fn text<T>(
        text: T,
        status_code: u16,
        headers: Headers,
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        let headers = inject_content_type("text/plain; charset=utf-8", headers)?;
        Self::from_parts(status_code, headers, Body::from(text.into()))
    }

    /// Make a `text/html` response with the given markup as its body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] for a status code out of range.
    pub fn html<T>(
        html: T,
        status_code: u16,
        headers: Headers,
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        let headers = inject_content_type("text/html; charset=utf-8", headers)?;
        Self::from_parts(status_code, headers, Body::from(html.into()))
    }

    /// Make an `application/json` response with the given data, serialized,
    /// as its body.  The characters `<`, `>`, `&`, `'` and `"` inside
    /// strings are escaped so that the body is also safe to embed in HTML,
    /// and so is everything outside ASCII.
    ///
    /// # Errors
    ///
    /// * [`Error::Json`] if the data cannot be serialized.
    /// * [`Error::InvalidStatusCode`] for a status code out of range.
    pub fn json<T>(
        data: &T,
        status_code: u16,
        headers: Headers,
    ) -> Result<Self, Error>
        where T: Serialize + ?Sized
    {
        let mut json = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut json, HtmlSafeFormatter);
        data.serialize(&mut serializer).map_err(Error::Json)?;
        let headers = inject_content_type("application/json", headers)?;
        Self::from_parts(status_code, headers, Body::from(json))
    }

    /// Make a response with no body, typically with status code 204.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] for a status code out of range.
    pub fn empty(
        status_code: u16,
        headers: Headers,
    ) -> Result<Self, Error> {
        let body = MemoryStream::read_only(Vec::new());
        Self::from_parts(status_code, headers, Body::new(body))
    }

    /// Make a response redirecting to the given URI, typically with status
    /// code 302.  Any `Location` header given is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] for a status code out of range.
    pub fn redirect(
        uri: &Uri,
        status_code: u16,
        mut headers: Headers,
    ) -> Result<Self, Error> {
        headers.set_header("location", uri.to_string())?;
        Self::from_parts(status_code, headers, Body::empty())
    }

    /// Parse a complete response held in memory.
    ///
    /// # Errors
    ///
    /// See [`Response::from_stream_with_options`].
    pub fn from_bytes<T>(raw_response: T) -> Result<Self, Error>
        where T: AsRef<[u8]>
    {
        let stream: SharedStream = Arc::new(Mutex::new(
            MemoryStream::from(raw_response.as_ref())
        ));
        Self::from_stream(&stream)
    }

    /// Parse a response from the start of the given stream, with the
    /// default [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// See [`Response::from_stream_with_options`].
    pub fn from_stream(stream: &SharedStream) -> Result<Self, Error> {
        Self::from_stream_with_options(stream, &ParseOptions::default())
    }

    /// Parse a response from the start of the given stream.  The body of
    /// the response is a view of the stream beginning after the header
    /// section.
    ///
    /// # Errors
    ///
    /// * [`Error::StreamNotUsable`] if the stream is not both readable and
    ///   seekable.
    /// * [`Error::NoStatusLine`] if the first line is not a status line.
    /// * Any error from the header section or the stream.
    pub fn from_stream_with_options(
        stream: &SharedStream,
        options: &ParseOptions,
    ) -> Result<Self, Error> {
        {
            let mut stream = lock(stream);
            if !stream.is_readable() || !stream.is_seekable() {
                return Err(Error::StreamNotUsable);
            }
            stream.rewind()?;
        }
        let (status_line, block) = parse_message_head(
            stream,
            options,
            parse_status_line
        )?;
        let mut response = Self::from_parts(
            status_line.status_code,
            block.headers,
            block.body
        )?;
        response.message.protocol_version = status_line.protocol_version;
        response.reason_phrase = status_line.reason_phrase;
        tracing::debug!(status_code = response.status_code, "parsed response");
        Ok(response)
    }

    /// Render the response as it would be sent: the status line, then the
    /// headers, then the body, if it isn't empty.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut status_line = format!(
            "HTTP/{} {}",
            self.message.protocol_version,
            self.status_code
        );
        if !self.reason_phrase.is_empty() {
            status_line.push(' ');
            status_line.push_str(&self.reason_phrase);
        }
        assemble(
            &status_line,
            &serialize_headers(self.message.headers.iter()),
            &self.message.body
        )
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    #[must_use]
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// Return a copy with the given status code and reason phrase, which is
    /// kept as given, even if empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatusCode`] unless the status code is in
    /// the range 100 to 599.
    pub fn with_status<T>(
        &self,
        status_code: u16,
        reason_phrase: T,
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        assert_valid_status_code(status_code)?;
        let mut response = self.clone();
        response.status_code = status_code;
        response.reason_phrase = reason_phrase.into();
        Ok(response)
    }
}

impl HttpMessage for Response {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn generate_get_response() {
        let body = "Hello World! My payload includes a trailing CRLF.\r\n";
        let response = Response::new(200).unwrap()
            .with_header("Date", "Mon, 27 Jul 2009 12:28:53 GMT").unwrap()
            .with_header("Accept-Ranges", "bytes").unwrap()
            .with_header("Content-Type", "text/plain").unwrap()
            .with_header("Content-Length", body.len()).unwrap()
            .with_body(Body::from(body));
        assert_eq!(
            format!(
                concat!(
                    "HTTP/1.1 200 OK\r\n",
                    "Date: Mon, 27 Jul 2009 12:28:53 GMT\r\n",
                    "Accept-Ranges: bytes\r\n",
                    "Content-Type: text/plain\r\n",
                    "Content-Length: {}\r\n",
                    "\r\n",
                    "Hello World! My payload includes a trailing CRLF.\r\n",
                ),
                body.len()
            ).as_bytes(),
            response.to_bytes().unwrap()
        );
    }

    #[test]
    fn generate_without_reason_phrase() {
        let response = Response::new(299).unwrap();
        assert_eq!("", response.reason_phrase());
        assert_eq!(b"HTTP/1.1 299".to_vec(), response.to_bytes().unwrap());
    }

    #[test]
    fn parse_not_found() {
        let response = Response::from_bytes("HTTP/1.1 404 Not Found\r\n\r\n").unwrap();
        assert_eq!(404, response.status_code());
        assert_eq!("Not Found", response.reason_phrase());
        assert_eq!("1.1", response.protocol_version());
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }

    #[test]
    fn parse_with_headers_and_body() {
        let raw_response = concat!(
            "HTTP/1.0 200 OK\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Length: 13\r\n",
            "\r\n",
            "Hello, World!",
        );
        let response = Response::from_bytes(raw_response).unwrap();
        assert_eq!(200, response.status_code());
        assert_eq!("1.0", response.protocol_version());
        assert_eq!("text/plain", response.header_line("content-type"));
        assert_eq!(b"Hello, World!".to_vec(), response.body().to_bytes().unwrap());
        assert_eq!(raw_response.as_bytes(), response.to_bytes().unwrap());
    }

    #[test]
    fn parse_keeps_reason_phrase_verbatim() {
        let response = Response::from_bytes("HTTP/1.1 200 All Good Here\r\n\r\n").unwrap();
        assert_eq!("All Good Here", response.reason_phrase());
        let response = Response::from_bytes("HTTP/1.1 204\r\n\r\n").unwrap();
        assert_eq!("", response.reason_phrase());
    }

    #[test]
    fn parse_invalid_status_lines() {
        for line in &[
            "",
            "HTTP/1.1",
            "HTTP/1.1 ",
            "HTTP/1.1 99 Low",
            "HTTP/1.1 600 High",
            "HTTP/1.1 2000 Long",
            "HTTP/1.1 200 ",
            "HTTP/1.1 200 \t",
            "HTTP/1.1 20x Hex",
            "HTTP/1 200 OK",
            "HTTP/0.9 200 OK",
            "HTTP/1.10 200 OK",
            "http/1.1 200 OK",
            "GET / HTTP/1.1",
        ] {
            assert!(
                matches!(
                    Response::from_bytes(format!("{}\r\n\r\n", line)),
                    Err(Error::NoStatusLine(parsed)) if parsed == *line
                ),
                "{:?} should not parse",
                line
            );
        }
    }

    #[test]
    fn parse_malformed_header() {
        assert!(matches!(
            Response::from_bytes("HTTP/1.1 200 OK\r\nBroken\r\n\r\n"),
            Err(Error::MalformedHeader(line)) if line == "Broken"
        ));
    }

    #[test]
    fn new_uses_standard_reason_phrase() {
        assert_eq!("OK", Response::new(200).unwrap().reason_phrase());
        assert_eq!("Found", Response::new(302).unwrap().reason_phrase());
        assert_eq!("Service Unavailable", Response::new(503).unwrap().reason_phrase());
        assert!(matches!(Response::new(99), Err(Error::InvalidStatusCode(99))));
        assert!(matches!(Response::new(600), Err(Error::InvalidStatusCode(600))));
    }

    #[test]
    fn with_status() {
        let response = Response::new(200).unwrap();
        let changed = response.with_status(404, "Nope").unwrap();
        assert_eq!(404, changed.status_code());
        assert_eq!("Nope", changed.reason_phrase());
        assert_eq!(200, response.status_code());
        assert_eq!("", response.with_status(500, "").unwrap().reason_phrase());
        assert!(matches!(
            response.with_status(1000, "Huge"),
            Err(Error::InvalidStatusCode(1000))
        ));
    }

    #[test]
    fn text_response() {
        let response = Response::text("Hello", 200, Headers::new()).unwrap();
        assert_eq!("text/plain; charset=utf-8", response.header_line("Content-Type"));
        assert_eq!(b"Hello".to_vec(), response.body().to_bytes().unwrap());
    }

    #[test]
    fn html_response_keeps_given_content_type() {
        let headers = Headers::from_pairs(vec![
            ("Content-Type", "application/xhtml+xml"),
        ]).unwrap();
        let response = Response::html("<p>Hi</p>", 201, headers).unwrap();
        assert_eq!(201, response.status_code());
        assert_eq!(vec!["application/xhtml+xml"], response.header("content-type"));
        assert_eq!(1, response.headers().len());
    }

    #[test]
    fn json_response() {
        #[derive(serde::Serialize)]
        struct Greeting<'a> {
            text: &'a str,
            count: u32,
        }
        let response = Response::json(
            &Greeting{
                text: "<b>Tom & Jerry's</b>",
                count: 2,
            },
            200,
            Headers::new()
        ).unwrap();
        assert_eq!("application/json", response.header_line("content-type"));
        assert_eq!(
            br#"{"text":"\u003Cb\u003ETom \u0026 Jerry\u0027s\u003C/b\u003E","count":2}"#.to_vec(),
            response.body().to_bytes().unwrap()
        );
    }

    #[test]
    fn json_response_escapes_quotes_and_non_ascii() {
        let response = Response::json(&"say \"hi\" / caf\u{e9} \u{1f600}", 200, Headers::new()).unwrap();
        assert_eq!(
            br#""say \u0022hi\u0022 / caf\u00e9 \ud83d\ude00""#.to_vec(),
            response.body().to_bytes().unwrap()
        );
    }

    #[test]
    fn json_response_unencodable_data() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1_u8], 2);
        assert!(matches!(
            Response::json(&map, 200, Headers::new()),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn empty_response() {
        let response = Response::empty(204, Headers::new()).unwrap();
        assert_eq!("No Content", response.reason_phrase());
        assert!(response.body().is_empty());
        assert!(response.body().write("x").is_err());
        assert_eq!(b"HTTP/1.1 204 No Content".to_vec(), response.to_bytes().unwrap());
    }

    #[test]
    fn redirect_response() {
        let uri = Uri::parse("https://example.com/new").unwrap();
        let headers = Headers::from_pairs(vec![("Location", "/old")]).unwrap();
        let response = Response::redirect(&uri, 302, headers).unwrap();
        assert_eq!(302, response.status_code());
        assert_eq!(vec!["https://example.com/new"], response.header("Location"));
        assert_eq!(
            b"HTTP/1.1 302 Found\r\nLocation: https://example.com/new".to_vec(),
            response.to_bytes().unwrap()
        );
    }

}
