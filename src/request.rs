use crate::{
    codec::{
        assemble,
        serialize_headers,
        ParseOptions,
    },
    error::Error,
    grammar::{
        assert_valid_method,
        is_protocol_version,
        is_token,
    },
    header_block::parse_message_head,
    headers::Headers,
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
use std::sync::{
    Arc,
    Mutex,
};

/// These are the forms a request-target may take, as listed in
/// [RFC 7230 section 5.3](https://tools.ietf.org/html/rfc7230#section-5.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestTargetForm {
    /// `/path?query`
    Origin,

    /// `scheme://authority/path?query`
    Absolute,

    /// `host:port`, only used with `CONNECT`
    Authority,

    /// `*`, only used with `OPTIONS`
    Asterisk,
}

impl RequestTargetForm {
    /// Determine which form the given request-target takes, given the
    /// method of the request it came with, or return `None` if it takes
    /// none of them.
    #[must_use]
    pub fn classify(
        method: &str,
        target: &str,
    ) -> Option<Self> {
        if target == "*" {
            return method.eq_ignore_ascii_case("OPTIONS").then(|| Self::Asterisk);
        }
        if target.starts_with('/') {
            return Some(Self::Origin);
        }
        if let Some((scheme, _)) = target.split_once("://") {
            let mut bytes = scheme.bytes();
            if matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic())
                && bytes.all(|b| b.is_ascii_alphanumeric() || b"+-.".contains(&b))
            {
                return Some(Self::Absolute);
            }
        }
        if method.eq_ignore_ascii_case("CONNECT")
            && !target.contains(|c: char| matches!(c, '/' | '?' | '#' | '@'))
        {
            return Some(Self::Authority);
        }
        None
    }

    fn to_uri(
        self,
        target: &str,
    ) -> Result<Uri, Error> {
        let unrecognized = || Error::UnrecognizedRequestTarget(target.into());
        match self {
            Self::Origin => {
                let (path, query) = target.split_once('?')
                    .unwrap_or((target, ""));
                Uri::default()
                    .with_path(path)
                    .and_then(|uri| uri.with_query(query))
                    .map_err(|_| unrecognized())
            },
            Self::Absolute => Uri::parse(target),
            Self::Authority => {
                let uri = Uri::parse(format!("//{}", target))
                    .map_err(|_| unrecognized())?;
                if uri.host().is_empty() {
                    Err(unrecognized())
                } else {
                    Ok(uri)
                }
            },
            Self::Asterisk => Ok(Uri::default()),
        }
    }
}

struct RequestLine {
    method: String,
    target: String,
    protocol_version: String,
}

fn parse_request_line(request_line: &str) -> Result<RequestLine, Error> {
    let malformed = || Error::MalformedRequestLine(request_line.into());
    let mut parts = request_line.split(' ');
    let (method, target, protocol) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(method), Some(target), Some(protocol), None) => (method, target, protocol),
        _ => return Err(malformed()),
    };
    if
        !is_token(method)
        || target.is_empty()
        || target.contains(char::is_whitespace)
    {
        return Err(malformed());
    }
    let protocol_version = protocol.strip_prefix("HTTP/")
        .filter(|version| is_protocol_version(version) && !version.starts_with('0'))
        .ok_or_else(malformed)?;
    assert_valid_method(method)?;
    Ok(RequestLine{
        method: method.into(),
        target: target.into(),
        protocol_version: protocol_version.into(),
    })
}

/// This represents an HTTP request: a method, a URI, and optionally an
/// explicit request-target, along with the headers and body every
/// [`Message`] has.
///
/// Requests are immutable; the `with_` methods here and in
/// [`HttpMessage`] return changed copies.
#[derive(Clone, Debug)]
pub struct Request {
    message: Message,
    method: String,
    request_target: Option<String>,
    uri: Uri,
}

impl Request {
    /// Make a request with no headers and an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] if the method is not one of
    /// [`crate::grammar::METHODS`], compared without regard to case.
    pub fn new<T>(
        method: T,
        uri: Uri,
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        Self::from_parts(method, uri, Headers::new(), Body::empty())
    }

    /// Make a request from all of its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] if the method is not supported.
    pub fn from_parts<T>(
        method: T,
        uri: Uri,
        headers: Headers,
        body: Body,
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        let method = method.into();
        assert_valid_method(&method)?;
        Ok(Self{
            message: Message::new(headers, body),
            method,
            request_target: None,
            uri,
        })
    }

    /// Parse a complete request held in memory.
    ///
    /// # Errors
    ///
    /// See [`Request::from_stream_with_options`].
    pub fn from_bytes<T>(raw_request: T) -> Result<Self, Error>
        where T: AsRef<[u8]>
    {
        let stream: SharedStream = Arc::new(Mutex::new(
            MemoryStream::from(raw_request.as_ref())
        ));
        Self::from_stream(&stream)
    }

    /// Parse a request from the start of the given stream, with the default
    /// [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// See [`Request::from_stream_with_options`].
    pub fn from_stream(stream: &SharedStream) -> Result<Self, Error> {
        Self::from_stream_with_options(stream, &ParseOptions::default())
    }

    /// Parse a request from the start of the given stream.  The body of the
    /// request is a view of the stream beginning after the header section.
    ///
    /// # Errors
    ///
    /// * [`Error::StreamNotUsable`] if the stream is not both readable and
    ///   seekable.
    /// * [`Error::MalformedRequestLine`] if the first line is not a request
    ///   line.
    /// * [`Error::UnsupportedMethod`] if the method is not supported.
    /// * [`Error::UnrecognizedRequestTarget`] if the request-target takes
    ///   none of the forms of [`RequestTargetForm`].
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
        let (request_line, block) = parse_message_head(
            stream,
            options,
            parse_request_line
        )?;
        let uri = RequestTargetForm::classify(&request_line.method, &request_line.target)
            .ok_or_else(|| Error::UnrecognizedRequestTarget(request_line.target.clone()))?
            .to_uri(&request_line.target)?;
        let mut request = Self::from_parts(
            request_line.method,
            uri,
            block.headers,
            block.body
        )?;
        request.message.protocol_version = request_line.protocol_version;
        request.request_target = Some(request_line.target);
        tracing::debug!(
            method = %request.method,
            request_target = %request.request_target(),
            "parsed request"
        );
        Ok(request)
    }

    /// Render the request as it would be sent: the request line, then the
    /// headers (starting with the implied `Host` header, if any), then the
    /// body, if it isn't empty.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let request_line = format!(
            "{} {} HTTP/{}",
            self.method,
            self.request_target(),
            self.message.protocol_version
        );
        let headers = self.headers();
        assemble(
            &request_line,
            &serialize_headers(headers.iter()),
            &self.message.body
        )
    }

    /// Return the method, as given.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] if the method is not supported.
    pub fn with_method<T>(
        &self,
        method: T
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        let method = method.into();
        assert_valid_method(&method)?;
        let mut request = self.clone();
        request.method = method;
        Ok(request)
    }

    /// Return the request-target: the one given explicitly or parsed, if
    /// any, or else the path and query of the URI in origin-form, which
    /// always starts with `/`.
    #[must_use]
    pub fn request_target(&self) -> String {
        if let Some(request_target) = &self.request_target {
            return request_target.clone();
        }
        let path = self.uri.path();
        let mut request_target = String::with_capacity(path.len() + 1);
        if !path.starts_with('/') {
            request_target.push('/');
        }
        request_target.push_str(path);
        if !self.uri.query().is_empty() {
            request_target.push('?');
            request_target.push_str(self.uri.query());
        }
        request_target
    }

    /// Return a copy with the given request-target, used verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequestTarget`] if the request-target
    /// contains whitespace.
    pub fn with_request_target<T>(
        &self,
        request_target: T
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        let request_target = request_target.into();
        if request_target.contains(char::is_whitespace) {
            return Err(Error::InvalidRequestTarget(request_target));
        }
        let mut request = self.clone();
        request.request_target = Some(request_target);
        Ok(request)
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Return a copy with the given URI.  If the URI has a host, a stored
    /// `Host` header is replaced by one naming that host, unless
    /// `preserve_host` is set.
    #[must_use]
    pub fn with_uri(
        &self,
        uri: Uri,
        preserve_host: bool,
    ) -> Self {
        let mut request = self.clone();
        request.uri = uri;
        let host = request.implied_host();
        let headers = &mut request.message.headers;
        if !host.is_empty() && !preserve_host && headers.has_header("host") {
            let _ = headers.remove_header("host");
            headers.append("Host".into(), vec![host]);
        }
        request
    }
}

impl HttpMessage for Request {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    fn implied_host(&self) -> String {
        let host = self.uri.host();
        if host.is_empty() {
            return String::new();
        }
        match self.uri.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.into(),
        }
    }
}
