/// This is the enumeration of all the different kinds of errors which this
/// crate generates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A header value violates the field-value grammar.
    #[error("invalid value for header `{name}`")]
    InvalidHeaderValue {
        /// Name of the header whose value is invalid.
        name: String,

        /// The offending value.
        value: String,
    },

    /// The attached header name is not a valid token.
    #[error("invalid header name")]
    InvalidHeaderName(String),

    /// The attached port is outside the range of TCP/UDP ports.
    #[error("port is out of range")]
    InvalidPort(u16),

    /// The attached path contains a query or fragment delimiter.
    #[error("path must not contain a query string or fragment")]
    InvalidPath(String),

    /// The attached protocol version does not have the form
    /// `major.minor`.
    #[error("invalid protocol version")]
    InvalidProtocolVersion(String),

    /// The attached query contains a fragment delimiter.
    #[error("query must not contain a fragment")]
    InvalidQuery(String),

    /// The attached request target contains whitespace.
    #[error("request target must not contain whitespace")]
    InvalidRequestTarget(String),

    /// The attached status code is outside of the range 100-599.
    #[error("status code is out of range")]
    InvalidStatusCode(u16),

    /// The attached text could not be parsed as a URI.
    #[error("invalid URI")]
    InvalidUri(String),

    /// The body could not be serialized as JSON.
    #[error("unable to encode body as JSON")]
    Json(#[source] serde_json::Error),

    /// The attached bytes form a line containing a carriage return which
    /// isn't followed by a line feed, or a line feed which isn't preceded
    /// by a carriage return.
    #[error("malformed line")]
    MalformedLine(Vec<u8>),

    /// The attached header line is neither a `name: value` pair nor a
    /// continuation of a previous header.
    #[error("malformed header line")]
    MalformedHeader(String),

    /// The attached request line could not be parsed.
    #[error("malformed request line")]
    MalformedRequestLine(String),

    /// The header section is larger than the configured limit.
    #[error("message exceeds maximum size limit")]
    MessageTooLong,

    /// The attached bytes are the beginning of a line whose length exceeds
    /// the line limit.
    #[error("line too long")]
    LineTooLong(Vec<u8>),

    /// The attached bytes did not parse as valid text.
    #[error("line is not valid text")]
    LineNotValidText(Vec<u8>),

    /// There is no header with the attached name.
    #[error("no such header")]
    MissingHeader(String),

    /// A header was given an empty list of values.
    #[error("header must have at least one value")]
    NoHeaderValues(String),

    /// The attached line is not an HTTP status line.
    #[error("no status line detected")]
    NoStatusLine(String),

    /// The underlying stream failed.
    #[error("stream error")]
    Stream(#[source] std::io::Error),

    /// A message can only be parsed from a stream which is both readable
    /// and seekable.
    #[error("message stream must be both readable and seekable")]
    StreamNotUsable,

    /// The stream does not support reading.
    #[error("stream is not readable")]
    StreamNotReadable,

    /// The stream does not support seeking.
    #[error("stream is not seekable")]
    StreamNotSeekable,

    /// The stream does not support writing.
    #[error("stream is not writable")]
    StreamNotWritable,

    /// The stream ended immediately after a carriage return.
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// The attached continuation line appeared before any header.
    #[error("header continuation without a preceding header")]
    UnexpectedContinuation(String),

    /// The attached request target doesn't have any of the four forms
    /// permitted for the request method.
    #[error("unrecognized request target form")]
    UnrecognizedRequestTarget(String),

    /// The attached method is not one this crate recognizes.
    #[error("unsupported HTTP method")]
    UnsupportedMethod(String),

    /// The attached scheme is not in the set of supported schemes.
    #[error("unsupported URI scheme")]
    UnsupportedScheme(String),
}
