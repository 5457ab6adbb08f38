use crate::{
    error::Error,
    grammar::assert_valid_protocol_version,
    headers::{
        HeaderValues,
        Headers,
    },
    stream::Body,
};

/// This is the state every HTTP message has, whether request or response:
/// a protocol version, headers, and a body.
#[derive(Clone, Debug)]
pub struct Message {
    pub(crate) protocol_version: String,
    pub(crate) headers: Headers,
    pub(crate) body: Body,
}

impl Message {
    #[must_use]
    pub fn new(
        headers: Headers,
        body: Body,
    ) -> Self {
        Self{
            protocol_version: "1.1".into(),
            headers,
            body,
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Headers::new(), Body::empty())
    }
}

/// This is implemented by the request and response types to share the
/// accessors and `with_` methods of the [`Message`] they carry.  Every
/// `with_` method leaves `self` untouched and returns a changed copy; the
/// copy shares the body stream of the original.
pub trait HttpMessage: Clone {
    fn message(&self) -> &Message;

    fn message_mut(&mut self) -> &mut Message;

    /// Return the value to report for a `Host` header when none is stored,
    /// or an empty string if there is none to report.
    fn implied_host(&self) -> String {
        String::new()
    }

    /// Return the protocol version, for example `1.1`.
    fn protocol_version(&self) -> &str {
        &self.message().protocol_version
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidProtocolVersion`] unless the version has the
    /// form `major.minor`, in decimal digits.
    fn with_protocol_version<T>(
        &self,
        version: T
    ) -> Result<Self, Error>
        where T: Into<String>
    {
        let version = version.into();
        assert_valid_protocol_version(&version)?;
        let mut message = self.clone();
        message.message_mut().protocol_version = version;
        Ok(message)
    }

    /// Return the headers as they will be sent, including the implied
    /// `Host` header, if any, in front of the stored ones.
    fn headers(&self) -> Headers {
        let stored = &self.message().headers;
        let host = self.implied_host();
        if host.is_empty() || stored.has_header("host") {
            return stored.clone();
        }
        let mut headers = Headers::new();
        headers.append("Host".into(), vec![host]);
        for (name, values) in stored.iter() {
            headers.append(name.into(), values.to_vec());
        }
        headers
    }

    fn has_header<T>(
        &self,
        name: T
    ) -> bool
        where T: AsRef<str>
    {
        !self.header(name).is_empty()
    }

    /// Return the values of the header with the given name, compared
    /// without regard to case, or an empty list if there is no such header.
    fn header<T>(
        &self,
        name: T
    ) -> Vec<String>
        where T: AsRef<str>
    {
        self.message().headers.header_or_host(name, &self.implied_host())
    }

    /// Return the values of the header with the given name joined by
    /// commas, or an empty string if there is no such header.
    fn header_line<T>(
        &self,
        name: T
    ) -> String
        where T: AsRef<str>
    {
        self.header(name).join(",")
    }

    /// Return a copy with the given header replacing any with the same
    /// name, compared without regard to case.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Headers::assert_valid_header`].
    fn with_header<N, V>(
        &self,
        name: N,
        values: V,
    ) -> Result<Self, Error>
        where
            N: Into<String>,
            V: Into<HeaderValues>,
    {
        let (name, values) = Headers::assert_valid_header(name, values)?;
        let mut message = self.clone();
        message.message_mut().headers.set_header(name, values)?;
        Ok(message)
    }

    /// Return a copy with the given values added to the header of the same
    /// name, or with a new header if there is none.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Headers::assert_valid_header`].
    fn with_added_header<N, V>(
        &self,
        name: N,
        values: V,
    ) -> Result<Self, Error>
        where
            N: Into<String>,
            V: Into<HeaderValues>,
    {
        let (name, values) = Headers::assert_valid_header(name, values)?;
        let mut message = self.clone();
        message.message_mut().headers.append(name, values);
        Ok(message)
    }

    /// Return a copy without the header of the given name.  A copy is
    /// returned even if there is no such header.
    #[must_use]
    fn without_header<T>(
        &self,
        name: T
    ) -> Self
        where T: AsRef<str>
    {
        let mut message = self.clone();
        // The only possible error is that the header is missing, which
        // leaves nothing to remove.
        let _ = message.message_mut().headers.remove_header(name);
        message
    }

    fn body(&self) -> &Body {
        &self.message().body
    }

    #[must_use]
    fn with_body(
        &self,
        body: Body
    ) -> Self {
        let mut message = self.clone();
        message.message_mut().body = body;
        message
    }
}
