//! This module contains the [`Uri`] type, which splits a URI into its
//! components as described in [IETF RFC 3986](https://tools.ietf.org/html/rfc3986),
//! keeps each component in normalized, percent-encoded form, and renders
//! the components back into a string.

mod filter;

use crate::{
    error::Error,
    grammar::scheme_port,
};
use filter::{
    filter_fragment,
    filter_path,
    filter_query,
    filter_user_info,
};
use std::sync::OnceLock;

fn filter_scheme(scheme: &str) -> Result<String, Error> {
    let lowered = scheme.to_ascii_lowercase();
    let scheme = lowered.strip_suffix("://")
        .or_else(|| lowered.strip_suffix(':'))
        .unwrap_or(&lowered);
    if scheme.is_empty() || scheme_port(scheme).is_some() {
        Ok(scheme.into())
    } else {
        Err(Error::UnsupportedScheme(scheme.into()))
    }
}

fn is_scheme(text: &str) -> bool {
    let mut bytes = text.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || b"+-.".contains(&b))
}

// A colon may only appear inside the brackets of an IP literal.
fn is_host(host: &str) -> bool {
    let (host, colon_allowed) = match host.strip_prefix('[') {
        Some(rest) => match rest.strip_suffix(']') {
            Some(literal) => (literal, true),
            None => return false,
        },
        None => (host, false),
    };
    !host.bytes().any(|b| {
        b.is_ascii_whitespace()
        || b.is_ascii_control()
        || (b == b':' && !colon_allowed)
        || b"/?#@[]<>\"{}|\\^`".contains(&b)
    })
}

fn parse_port(
    port: &str,
    uri: &str,
) -> Result<Option<u16>, Error> {
    if port.is_empty() {
        return Ok(None);
    }
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidUri(uri.into()));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::InvalidUri(uri.into())),
        Ok(port) => Ok(Some(port)),
    }
}

// Split `[userinfo@]host[:port]`.
fn parse_authority<'a>(
    authority: &'a str,
    uri: &str,
) -> Result<(&'a str, &'a str, Option<u16>), Error> {
    let (user_info, host_port) = match authority.rfind('@') {
        Some(delimiter) => (&authority[..delimiter], &authority[delimiter + 1..]),
        None => ("", authority),
    };
    let (host, port) = if host_port.starts_with('[') {
        let end = host_port.find(']')
            .ok_or_else(|| Error::InvalidUri(uri.into()))?;
        let rest = &host_port[end + 1..];
        let port = match rest.strip_prefix(':') {
            Some(port) => port,
            None if rest.is_empty() => "",
            None => return Err(Error::InvalidUri(uri.into())),
        };
        (&host_port[..=end], port)
    } else {
        match host_port.rfind(':') {
            Some(delimiter) => (&host_port[..delimiter], &host_port[delimiter + 1..]),
            None => (host_port, ""),
        }
    };
    let port = parse_port(port, uri)?;
    if host.is_empty() && (!user_info.is_empty() || port.is_some()) {
        return Err(Error::InvalidUri(uri.into()));
    }
    if !is_host(host) {
        return Err(Error::InvalidUri(uri.into()));
    }
    Ok((user_info, host, port))
}

/// This represents a Uniform Resource Identifier (URI), as defined in
/// [IETF RFC 3986](https://tools.ietf.org/html/rfc3986).
///
/// The scheme is restricted to the ones in [`crate::grammar::SCHEMES`].
/// Values are immutable: every `with_` method returns a new `Uri`, leaving
/// the original untouched.  The string form is computed on first use and
/// remembered until the next change.
#[derive(Default)]
pub struct Uri {
    scheme: String,
    user_info: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
    rendered: OnceLock<String>,
}

impl Uri {
    /// Parse the given string into a URI, percent-encoding any characters
    /// not allowed unescaped in their component.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidUri`] if the string cannot be split into URI
    ///   components, or has an invalid port.
    /// * [`Error::UnsupportedScheme`] if the scheme is not supported.
    pub fn parse<T>(uri_string: T) -> Result<Self, Error>
        where T: AsRef<str>
    {
        let text = uri_string.as_ref();
        if text.bytes().any(|b| b.is_ascii_control()) {
            return Err(Error::InvalidUri(text.into()));
        }
        let mut uri = Self::default();
        if text.is_empty() {
            return Ok(uri);
        }

        // Scheme
        let mut rest = text;
        if let Some(delimiter) = rest.find(':') {
            let candidate = &rest[..delimiter];
            if is_scheme(candidate) {
                uri.scheme = filter_scheme(candidate)?;
                rest = &rest[delimiter + 1..];
            }
        }

        // Fragment and query come off the end.
        if let Some(delimiter) = rest.find('#') {
            uri.fragment = filter_fragment(&rest[delimiter + 1..]);
            rest = &rest[..delimiter];
        }
        if let Some(delimiter) = rest.find('?') {
            uri.query = filter_query(&rest[delimiter + 1..]);
            rest = &rest[..delimiter];
        }

        // Authority
        if let Some(hierarchy) = rest.strip_prefix("//") {
            let end = hierarchy.find('/').unwrap_or_else(|| hierarchy.len());
            let (user_info, host, port) = parse_authority(&hierarchy[..end], text)?;
            uri.user_info = user_info.into();
            uri.host = host.to_ascii_lowercase();
            uri.port = port;
            rest = &hierarchy[end..];
        }

        uri.path = filter_path(rest);
        tracing::trace!(uri = text, "parsed URI");
        Ok(uri)
    }

    /// Return the scheme, in lower case, or an empty string if there is no
    /// scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Return the user information, in `user[:password]` form.
    #[must_use]
    pub fn user_info(&self) -> &str {
        &self.user_info
    }

    /// Return the host, in lower case.  A `file` URI without a host refers
    /// to `localhost`.
    #[must_use]
    pub fn host(&self) -> &str {
        if self.scheme == "file" && self.host.is_empty() {
            "localhost"
        } else {
            &self.host
        }
    }

    /// Return the port, unless it is the standard port of the scheme.  If
    /// there is no scheme, the port is returned as given; if there is a
    /// scheme but no host, there is no port.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        if self.scheme.is_empty() {
            return self.port;
        }
        if self.host.is_empty() {
            return None;
        }
        match (self.port, scheme_port(&self.scheme)) {
            (Some(port), Some(Some(standard))) if port == standard => None,
            (port, _) => port,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Return the query, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Return the fragment, without the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Return the authority in `[user-info@]host[:port]` form, or an empty
    /// string if there is no host.  The port is only included if it is not
    /// the standard port of the scheme.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }
        let mut authority = String::new();
        if !self.user_info.is_empty() {
            authority.push_str(&self.user_info);
            authority.push('@');
        }
        authority.push_str(&self.host);
        if let Some(port) = self.port() {
            authority.push(':');
            authority.push_str(&port.to_string());
        }
        authority
    }

    /// Return a copy with the given scheme.  The scheme is compared without
    /// regard to case, and may carry a trailing `:` or `://`.  An empty
    /// scheme removes the scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] if the scheme is not supported.
    pub fn with_scheme<T>(
        &self,
        scheme: T
    ) -> Result<Self, Error>
        where T: AsRef<str>
    {
        let scheme = filter_scheme(scheme.as_ref())?;
        let mut uri = self.clone();
        uri.scheme = scheme;
        Ok(uri)
    }

    /// Return a copy with the given user and, if not empty, password.  An
    /// empty user removes the user information.
    #[must_use]
    pub fn with_user_info(
        &self,
        user: &str,
        password: Option<&str>,
    ) -> Self {
        let mut uri = self.clone();
        uri.user_info = filter_user_info(user, password);
        uri
    }

    /// Return a copy with the given host.  An empty host removes the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] if the host contains characters which
    /// would change the meaning of the rest of the URI.
    pub fn with_host<T>(
        &self,
        host: T
    ) -> Result<Self, Error>
        where T: AsRef<str>
    {
        let host = host.as_ref();
        if !is_host(host) {
            return Err(Error::InvalidUri(host.into()));
        }
        let mut uri = self.clone();
        uri.host = host.to_ascii_lowercase();
        Ok(uri)
    }

    /// Return a copy with the given port, or with no port if `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for port zero.
    pub fn with_port(
        &self,
        port: Option<u16>
    ) -> Result<Self, Error> {
        if port == Some(0) {
            return Err(Error::InvalidPort(0));
        }
        let mut uri = self.clone();
        uri.port = port;
        Ok(uri)
    }

    /// Return a copy with the given path, percent-encoded as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the path contains `?` or `#`.
    pub fn with_path<T>(
        &self,
        path: T
    ) -> Result<Self, Error>
        where T: AsRef<str>
    {
        let path = path.as_ref();
        if path.contains(|c: char| c == '?' || c == '#') {
            return Err(Error::InvalidPath(path.into()));
        }
        let mut uri = self.clone();
        uri.path = filter_path(path);
        Ok(uri)
    }

    /// Return a copy with the given query, percent-encoded as needed.  A
    /// leading `?` is dropped.  An empty query removes the query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if the query contains `#`.
    pub fn with_query<T>(
        &self,
        query: T
    ) -> Result<Self, Error>
        where T: AsRef<str>
    {
        let query = query.as_ref();
        if query.contains('#') {
            return Err(Error::InvalidQuery(query.into()));
        }
        let mut uri = self.clone();
        uri.query = filter_query(query);
        Ok(uri)
    }

    /// Return a copy with the given fragment, percent-encoded as needed.
    /// An empty fragment removes the fragment.
    #[must_use]
    pub fn with_fragment(
        &self,
        fragment: &str
    ) -> Self {
        let mut uri = self.clone();
        uri.fragment = filter_fragment(fragment);
        uri
    }

    fn render(&self) -> String {
        let mut rendered = String::new();
        if !self.scheme.is_empty() {
            rendered.push_str(&self.scheme);
            rendered.push(':');
        }
        let authority = self.authority();
        if !authority.is_empty() {
            rendered.push_str("//");
            if !(self.scheme == "file" && authority == "localhost") {
                rendered.push_str(&authority);
            }
        }
        if !self.path.is_empty() {
            if !authority.is_empty() && !self.path.starts_with('/') {
                rendered.push('/');
            }
            rendered.push_str(&self.path);
        }
        if !self.query.is_empty() {
            rendered.push('?');
            rendered.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            rendered.push('#');
            rendered.push_str(&self.fragment);
        }
        rendered
    }

    /// Return the string form of the URI, computing it only if it hasn't
    /// been computed since the URI was made.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.rendered.get_or_init(|| self.render())
    }
}

// Copies start without a rendered string, so a change made to the copy can
// never be hidden behind a stale one.
impl Clone for Uri {
    fn clone(&self) -> Self {
        Self{
            scheme: self.scheme.clone(),
            user_info: self.user_info.clone(),
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            query: self.query.clone(),
            fragment: self.fragment.clone(),
            rendered: OnceLock::new(),
        }
    }
}

// Two URIs are equal when everything observable about them is.
impl PartialEq for Uri {
    fn eq(
        &self,
        other: &Self
    ) -> bool {
        self.scheme == other.scheme
            && self.user_info == other.user_info
            && self.host() == other.host()
            && self.port() == other.port()
            && self.path == other.path
            && self.query == other.query
            && self.fragment == other.fragment
    }
}

impl Eq for Uri {}

impl std::fmt::Debug for Uri {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>
    ) -> std::fmt::Result {
        f.debug_struct("Uri")
            .field("scheme", &self.scheme)
            .field("user_info", &self.user_info)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("fragment", &self.fragment)
            .finish()
    }
}

impl std::fmt::Display for Uri {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Uri {
    type Err = Error;

    fn from_str(uri_string: &str) -> Result<Self, Self::Err> {
        Self::parse(uri_string)
    }
}
