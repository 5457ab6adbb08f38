//! Character classes and allow-lists shared by the parsers and by every
//! mutator, so that a value accepted at parse time is also accepted when
//! set programmatically, and vice versa.

use crate::error::Error;

/// These are the request methods recognized by this crate.  Methods are
/// compared without regard to case, but stored as given.
pub const METHODS: &[&str] = &[
    "CONNECT", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT",
    "TRACE",
];

/// These are the URI schemes recognized by this crate, each paired with its
/// standard port, if it has one.
pub const SCHEMES: &[(&str, Option<u16>)] = &[
    ("file", None),
    ("http", Some(80)),
    ("https", Some(443)),
    ("ws", Some(80)),
    ("wss", Some(443)),
];

/// Return whether or not the given byte is a `tchar` as defined in
/// [RFC 7230 section 3.2.6](https://tools.ietf.org/html/rfc7230#section-3.2.6).
#[must_use]
pub fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Return whether or not the given text is a non-empty sequence of `tchar`.
#[must_use]
pub fn is_token<T>(text: T) -> bool
    where T: AsRef<str>
{
    let text = text.as_ref();
    !text.is_empty() && text.bytes().all(is_tchar)
}

/// Return whether or not the given text is acceptable as a header field
/// value.  Line breaks are only permitted as part of an obsolete fold
/// (CRLF followed by a space or horizontal tab), and no control characters
/// other than horizontal tab may appear.
#[must_use]
pub fn is_field_value<T>(text: T) -> bool
    where T: AsRef<str>
{
    let bytes = text.as_ref().as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\r' => {
                if !matches!(
                    bytes.get(i + 1..i + 3),
                    Some([b'\n', b' ']) | Some([b'\n', b'\t'])
                ) {
                    return false;
                }
            },
            b'\n' => {
                if i == 0 || bytes[i - 1] != b'\r' {
                    return false;
                }
            },
            b'\t' | 0x20..=0x7E | 0x80..=0xFE => (),
            _ => return false,
        }
    }
    true
}

/// Return whether or not the given text has the form `major.minor` with
/// both parts made of decimal digits.
#[must_use]
pub fn is_protocol_version<T>(text: T) -> bool
    where T: AsRef<str>
{
    let is_digits = |part: &str| {
        !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
    };
    match text.as_ref().split_once('.') {
        Some((major, minor)) => is_digits(major) && is_digits(minor),
        None => false,
    }
}

/// Return whether or not the given method is in the allow-list, compared
/// without regard to case.
#[must_use]
pub fn is_known_method<T>(method: T) -> bool
    where T: AsRef<str>
{
    let method = method.as_ref();
    METHODS.iter().any(|known| known.eq_ignore_ascii_case(method))
}

/// Look up the standard port of a scheme.  The outer `Option` is `None` if
/// the scheme is not supported at all.
#[must_use]
pub fn scheme_port(scheme: &str) -> Option<Option<u16>> {
    SCHEMES.iter()
        .find(|(name, _)| *name == scheme)
        .map(|(_, port)| *port)
}

pub(crate) fn assert_valid_method(method: &str) -> Result<(), Error> {
    if is_known_method(method) {
        Ok(())
    } else {
        Err(Error::UnsupportedMethod(method.into()))
    }
}

pub(crate) fn assert_valid_protocol_version(version: &str) -> Result<(), Error> {
    if is_protocol_version(version) {
        Ok(())
    } else {
        Err(Error::InvalidProtocolVersion(version.into()))
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn tokens() {
        assert!(is_token("Content-Type"));
        assert!(is_token("X-Foo_Bar.baz~1!"));
        assert!(!is_token(""));
        assert!(!is_token("Bad Header"));
        assert!(!is_token("Foo:"));
        assert!(!is_token("Caf\u{e9}"));
    }

    #[test]
    fn field_values() {
        assert!(is_field_value(""));
        assert!(is_field_value("text/plain; charset=utf-8"));
        assert!(is_field_value("a\tb"));
        assert!(is_field_value("first\r\n second"));
        assert!(is_field_value("first\r\n\tsecond"));
        assert!(is_field_value("caf\u{e9}"));
        assert!(!is_field_value("first\r\nsecond"));
        assert!(!is_field_value("first\nsecond"));
        assert!(!is_field_value("first\rsecond"));
        assert!(!is_field_value("trailing\r\n"));
        assert!(!is_field_value("nul\0"));
        assert!(!is_field_value("del\x7F"));
    }

    #[test]
    fn protocol_versions() {
        assert!(is_protocol_version("1.1"));
        assert!(is_protocol_version("1.0"));
        assert!(is_protocol_version("2.0"));
        assert!(is_protocol_version("10.25"));
        assert!(!is_protocol_version("1"));
        assert!(!is_protocol_version("1."));
        assert!(!is_protocol_version(".1"));
        assert!(!is_protocol_version("1.1.1"));
        assert!(!is_protocol_version("a.b"));
    }

    #[test]
    fn methods_are_case_insensitive() {
        assert!(is_known_method("GET"));
        assert!(is_known_method("get"));
        assert!(is_known_method("Patch"));
        assert!(!is_known_method("BREW"));
        assert!(matches!(
            assert_valid_method("BREW"),
            Err(Error::UnsupportedMethod(method)) if method == "BREW"
        ));
    }

    #[test]
    fn scheme_ports() {
        assert_eq!(Some(Some(80)), scheme_port("http"));
        assert_eq!(Some(Some(443)), scheme_port("https"));
        assert_eq!(Some(None), scheme_port("file"));
        assert_eq!(None, scheme_port("gopher"));
    }

}
