//! Percent-encoding of URI components.  Each component has its own set of
//! characters which may appear unescaped; everything else is encoded,
//! except that a `%` already starting a valid `%XX` triplet is left alone
//! so that encoding an encoded component changes nothing.

use percent_encoding::{
    utf8_percent_encode,
    AsciiSet,
    NON_ALPHANUMERIC,
};

const UNRESERVED: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// unreserved / ":" / "@" / "&" / "=" / "+" / "$" / "," / "/" / ";"
const PATH: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'/')
    .remove(b';');

/// unreserved / sub-delims / ":" / "@" / "/" / "?"
const QUERY_OR_FRAGMENT: &AsciiSet = &UNRESERVED
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/')
    .remove(b'?');

/// unreserved / sub-delims
const USER_SET: AsciiSet = UNRESERVED
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

const USER: &AsciiSet = &USER_SET;

/// unreserved / sub-delims / ":"
const PASSWORD: &AsciiSet = &USER_SET.remove(b':');

fn starts_with_hex_pair(text: &str) -> bool {
    matches!(
        text.as_bytes(),
        [high, low, ..] if high.is_ascii_hexdigit() && low.is_ascii_hexdigit()
    )
}

fn encode(
    text: &str,
    set: &'static AsciiSet,
) -> String {
    let mut output = String::with_capacity(text.len());
    let mut segments = text.split('%');
    if let Some(first) = segments.next() {
        output.extend(utf8_percent_encode(first, set));
    }
    for segment in segments {
        if starts_with_hex_pair(segment) {
            output.push('%');
        } else {
            output.push_str("%25");
        }
        output.extend(utf8_percent_encode(segment, set));
    }
    output
}

/// Encode a path, collapsing any leading run of slashes into one.
pub fn filter_path(path: &str) -> String {
    let path = encode(path, PATH);
    if path.starts_with('/') {
        format!("/{}", path.trim_start_matches('/'))
    } else {
        path
    }
}

/// Encode user information: the user, and then the password, if any and
/// not empty, after a colon.
pub fn filter_user_info(
    user: &str,
    password: Option<&str>,
) -> String {
    let user = encode(user, USER);
    match password {
        Some(password) if !password.is_empty() => {
            format!("{}:{}", user, encode(password, PASSWORD))
        },
        _ => user,
    }
}

/// Encode a query, without any leading `?`.
pub fn filter_query(query: &str) -> String {
    encode(query.strip_prefix('?').unwrap_or(query), QUERY_OR_FRAGMENT)
}

/// Encode a fragment.  A leading `#` is kept as part of the fragment, and
/// so is encoded.
pub fn filter_fragment(fragment: &str) -> String {
    match fragment.strip_prefix('#') {
        Some(rest) => format!("%23{}", encode(rest, QUERY_OR_FRAGMENT)),
        None => encode(fragment, QUERY_OR_FRAGMENT),
    }
}
