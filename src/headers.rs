use crate::{
    error::Error,
    grammar::{
        is_field_value,
        is_token,
    },
};
use std::collections::HashMap;

/// This holds the values given for one header.  Anything which converts
/// into it may be used wherever header values are accepted: a single
/// string or number becomes a single value, and a list of strings becomes
/// a list of values.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HeaderValues(Vec<String>);

impl HeaderValues {
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        Self(vec![value.into()])
    }
}

impl From<String> for HeaderValues {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<&String> for HeaderValues {
    fn from(value: &String) -> Self {
        Self(vec![value.clone()])
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<Vec<&str>> for HeaderValues {
    fn from(values: Vec<&str>) -> Self {
        Self(values.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for HeaderValues {
    fn from(values: &[&str]) -> Self {
        Self(values.iter().map(|&value| value.into()).collect())
    }
}

impl From<&[String]> for HeaderValues {
    fn from(values: &[String]) -> Self {
        Self(values.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for HeaderValues {
    fn from(values: [&str; N]) -> Self {
        Self(values.iter().map(|&value| value.into()).collect())
    }
}

macro_rules! header_values_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HeaderValues {
                fn from(value: $t) -> Self {
                    Self(vec![value.to_string()])
                }
            }
        )*
    };
}

header_values_from_number!(i32, i64, u16, u32, u64, usize);

fn normalize<T>(name: T) -> String
    where T: AsRef<str>
{
    name.as_ref().to_ascii_lowercase()
}

/// This is the collection of headers of an HTTP message.  Names are
/// compared without regard to case, but each name keeps the case it was
/// first given in.  Each header has one or more values, kept in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Headers {
    // normalized name -> name as given
    names: HashMap<String, String>,
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from name/value pairs, validating every name and
    /// value.  Pairs whose names differ only in case are merged under the
    /// first spelling, in order.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Headers::assert_valid_header`].
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self, Error>
        where
            I: IntoIterator<Item = (N, V)>,
            N: Into<String>,
            V: Into<HeaderValues>,
    {
        let mut headers = Self::new();
        for (name, values) in pairs {
            let (name, values) = Self::assert_valid_header(name, values)?;
            headers.append(name, values);
        }
        Ok(headers)
    }

    /// Check that the given name is a token and that there is at least one
    /// value, each of which satisfies the field-value grammar.  On success,
    /// the name and values are handed back in their canonical form.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidHeaderName`] if the name isn't a token.
    /// * [`Error::NoHeaderValues`] if there are no values.
    /// * [`Error::InvalidHeaderValue`] for the first value that isn't valid.
    pub fn assert_valid_header<N, V>(
        name: N,
        values: V,
    ) -> Result<(String, Vec<String>), Error>
        where
            N: Into<String>,
            V: Into<HeaderValues>,
    {
        let name = name.into();
        if !is_token(&name) {
            return Err(Error::InvalidHeaderName(name));
        }
        let values = values.into().into_vec();
        if values.is_empty() {
            return Err(Error::NoHeaderValues(name));
        }
        if let Some(value) = values.iter().find(|value| !is_field_value(value)) {
            return Err(Error::InvalidHeaderValue{
                value: value.clone(),
                name,
            });
        }
        Ok((name, values))
    }

    // Add already-validated values, to the existing header if there is one
    // with the same normalized name, or as a new header otherwise.
    pub(crate) fn append(
        &mut self,
        name: String,
        mut values: Vec<String>,
    ) {
        let key = normalize(&name);
        let position = self.names.get(&key)
            .and_then(|stored| self.position(stored));
        if let Some(position) = position {
            self.entries[position].1.append(&mut values);
        } else {
            self.names.insert(key, name.clone());
            self.entries.push((name, values));
        }
    }

    fn position(
        &self,
        stored_name: &str
    ) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == stored_name)
    }

    #[must_use]
    pub fn has_header<T>(
        &self,
        name: T
    ) -> bool
        where T: AsRef<str>
    {
        self.names.contains_key(&normalize(name))
    }

    /// Return the values of the header with the given name, compared
    /// without regard to case, or an empty list if there is no such header.
    #[must_use]
    pub fn header<T>(
        &self,
        name: T
    ) -> &[String]
        where T: AsRef<str>
    {
        self.names.get(&normalize(name))
            .and_then(|stored| self.position(stored))
            .map_or(&[][..], |position| self.entries[position].1.as_slice())
    }

    /// Return the values of the header with the given name, like
    /// [`Headers::header`], except that when there is no `Host` header and
    /// `host` is not empty, asking for `Host` yields `host` as its value.
    #[must_use]
    pub fn header_or_host<T>(
        &self,
        name: T,
        host: &str,
    ) -> Vec<String>
        where T: AsRef<str>
    {
        let name = name.as_ref();
        if !self.has_header(name) && normalize(name) == "host" && !host.is_empty() {
            return vec![host.into()];
        }
        self.header(name).to_vec()
    }

    /// Append the given values to the existing header of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] if there is no header of the given
    /// name, or any error from [`Headers::assert_valid_header`].
    pub fn add_header<N, V>(
        &mut self,
        name: N,
        values: V,
    ) -> Result<(), Error>
        where
            N: Into<String>,
            V: Into<HeaderValues>,
    {
        let (name, values) = Self::assert_valid_header(name, values)?;
        if !self.has_header(&name) {
            return Err(Error::MissingHeader(name));
        }
        self.append(name, values);
        Ok(())
    }

    /// Replace any header with the same normalized name by one with the
    /// given name and values.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Headers::assert_valid_header`].
    pub fn set_header<N, V>(
        &mut self,
        name: N,
        values: V,
    ) -> Result<(), Error>
        where
            N: Into<String>,
            V: Into<HeaderValues>,
    {
        let (name, values) = Self::assert_valid_header(name, values)?;
        if self.has_header(&name) {
            self.remove_header(&name)?;
        }
        self.append(name, values);
        Ok(())
    }

    /// Remove the header with the given name, compared without regard to
    /// case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] if there is no such header.
    pub fn remove_header<T>(
        &mut self,
        name: T
    ) -> Result<(), Error>
        where T: AsRef<str>
    {
        let name = name.as_ref();
        let stored = self.names.remove(&normalize(name))
            .ok_or_else(|| Error::MissingHeader(name.into()))?;
        self.entries.retain(|(entry_name, _)| *entry_name != stored);
        Ok(())
    }

    /// Iterate the headers in order, each as its name (in the case it was
    /// given) and its values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Add a `content-type` header with the given value, unless the headers
/// already have a content type.
///
/// # Errors
///
/// Returns any error from [`Headers::assert_valid_header`] for the given
/// content type.
pub fn inject_content_type(
    content_type: &str,
    mut headers: Headers,
) -> Result<Headers, Error> {
    if !headers.has_header("content-type") {
        headers.set_header("content-type", content_type)?;
    }
    Ok(headers)
}
