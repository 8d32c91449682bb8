use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use base64::{engine::general_purpose::STANDARD, Engine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    Empty,
    BadDataUri,
}

impl Display for SchemeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemeError::Empty => write!(f, "Empty URI"),
            SchemeError::BadDataUri => write!(f, "Bad data URI"),
        }
    }
}

impl Error for SchemeError {}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scheme<'a> {
    // Data uri with optional mime type
    Data(Option<&'a str>, Vec<u8>),
    // Relative to the document
    Relative(&'a str),
    // Full URL or host-absolute path, passed to the fetcher as is
    Absolute(&'a str),
}

fn has_scheme(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once("://") else {
        return false;
    };
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl<'a> TryFrom<&'a str> for Scheme<'a> {
    type Error = SchemeError;

    fn try_from(uri: &'a str) -> Result<Self, Self::Error> {
        if uri.is_empty() {
            return Err(SchemeError::Empty);
        }
        let is_data = uri
            .as_bytes()
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"data:"));
        if is_data {
            // Data URI: rfc2397. The prefix is ASCII, so byte 5 is a char boundary.
            let content = &uri[5..];
            let Some((param, value)) = content.split_once(',') else {
                return Err(SchemeError::BadDataUri);
            };
            let (mime, base64) = match param.rsplit_once(';') {
                Some((mime, encoding)) if encoding.eq_ignore_ascii_case("base64") => (mime, true),
                _ => (param, false),
            };
            // In standard the default mime is text/plain;charset=US-ASCII,
            // but that never describes a buffer or image, so pass None here.
            let mime = (!mime.is_empty()).then_some(mime);
            if base64 {
                let data = STANDARD
                    .decode(value)
                    .map_err(|_| SchemeError::BadDataUri)?;
                Ok(Scheme::Data(mime, data))
            } else {
                Ok(Scheme::Data(mime, Vec::from(value.as_bytes())))
            }
        } else if has_scheme(uri)
            || uri.starts_with("//")
            || uri.starts_with('/')
            || uri.starts_with("blob:")
        {
            Ok(Scheme::Absolute(uri))
        } else {
            Ok(Scheme::Relative(uri))
        }
    }
}

impl<'a> Scheme<'a> {
    /// Location to hand to the fetcher, or `None` for inline data.
    pub(crate) fn location(&self, base: &str) -> Option<String> {
        match self {
            Scheme::Data(_, _) => None,
            Scheme::Absolute(uri) => Some(uri.to_string()),
            Scheme::Relative(path) => {
                if base.is_empty() {
                    Some(path.to_string())
                } else if base.ends_with('/') {
                    Some(format!("{}{}", base, path))
                } else {
                    Some(format!("{}/{}", base, path))
                }
            }
        }
    }
}
