use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An absolute URI naming a subject, predicate, or resource.
///
/// A `Uri` always starts with a scheme (`http:`, `info:`, `urn:` and so on)
/// and contains no whitespace. Shorthand forms such as `dc:title` are
/// expanded by [`NamespaceRegistry`](crate::NamespaceRegistry) before a
/// `Uri` is built.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri(pub(crate) String);

impl Uri {
    /// Parse an absolute URI.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if Self::is_absolute(&s) {
            Ok(Self(s))
        } else {
            Err(TypeError::MalformedUri(s))
        }
    }

    /// Returns `true` if `s` has a URI scheme and no whitespace.
    pub fn is_absolute(s: &str) -> bool {
        let Some((scheme, _)) = s.split_once(':') else {
            return false;
        };
        let mut chars = scheme.chars();
        let scheme_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        scheme_ok && !s.chars().any(char::is_whitespace)
    }

    /// The URI text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a path segment, inserting `/` unless the URI already ends in
    /// a separator.
    pub fn join(&self, segment: impl fmt::Display) -> Uri {
        if self.0.ends_with(['/', '#', ':']) {
            Uri(format!("{}{}", self.0, segment))
        } else {
            Uri(format!("{}/{}", self.0, segment))
        }
    }

    /// Returns `true` if this URI starts with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// The remainder after `prefix`, if this URI starts with it.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Returns `true` if `self` is `parent` or a path below it.
    pub fn is_under(&self, parent: &Uri) -> bool {
        match self.0.strip_prefix(parent.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/') || parent.0.ends_with(['/', '#', ':']),
            None => false,
        }
    }

    /// Split into namespace and local name at the last `#` or `/`.
    ///
    /// Returns `None` when the local name would be empty.
    pub fn split_local(&self) -> Option<(&str, &str)> {
        let idx = self.0.rfind(['#', '/'])?;
        let (ns, local) = self.0.split_at(idx + 1);
        if local.is_empty() {
            None
        } else {
            Some((ns, local))
        }
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Uri {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.0
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
