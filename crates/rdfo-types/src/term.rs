use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::uri::Uri;
use crate::vocab;

/// A literal value: lexical form plus an optional datatype or language tag.
///
/// Plain strings and `xsd:string` literals compare equal: the datatype is
/// normalized to `None` at construction.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Uri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Literal {
    /// A plain string literal.
    pub fn string(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        }
    }

    /// A literal with an explicit datatype.
    pub fn typed(lexical: impl Into<String>, datatype: Uri) -> Self {
        let datatype = (datatype.as_str() != vocab::XSD_STRING).then_some(datatype);
        Self {
            lexical: lexical.into(),
            datatype,
            language: None,
        }
    }

    /// A language-tagged string. The tag is lowercased.
    pub fn lang(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.into().to_ascii_lowercase()),
        }
    }

    /// An `xsd:integer` literal.
    pub fn integer(value: i64) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Some(Uri(vocab::XSD_INTEGER.to_owned())),
            language: None,
        }
    }

    /// An `xsd:dateTime` literal in RFC 3339 form with a `Z` suffix.
    pub fn datetime(value: DateTime<Utc>) -> Self {
        Self {
            lexical: value.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            datatype: Some(Uri(vocab::XSD_DATETIME.to_owned())),
            language: None,
        }
    }

    /// Interpret the lexical form as a UTC timestamp.
    ///
    /// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (or with a space
    /// separator) taken as UTC, and a bare date taken as midnight UTC.
    pub fn as_datetime(&self) -> Result<DateTime<Utc>, TypeError> {
        let s = self.lexical.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| TypeError::InvalidDateTime(self.lexical.clone()))
    }

    /// Interpret the lexical form as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.lexical.trim().parse().ok()
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.lexical)?;
        if let Some(lang) = &self.language {
            write!(f, "@{lang}")?;
        }
        if let Some(dt) = &self.datatype {
            write!(f, "^^{dt:?}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical)
    }
}

/// The object of a triple.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Uri(Uri),
    Literal(Literal),
}

impl Term {
    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Term::Uri(u) => Some(u),
            Term::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            Term::Uri(_) => None,
        }
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, Term::Uri(_))
    }

    /// The term as a timestamp, if it is a literal holding one.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.as_literal().and_then(|l| l.as_datetime().ok())
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{u:?}"),
            Term::Literal(l) => write!(f, "{l:?}"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{u}"),
            Term::Literal(l) => write!(f, "{l}"),
        }
    }
}

impl From<Uri> for Term {
    fn from(uri: Uri) -> Self {
        Term::Uri(uri)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}
