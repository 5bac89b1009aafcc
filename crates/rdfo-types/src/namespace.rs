use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::{TypeError, TypeResult};
use crate::term::{Literal, Term};
use crate::uri::Uri;
use crate::vocab;

/// Schemes that are always read as URIs, even when a prefix of the same
/// name is bound.
const URI_SCHEMES: &[&str] = &["http", "https", "urn", "info", "ftp", "file", "mailto", "tag"];

/// Shared prefix table used to expand `prefix:local` shorthand.
///
/// A registry is created once per store and handed to every component as an
/// `Arc<NamespaceRegistry>`. Bindings can be added at runtime; components see
/// them immediately.
#[derive(Debug)]
pub struct NamespaceRegistry {
    bindings: RwLock<BTreeMap<String, String>>,
}

impl NamespaceRegistry {
    /// A registry seeded with the common RDF vocabularies.
    pub fn with_defaults() -> Self {
        let bindings = vocab::DEFAULT_PREFIXES
            .iter()
            .map(|(p, ns)| (p.to_string(), ns.to_string()))
            .collect();
        Self {
            bindings: RwLock::new(bindings),
        }
    }

    /// A registry with no bindings.
    pub fn empty() -> Self {
        Self {
            bindings: RwLock::new(BTreeMap::new()),
        }
    }

    /// Bind `prefix` to `namespace`, replacing any previous binding.
    pub fn bind(&self, prefix: &str, namespace: &str) -> TypeResult<()> {
        validate_namespace(namespace)?;
        self.bindings
            .write()
            .expect("lock poisoned")
            .insert(prefix.to_string(), namespace.to_string());
        Ok(())
    }

    /// Bind `prefix` unless it is already bound. Returns `true` if bound now.
    pub fn bind_if_absent(&self, prefix: &str, namespace: &str) -> TypeResult<bool> {
        validate_namespace(namespace)?;
        let mut map = self.bindings.write().expect("lock poisoned");
        if map.contains_key(prefix) {
            return Ok(false);
        }
        map.insert(prefix.to_string(), namespace.to_string());
        Ok(true)
    }

    /// Remove a binding. Unknown prefixes are ignored.
    pub fn unbind(&self, prefix: &str) -> Option<String> {
        self.bindings.write().expect("lock poisoned").remove(prefix)
    }

    /// The namespace bound to `prefix`.
    pub fn resolve(&self, prefix: &str) -> Option<String> {
        self.bindings.read().expect("lock poisoned").get(prefix).cloned()
    }

    /// A snapshot of every binding.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        self.bindings.read().expect("lock poisoned").clone()
    }

    /// The prefix bound to exactly `namespace`, if any.
    pub fn prefix_for(&self, namespace: &str) -> Option<String> {
        self.bindings
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|(_, ns)| ns.as_str() == namespace)
            .map(|(p, _)| p.clone())
    }

    /// Expand `prefix:local` shorthand.
    pub fn expand(&self, shorthand: &str) -> TypeResult<Uri> {
        let (prefix, local) =
            split_shorthand(shorthand).ok_or_else(|| TypeError::MalformedUri(shorthand.into()))?;
        let ns = self
            .resolve(prefix)
            .ok_or_else(|| TypeError::UnknownPrefix(prefix.to_string()))?;
        Uri::parse(format!("{ns}{local}"))
    }

    /// Shorten `uri` to `prefix:local` using the longest matching namespace.
    pub fn compact(&self, uri: &Uri) -> Option<String> {
        let map = self.bindings.read().expect("lock poisoned");
        map.iter()
            .filter_map(|(p, ns)| {
                let local = uri.strip_prefix(ns)?;
                let plain = !local.is_empty() && !local.contains(['/', '#', ':']);
                plain.then_some((ns.len(), p, local))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, p, local)| format!("{p}:{local}"))
    }

    /// Read `s` as a URI: an absolute URI with a well-known scheme, bound
    /// shorthand, or any other absolute URI.
    pub fn parse_uri(&self, s: &str) -> TypeResult<Uri> {
        let s = s.trim();
        if has_known_scheme(s) {
            return Uri::parse(s);
        }
        if let Some((prefix, _)) = split_shorthand(s) {
            if self.resolve(prefix).is_some() {
                return self.expand(s);
            }
        }
        Uri::parse(s)
    }

    /// Read `s` as a term: a URI when it looks like one, otherwise a plain
    /// string literal.
    pub fn parse_term(&self, s: &str) -> Term {
        let trimmed = s.trim();
        if has_known_scheme(trimmed) && !trimmed.chars().any(char::is_whitespace) {
            if let Ok(uri) = Uri::parse(trimmed) {
                return Term::Uri(uri);
            }
        }
        if let Some((prefix, _)) = split_shorthand(trimmed) {
            if self.resolve(prefix).is_some() {
                if let Ok(uri) = self.expand(trimmed) {
                    return Term::Uri(uri);
                }
            }
        }
        Term::Literal(Literal::string(s))
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn validate_namespace(namespace: &str) -> TypeResult<()> {
    if !namespace.ends_with(['/', '#']) {
        return Err(TypeError::NotANamespace(namespace.to_string()));
    }
    if !Uri::is_absolute(namespace) {
        return Err(TypeError::MalformedUri(namespace.to_string()));
    }
    Ok(())
}

fn has_known_scheme(s: &str) -> bool {
    s.split_once(':')
        .is_some_and(|(scheme, _)| URI_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()))
}

/// `prefix:local` with exactly one colon and no whitespace.
fn split_shorthand(s: &str) -> Option<(&str, &str)> {
    let (prefix, local) = s.split_once(':')?;
    let valid = |part: &str| {
        !part.is_empty() && !part.contains(':') && !part.chars().any(char::is_whitespace)
    };
    (valid(prefix) && valid(local)).then_some((prefix, local))
}

/// Conversion into a [`Uri`], resolving shorthand against a registry.
pub trait IntoUri {
    fn into_uri(self, namespaces: &NamespaceRegistry) -> TypeResult<Uri>;
}

impl IntoUri for &str {
    fn into_uri(self, namespaces: &NamespaceRegistry) -> TypeResult<Uri> {
        namespaces.parse_uri(self)
    }
}

impl IntoUri for String {
    fn into_uri(self, namespaces: &NamespaceRegistry) -> TypeResult<Uri> {
        namespaces.parse_uri(&self)
    }
}

impl IntoUri for &String {
    fn into_uri(self, namespaces: &NamespaceRegistry) -> TypeResult<Uri> {
        namespaces.parse_uri(self)
    }
}

impl IntoUri for Uri {
    fn into_uri(self, _: &NamespaceRegistry) -> TypeResult<Uri> {
        Ok(self)
    }
}

impl IntoUri for &Uri {
    fn into_uri(self, _: &NamespaceRegistry) -> TypeResult<Uri> {
        Ok(self.clone())
    }
}

/// Conversion into a [`Term`], resolving shorthand against a registry.
pub trait IntoTerm {
    fn into_term(self, namespaces: &NamespaceRegistry) -> TypeResult<Term>;
}

impl IntoTerm for &str {
    fn into_term(self, namespaces: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(namespaces.parse_term(self))
    }
}

impl IntoTerm for String {
    fn into_term(self, namespaces: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(namespaces.parse_term(&self))
    }
}

impl IntoTerm for &String {
    fn into_term(self, namespaces: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(namespaces.parse_term(self))
    }
}

impl IntoTerm for Uri {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(Term::Uri(self))
    }
}

impl IntoTerm for &Uri {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(Term::Uri(self.clone()))
    }
}

impl IntoTerm for Literal {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(Term::Literal(self))
    }
}

impl IntoTerm for Term {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(self)
    }
}

impl IntoTerm for &Term {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(self.clone())
    }
}

impl IntoTerm for DateTime<Utc> {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(Term::Literal(Literal::datetime(self)))
    }
}

impl IntoTerm for i64 {
    fn into_term(self, _: &NamespaceRegistry) -> TypeResult<Term> {
        Ok(Term::Literal(Literal::integer(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_common_vocabularies() {
        let ns = NamespaceRegistry::with_defaults();
        assert_eq!(ns.resolve("dcterms").as_deref(), Some(vocab::DCTERMS));
        assert_eq!(ns.resolve("ore").as_deref(), Some(vocab::ORE));
        assert!(NamespaceRegistry::empty().bindings().is_empty());
    }

    #[test]
    fn expand_shorthand() {
        let ns = NamespaceRegistry::with_defaults();
        let uri = ns.expand("dcterms:created").unwrap();
        assert_eq!(uri.as_str(), vocab::DCTERMS_CREATED);
        assert!(matches!(ns.expand("nope:x"), Err(TypeError::UnknownPrefix(p)) if p == "nope"));
    }

    #[test]
    fn bind_requires_namespace_terminator() {
        let ns = NamespaceRegistry::empty();
        assert!(matches!(
            ns.bind("ex", "http://example.org/terms"),
            Err(TypeError::NotANamespace(_))
        ));
        ns.bind("ex", "http://example.org/terms/").unwrap();
        assert!(!ns.bind_if_absent("ex", "http://other.org/").unwrap());
        assert_eq!(ns.resolve("ex").as_deref(), Some("http://example.org/terms/"));
        assert_eq!(ns.unbind("ex").as_deref(), Some("http://example.org/terms/"));
        assert_eq!(ns.unbind("ex"), None);
    }

    #[test]
    fn parse_uri_prefers_schemes_then_shorthand() {
        let ns = NamespaceRegistry::with_defaults();
        assert_eq!(ns.parse_uri("http://x.org/a").unwrap().as_str(), "http://x.org/a");
        assert_eq!(ns.parse_uri("dc:title").unwrap().as_str(), "http://purl.org/dc/elements/1.1/title");
        assert_eq!(ns.parse_uri("info:local/x").unwrap().as_str(), "info:local/x");
        assert!(ns.parse_uri("just words").is_err());
    }

    #[test]
    fn parse_term_falls_back_to_literal() {
        let ns = NamespaceRegistry::with_defaults();
        assert!(ns.parse_term("foaf:Person").is_uri());
        assert!(ns.parse_term("https://example.org/").is_uri());
        let t = ns.parse_term("Time: 10:30");
        assert_eq!(t, Term::Literal(Literal::string("Time: 10:30")));
        assert!(!ns.parse_term("unknown:thing").is_uri());
    }

    #[test]
    fn compact_uses_longest_namespace() {
        let ns = NamespaceRegistry::with_defaults();
        ns.bind("dcx", "http://purl.org/dc/").unwrap();
        let uri = Uri::parse(vocab::DCTERMS_MODIFIED).unwrap();
        assert_eq!(ns.compact(&uri).as_deref(), Some("dcterms:modified"));
        let other = Uri::parse("http://unbound.org/x").unwrap();
        assert_eq!(ns.compact(&other), None);
    }

    #[test]
    fn into_term_conversions() {
        let ns = NamespaceRegistry::with_defaults();
        assert_eq!(42i64.into_term(&ns).unwrap(), Term::Literal(Literal::integer(42)));
        let uri = Uri::parse("info:a").unwrap();
        assert_eq!((&uri).into_term(&ns).unwrap(), Term::Uri(uri.clone()));
        assert_eq!("rdf:type".into_uri(&ns).unwrap().as_str(), vocab::RDF_TYPE);
    }
}
