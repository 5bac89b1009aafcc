use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rdfo_types::{Term, Uri};

/// A single statement.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: Uri,
    pub predicate: Uri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Uri, predicate: Uri, object: impl Into<Term>) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
        }
    }
}

impl fmt::Debug for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {:?}", self.subject, self.predicate, self.object)
    }
}

/// A document-level collection of triples plus its prefix bindings.
///
/// This is the unit exchanged with the serializers: triples keep document
/// order until [`Graph::canonicalize`] is called.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Graph {
    triples: Vec<Triple>,
    prefixes: BTreeMap<String, String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefixes(prefixes: BTreeMap<String, String>) -> Self {
        Self {
            triples: Vec::new(),
            prefixes,
        }
    }

    pub fn push(&mut self, triple: Triple) {
        self.triples.push(triple);
    }

    pub fn add(&mut self, subject: Uri, predicate: Uri, object: impl Into<Term>) {
        self.triples.push(Triple::new(subject, predicate, object));
    }

    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) {
        self.triples.extend(triples);
    }

    pub fn bind_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    pub fn prefixes(&self) -> &BTreeMap<String, String> {
        &self.prefixes
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Distinct subjects in order of first appearance.
    pub fn subjects(&self) -> Vec<&Uri> {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .map(|t| &t.subject)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Sort lexicographically and drop duplicates.
    pub fn canonicalize(&mut self) {
        self.triples.sort();
        self.triples.dedup();
    }

    pub fn into_triples(self) -> Vec<Triple> {
        self.triples
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
            prefixes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdfo_types::Literal;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn subjects_in_document_order() {
        let mut g = Graph::new();
        g.add(uri("info:b"), uri("info:p"), Literal::string("1"));
        g.add(uri("info:a"), uri("info:p"), Literal::string("2"));
        g.add(uri("info:b"), uri("info:q"), uri("info:a"));
        let subjects: Vec<_> = g.subjects().into_iter().map(Uri::as_str).collect();
        assert_eq!(subjects, ["info:b", "info:a"]);
    }

    #[test]
    fn canonicalize_sorts_and_dedups() {
        let mut g = Graph::new();
        g.add(uri("info:b"), uri("info:p"), Literal::string("x"));
        g.add(uri("info:a"), uri("info:p"), Literal::string("x"));
        g.add(uri("info:b"), uri("info:p"), Literal::string("x"));
        g.canonicalize();
        assert_eq!(g.len(), 2);
        assert_eq!(g.triples()[0].subject, uri("info:a"));
    }
}
