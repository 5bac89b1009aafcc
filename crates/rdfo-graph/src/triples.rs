use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use rdfo_types::{vocab, IntoTerm, IntoUri, NamespaceRegistry, Term, Uri};

use crate::error::{GraphError, GraphResult};
use crate::format::RdfFormat;
use crate::graph::{Graph, Triple};

/// Prefixes every triple set starts with.
const LOCAL_PREFIXES: &[(&str, &str)] = &[
    ("rdf", vocab::RDF),
    ("rdfs", vocab::RDFS),
    ("dcterms", vocab::DCTERMS),
    ("ov", vocab::OV),
    ("ore", vocab::ORE),
];

/// The statements about one subject: a type set plus (predicate, object)
/// pairs.
///
/// `rdf:type` statements live in the type set only. Every mutator sets the
/// altered flag; the owner clears it with [`TripleSet::mark_clean`] once the
/// set has been persisted.
#[derive(Clone)]
pub struct TripleSet {
    subject: Uri,
    namespaces: BTreeMap<String, String>,
    types: BTreeSet<Uri>,
    triples: BTreeSet<(Uri, Term)>,
    altered: bool,
    registry: Arc<NamespaceRegistry>,
}

impl TripleSet {
    pub fn new(subject: Uri, registry: Arc<NamespaceRegistry>) -> Self {
        let namespaces = LOCAL_PREFIXES
            .iter()
            .map(|(p, ns)| (p.to_string(), ns.to_string()))
            .collect();
        Self {
            subject,
            namespaces,
            types: BTreeSet::new(),
            triples: BTreeSet::new(),
            altered: false,
            registry,
        }
    }

    pub fn subject(&self) -> &Uri {
        &self.subject
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    pub fn types(&self) -> &BTreeSet<Uri> {
        &self.types
    }

    /// Non-type statements as (predicate, object) pairs, sorted.
    pub fn pairs(&self) -> impl Iterator<Item = (&Uri, &Term)> {
        self.triples.iter().map(|(p, o)| (p, o))
    }

    pub fn len(&self) -> usize {
        self.types.len() + self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.triples.is_empty()
    }

    pub fn is_altered(&self) -> bool {
        self.altered
    }

    pub fn mark_clean(&mut self) {
        self.altered = false;
    }

    pub fn mark_altered(&mut self) {
        self.altered = true;
    }

    /// Bind a prefix on this set. The binding is also offered to the shared
    /// registry so shorthand using it resolves everywhere.
    pub fn add_namespace(&mut self, prefix: &str, namespace: &str) -> GraphResult<()> {
        self.registry.bind_if_absent(prefix, namespace)?;
        self.namespaces.insert(prefix.to_string(), namespace.to_string());
        self.altered = true;
        Ok(())
    }

    /// Copy bindings already known to the registry without marking the
    /// set altered.
    pub(crate) fn inherit_namespaces(&mut self, namespaces: &BTreeMap<String, String>) {
        self.namespaces
            .extend(namespaces.iter().map(|(p, ns)| (p.clone(), ns.clone())));
    }

    pub fn del_namespace(&mut self, prefix: &str) {
        self.namespaces.remove(prefix);
        self.altered = true;
    }

    pub fn add_triple(&mut self, predicate: impl IntoUri, object: impl IntoTerm) -> GraphResult<()> {
        let predicate = predicate.into_uri(&self.registry)?;
        let object = object.into_term(&self.registry)?;
        self.insert(predicate, object)
    }

    /// Remove one statement. Missing statements are ignored.
    pub fn del_triple(&mut self, predicate: impl IntoUri, object: impl IntoTerm) -> GraphResult<()> {
        let predicate = predicate.into_uri(&self.registry)?;
        let object = object.into_term(&self.registry)?;
        if predicate.as_str() == vocab::RDF_TYPE {
            if let Term::Uri(t) = &object {
                self.types.remove(t);
            }
        } else {
            self.triples.remove(&(predicate, object));
        }
        self.altered = true;
        Ok(())
    }

    /// Remove every object of `predicate`.
    pub fn del_objects(&mut self, predicate: impl IntoUri) -> GraphResult<()> {
        let predicate = predicate.into_uri(&self.registry)?;
        if predicate.as_str() == vocab::RDF_TYPE {
            self.types.clear();
        } else {
            self.triples.retain(|(p, _)| *p != predicate);
        }
        self.altered = true;
        Ok(())
    }

    /// Replace every object of `predicate` with `object`.
    pub fn set_triple(&mut self, predicate: impl IntoUri, object: impl IntoTerm) -> GraphResult<()> {
        let predicate = predicate.into_uri(&self.registry)?;
        let object = object.into_term(&self.registry)?;
        self.del_objects(&predicate)?;
        self.insert(predicate, object)
    }

    pub fn add_type(&mut self, rdf_type: impl IntoUri) -> GraphResult<()> {
        let t = rdf_type.into_uri(&self.registry)?;
        self.types.insert(t);
        self.altered = true;
        Ok(())
    }

    /// Clear every other type, then add `rdf_type`.
    pub fn set_type(&mut self, rdf_type: impl IntoUri) -> GraphResult<()> {
        let t = rdf_type.into_uri(&self.registry)?;
        self.types.clear();
        self.types.insert(t);
        self.altered = true;
        Ok(())
    }

    pub fn del_type(&mut self, rdf_type: impl IntoUri) -> GraphResult<()> {
        let t = rdf_type.into_uri(&self.registry)?;
        self.types.remove(&t);
        self.altered = true;
        Ok(())
    }

    pub fn list_objects(&self, predicate: impl IntoUri) -> GraphResult<Vec<Term>> {
        let predicate = predicate.into_uri(&self.registry)?;
        Ok(self.objects(&predicate))
    }

    /// Objects of an already-resolved predicate.
    pub fn objects(&self, predicate: &Uri) -> Vec<Term> {
        if predicate.as_str() == vocab::RDF_TYPE {
            return self.types.iter().cloned().map(Term::Uri).collect();
        }
        self.triples
            .iter()
            .filter(|(p, _)| p == predicate)
            .map(|(_, o)| o.clone())
            .collect()
    }

    /// The first object of a non-type predicate, in sort order.
    pub fn first_object(&self, predicate: &Uri) -> Option<&Term> {
        self.triples
            .iter()
            .find(|(p, _)| p == predicate)
            .map(|(_, o)| o)
    }

    pub fn triple_exists(&self, predicate: impl IntoUri, object: impl IntoTerm) -> GraphResult<bool> {
        let predicate = predicate.into_uri(&self.registry)?;
        let object = object.into_term(&self.registry)?;
        Ok(self.contains(&predicate, &object))
    }

    pub fn contains(&self, predicate: &Uri, object: &Term) -> bool {
        if predicate.as_str() == vocab::RDF_TYPE {
            return object.as_uri().is_some_and(|t| self.types.contains(t));
        }
        self.triples.contains(&(predicate.clone(), object.clone()))
    }

    /// Every statement including the type statements, in lexicographic
    /// order.
    pub fn list_triples(&self) -> Vec<Triple> {
        let rdf_type = vocab::uri(vocab::RDF_TYPE);
        let mut out: Vec<Triple> = self
            .types
            .iter()
            .map(|t| Triple::new(self.subject.clone(), rdf_type.clone(), t.clone()))
            .chain(
                self.triples
                    .iter()
                    .map(|(p, o)| Triple::new(self.subject.clone(), p.clone(), o.clone())),
            )
            .collect();
        out.sort();
        out
    }

    /// Prefix bindings written with this set: the local bindings plus any
    /// registry binding needed for a predicate or type outside them.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let mut out = self.namespaces.clone();
        let uris = self.types.iter().chain(self.triples.iter().map(|(p, _)| p));
        for uri in uris {
            let Some((ns, _)) = uri.split_local() else {
                continue;
            };
            if out.values().any(|bound| bound == ns) {
                continue;
            }
            if let Some(prefix) = self.registry.prefix_for(ns) {
                out.entry(prefix).or_insert_with(|| ns.to_string());
            }
        }
        out
    }

    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::with_prefixes(self.bindings());
        graph.extend(self.list_triples());
        graph
    }

    /// Add the statements of `graph` whose subject is this set's subject.
    pub fn merge_graph(&mut self, graph: &Graph) -> GraphResult<()> {
        let subject = self.subject.clone();
        for t in graph.iter().filter(|t| t.subject == subject) {
            self.insert(t.predicate.clone(), t.object.clone())?;
        }
        Ok(())
    }

    /// Add every (predicate, object) pair of `graph`, whatever its subject.
    pub fn absorb_graph(&mut self, graph: &Graph) -> GraphResult<()> {
        for t in graph {
            self.insert(t.predicate.clone(), t.object.clone())?;
        }
        Ok(())
    }

    pub fn serialize(&self, format: RdfFormat) -> GraphResult<String> {
        format.serialize(&self.to_graph())
    }

    /// Load the statements about `subject` from a document. The result
    /// carries the document's prefix bindings and is not marked altered.
    pub fn parse(
        subject: Uri,
        text: &str,
        format: RdfFormat,
        registry: Arc<NamespaceRegistry>,
    ) -> GraphResult<Self> {
        let graph = format.parse(text)?;
        Self::from_graph(subject, &graph, registry)
    }

    pub fn from_graph(subject: Uri, graph: &Graph, registry: Arc<NamespaceRegistry>) -> GraphResult<Self> {
        let mut set = Self::new(subject, registry);
        for (prefix, ns) in graph.prefixes() {
            set.namespaces.insert(prefix.clone(), ns.clone());
        }
        set.merge_graph(graph)?;
        set.altered = false;
        Ok(set)
    }

    fn insert(&mut self, predicate: Uri, object: Term) -> GraphResult<()> {
        if predicate.as_str() == vocab::RDF_TYPE {
            match object {
                Term::Uri(t) => {
                    self.types.insert(t);
                }
                Term::Literal(l) => return Err(GraphError::LiteralType(l.lexical)),
            }
        } else {
            self.triples.insert((predicate, object));
        }
        self.altered = true;
        Ok(())
    }
}

impl fmt::Debug for TripleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripleSet")
            .field("subject", &self.subject)
            .field("types", &self.types)
            .field("triples", &self.triples.len())
            .field("altered", &self.altered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rdfo_types::Literal;

    fn set() -> TripleSet {
        TripleSet::new(
            Uri::parse("info:local/obj1").unwrap(),
            Arc::new(NamespaceRegistry::with_defaults()),
        )
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    #[test]
    fn type_predicate_routes_to_types() {
        let mut ts = set();
        ts.add_triple("rdf:type", "foaf:Person").unwrap();
        assert!(ts.pairs().next().is_none());
        assert_eq!(ts.types().len(), 1);
        assert!(ts.triple_exists("rdf:type", "foaf:Person").unwrap());
        assert_eq!(
            ts.list_objects("rdf:type").unwrap(),
            vec![Term::Uri(Uri::parse(format!("{}Person", vocab::FOAF)).unwrap())]
        );
    }

    #[test]
    fn literal_type_is_rejected() {
        let mut ts = set();
        let err = ts.add_triple("rdf:type", Literal::string("Person")).unwrap_err();
        assert!(matches!(err, GraphError::LiteralType(_)));
    }

    #[test]
    fn deleting_missing_statement_is_noop_but_marks_altered() {
        let mut ts = set();
        ts.del_triple("dcterms:title", "nothing").unwrap();
        ts.del_type("foaf:Person").unwrap();
        assert!(ts.is_empty());
        assert!(ts.is_altered());
    }

    #[test]
    fn del_objects_removes_every_value() {
        let mut ts = set();
        ts.add_triple("dcterms:title", "one").unwrap();
        ts.add_triple("dcterms:title", "two").unwrap();
        ts.add_triple("dcterms:creator", "me").unwrap();
        ts.del_objects("dcterms:title").unwrap();
        assert!(ts.list_objects("dcterms:title").unwrap().is_empty());
        assert_eq!(ts.len(), 1);
    }

    #[test]
    fn set_triple_and_set_type_replace() {
        let mut ts = set();
        ts.add_triple("dcterms:title", "old").unwrap();
        ts.set_triple("dcterms:title", "new").unwrap();
        assert_eq!(ts.list_objects("dcterms:title").unwrap(), vec![Term::Literal(Literal::string("new"))]);

        ts.add_type("foaf:Person").unwrap();
        ts.add_type("foaf:Agent").unwrap();
        ts.set_type("foaf:Organization").unwrap();
        assert_eq!(ts.types().len(), 1);
        assert!(ts.types().contains(&vocab::uri(vocab::FOAF_ORGANIZATION)));
    }

    #[test]
    fn mark_clean_resets_flag() {
        let mut ts = set();
        assert!(!ts.is_altered());
        ts.add_triple("dcterms:title", "x").unwrap();
        assert!(ts.is_altered());
        ts.mark_clean();
        assert!(!ts.is_altered());
    }

    #[test]
    fn add_namespace_feeds_registry() {
        let mut ts = set();
        ts.add_namespace("ex", "http://example.org/terms/").unwrap();
        ts.add_triple("ex:colour", "red").unwrap();
        assert!(ts.triple_exists("http://example.org/terms/colour", "red").unwrap());
        assert!(ts.add_namespace("bad", "http://example.org/x").is_err());
        ts.del_namespace("ex");
        assert!(!ts.namespaces().contains_key("ex"));
    }

    // -----------------------------------------------------------------------
    // Graph exchange
    // -----------------------------------------------------------------------

    #[test]
    fn merge_keeps_subject_absorb_takes_all() {
        let mut g = Graph::new();
        let me = Uri::parse("info:local/obj1").unwrap();
        let other = Uri::parse("info:local/other").unwrap();
        let title = vocab::uri(vocab::DCTERMS_CREATED);
        g.add(me.clone(), title.clone(), Literal::string("a"));
        g.add(other, title.clone(), Literal::string("b"));

        let mut merged = set();
        merged.merge_graph(&g).unwrap();
        assert_eq!(merged.objects(&title).len(), 1);

        let mut absorbed = set();
        absorbed.absorb_graph(&g).unwrap();
        assert_eq!(absorbed.objects(&title).len(), 2);
    }

    #[test]
    fn bindings_add_registry_prefixes_in_use() {
        let mut ts = set();
        ts.add_triple("dc:title", "x").unwrap();
        let b = ts.bindings();
        assert_eq!(b.get("dc").map(String::as_str), Some(vocab::DC));
        assert!(!ts.namespaces().contains_key("dc"));
    }

    #[test]
    fn roundtrip_preserves_statements_and_bindings() {
        let mut ts = set();
        ts.add_namespace("ex", "http://example.org/terms/").unwrap();
        ts.add_type("foaf:Person").unwrap();
        ts.add_triple("dc:title", Literal::lang("Tittel", "nb")).unwrap();
        ts.add_triple("dcterms:created", Literal::integer(2009)).unwrap();
        ts.add_triple("ex:link", Uri::parse("http://example.org/x").unwrap()).unwrap();
        ts.add_triple("ex:note", "<b>bold</b> & more").unwrap();

        for format in [RdfFormat::RdfXml, RdfFormat::NTriples] {
            let text = ts.serialize(format).unwrap();
            let parsed = TripleSet::parse(ts.subject().clone(), &text, format, ts.registry().clone()).unwrap();
            assert_eq!(parsed.list_triples(), ts.list_triples(), "{format}");
            assert_eq!(parsed.bindings(), ts.bindings(), "{format}");
            assert!(!parsed.is_altered());
        }
    }

    fn pair() -> impl Strategy<Value = (Uri, Term)> {
        let predicate = (0u8..4).prop_map(|n| Uri::parse(format!("http://example.org/terms/p{n}")).unwrap());
        let object = prop_oneof![
            "[a-zA-Z0-9 <>&\"'.,-]{0,12}".prop_map(|s| Term::Literal(Literal::string(s))),
            (0u8..4).prop_map(|n| Term::Uri(Uri::parse(format!("info:local/o{n}")).unwrap())),
            any::<i64>().prop_map(|n| Term::Literal(Literal::integer(n))),
        ];
        (predicate, object)
    }

    proptest! {
        #[test]
        fn add_then_delete_restores(
            initial in proptest::collection::vec(pair(), 0..8),
            (p, o) in pair(),
        ) {
            let mut ts = set();
            for (ip, io) in &initial {
                ts.add_triple(ip, io).unwrap();
            }
            prop_assume!(!ts.contains(&p, &o));
            let before = ts.list_triples();
            ts.add_triple(&p, &o).unwrap();
            prop_assert!(ts.contains(&p, &o));
            ts.del_triple(&p, &o).unwrap();
            prop_assert_eq!(ts.list_triples(), before);
        }

        #[test]
        fn serialize_parse_roundtrip(pairs in proptest::collection::vec(pair(), 0..10)) {
            let mut ts = set();
            ts.add_namespace("ex", "http://example.org/terms/").unwrap();
            for (p, o) in &pairs {
                ts.add_triple(p, o).unwrap();
            }
            for format in [RdfFormat::RdfXml, RdfFormat::NTriples] {
                let text = ts.serialize(format).unwrap();
                let parsed = TripleSet::parse(ts.subject().clone(), &text, format, ts.registry().clone()).unwrap();
                prop_assert_eq!(parsed.list_triples(), ts.list_triples());
                prop_assert_eq!(parsed.bindings(), ts.bindings());
            }
        }
    }
}
