use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rdfo_graph::{Graph, Manifest, NamedGraph, RdfFormat, TripleSet, Validity, ValidityOutcome};
use rdfo_types::{vocab, IntoTerm, IntoUri, Literal, NamespaceRegistry, Term, Uri};

use crate::error::{EntityError, EntityResult};

/// Mimetype recorded for every RDF part written by this crate.
pub const RDF_XML: &str = "application/rdf+xml";

/// An entity's in-memory state: one root description, one manifest, and
/// the named graphs the entity aggregates.
///
/// Statements about the entity itself go to the root; statements about
/// anything else go to the manifest, one item per subject.
pub struct Entity {
    uri: Uri,
    root: TripleSet,
    manifest: Manifest,
    graphs: BTreeMap<Uri, NamedGraph>,
    registry: Arc<NamespaceRegistry>,
}

impl Entity {
    pub fn new(uri: Uri, registry: Arc<NamespaceRegistry>) -> Self {
        Self {
            root: TripleSet::new(uri.clone(), registry.clone()),
            manifest: Manifest::new(registry.clone()),
            graphs: BTreeMap::new(),
            uri,
            registry,
        }
    }

    /// Replace all state, as after loading from a store.
    pub(crate) fn reset(&mut self, root: TripleSet, manifest: Manifest, graphs: BTreeMap<Uri, NamedGraph>) {
        self.root = root;
        self.manifest = manifest;
        self.graphs = graphs;
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn root(&self) -> &TripleSet {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut TripleSet {
        &mut self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub(crate) fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    pub fn types(&self) -> &BTreeSet<Uri> {
        self.root.types()
    }

    /// Root, manifest or any named graph changed since the last persist.
    pub fn is_altered(&self) -> bool {
        self.root.is_altered() || self.manifest.is_altered() || self.graphs.values().any(|g| g.is_altered())
    }

    /// `{entity_uri}/{part_id}`.
    pub fn part_uri(&self, part_id: &str) -> Uri {
        self.uri.join(part_id)
    }

    /// Part id of a URI directly below the entity, if it is one.
    pub fn part_id_of<'a>(&self, uri: &'a Uri) -> Option<&'a str> {
        uri.strip_prefix(self.uri.as_str())?
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }

    // -- Metadata ------------------------------------------------------------

    /// Bind `prefix` to `namespace`, replacing any earlier binding, so
    /// later shorthand using it expands to the new namespace.
    pub fn add_namespace(&mut self, prefix: &str, namespace: &str) -> EntityResult<()> {
        self.registry.bind(prefix, namespace)?;
        self.root.add_namespace(prefix, namespace)?;
        self.manifest.add_namespace(prefix, namespace)?;
        for graph in self.graphs.values_mut() {
            graph.add_namespace(prefix, namespace)?;
        }
        Ok(())
    }

    pub fn del_namespace(&mut self, prefix: &str) {
        self.root.del_namespace(prefix);
        self.manifest.del_namespace(prefix);
    }

    /// Add a statement to the root when `subject` is the entity, otherwise
    /// to the manifest item for `subject` (created on demand).
    pub fn add_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> EntityResult<()> {
        let subject = subject.into_uri(&self.registry)?;
        if subject == self.uri {
            self.root.add_triple(predicate, object)?;
        } else {
            self.manifest.add_triple(subject, predicate, object, true)?;
        }
        Ok(())
    }

    /// Fails with `ItemNotFound` when `subject` is neither the entity nor a
    /// manifest item.
    pub fn del_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> EntityResult<()> {
        let subject = subject.into_uri(&self.registry)?;
        if subject == self.uri {
            self.root.del_triple(predicate, object)?;
        } else {
            self.manifest.del_triple(subject, predicate, object)?;
        }
        Ok(())
    }

    /// Remove every object of `predicate` on `subject`. Unknown subjects are
    /// ignored.
    pub fn del_objects(&mut self, subject: impl IntoUri, predicate: impl IntoUri) -> EntityResult<()> {
        let subject = subject.into_uri(&self.registry)?;
        if subject == self.uri {
            self.root.del_objects(predicate)?;
        } else if self.manifest.contains(&subject) {
            self.manifest.del_objects(subject, predicate)?;
        }
        Ok(())
    }

    pub fn add_type(&mut self, rdf_type: impl IntoUri) -> EntityResult<()> {
        Ok(self.root.add_type(rdf_type)?)
    }

    pub fn set_type(&mut self, rdf_type: impl IntoUri) -> EntityResult<()> {
        Ok(self.root.set_type(rdf_type)?)
    }

    pub fn del_type(&mut self, rdf_type: impl IntoUri) -> EntityResult<()> {
        Ok(self.root.del_type(rdf_type)?)
    }

    /// Objects of `ore:aggregates` on the root.
    pub fn list_aggregates(&self) -> Vec<Term> {
        self.root.objects(&vocab::uri(vocab::ORE_AGGREGATES))
    }

    /// Root and manifest merged into one graph.
    pub fn to_graph(&self) -> Graph {
        let mut graph = self.root.to_graph();
        let manifest = self.manifest.to_graph();
        for (prefix, ns) in manifest.prefixes() {
            graph.bind_prefix(prefix.clone(), ns.clone());
        }
        graph.extend(manifest.into_triples());
        graph
    }

    pub fn serialize(&self, format: RdfFormat) -> EntityResult<String> {
        Ok(format.serialize(&self.to_graph())?)
    }

    // -- Named graphs --------------------------------------------------------

    pub fn named_graph_uri(&self, graph_id: &str) -> Uri {
        self.part_uri(graph_id)
    }

    pub fn named_graphs(&self) -> impl Iterator<Item = &NamedGraph> {
        self.graphs.values()
    }

    pub fn named_graph_uris(&self) -> Vec<Uri> {
        self.graphs.keys().cloned().collect()
    }

    pub fn has_named_graph(&self, uri: &Uri) -> bool {
        self.graphs.contains_key(uri)
    }

    pub fn get_named_graph(&self, graph_id: &str) -> EntityResult<&NamedGraph> {
        let uri = self.named_graph_uri(graph_id);
        self.graphs.get(&uri).ok_or(EntityError::NamedGraphNotFound(uri))
    }

    pub fn named_graph_mut(&mut self, graph_id: &str) -> EntityResult<&mut NamedGraph> {
        let uri = self.named_graph_uri(graph_id);
        self.graph_by_uri_mut(&uri)
    }

    pub(crate) fn graph_by_uri_mut(&mut self, uri: &Uri) -> EntityResult<&mut NamedGraph> {
        self.graphs
            .get_mut(uri)
            .ok_or_else(|| EntityError::NamedGraphNotFound(uri.clone()))
    }

    pub(crate) fn insert_named_graph(&mut self, graph: NamedGraph) -> &mut NamedGraph {
        let uri = graph.uri().clone();
        self.graphs.entry(uri).or_insert(graph)
    }

    pub(crate) fn remove_named_graph(&mut self, uri: &Uri) -> EntityResult<NamedGraph> {
        self.graphs
            .remove(uri)
            .ok_or_else(|| EntityError::NamedGraphNotFound(uri.clone()))
    }

    /// Create a named graph below the entity and describe it in the
    /// manifest. Returns the existing graph if `graph_id` is already used.
    pub fn add_named_graph(
        &mut self,
        graph_id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    ) -> EntityResult<&mut NamedGraph> {
        let uri = self.named_graph_uri(graph_id);
        if !self.graphs.contains_key(&uri) {
            let validity = Validity::new(valid_from, valid_until)?;
            for (s, p, o) in named_graph_triples(&self.uri, &uri, validity, Utc::now()) {
                self.add_triple(s, p, o)?;
            }
            let graph = NamedGraph::new(uri.clone(), validity, self.registry.clone());
            self.graphs.insert(uri.clone(), graph);
        }
        self.graph_by_uri_mut(&uri)
    }

    /// Drop a named graph with its manifest entry and aggregation link.
    pub fn del_named_graph(&mut self, graph_id: &str) -> EntityResult<NamedGraph> {
        let uri = self.named_graph_uri(graph_id);
        let graph = self.remove_named_graph(&uri)?;
        self.root.del_triple(vocab::ORE_AGGREGATES, &uri)?;
        if self.manifest.contains(&uri) {
            self.manifest.del_item(&uri)?;
        }
        Ok(graph)
    }

    /// Validity window recorded in the manifest for `graph_uri`.
    pub fn graph_validity(&self, graph_uri: &Uri) -> EntityResult<Validity> {
        let item = self.manifest.get_item(graph_uri)?;
        Ok(Validity::from_triples(item))
    }

    /// Whether a named graph of this entity holds at `at`.
    pub fn is_graph_valid(&self, graph_uri: impl IntoUri, at: DateTime<Utc>) -> EntityResult<ValidityOutcome> {
        let uri = graph_uri.into_uri(&self.registry)?;
        if !self.graphs.contains_key(&uri) {
            return Err(EntityError::NamedGraphNotFound(uri));
        }
        Ok(self.graph_validity(&uri)?.check(at))
    }

    /// Named graphs valid at `at`, in URI order.
    pub fn valid_graphs_at(&self, at: DateTime<Utc>) -> Vec<&NamedGraph> {
        self.graphs
            .values()
            .filter(|g| {
                self.graph_validity(g.uri())
                    .map(|v| v.check(at).is_valid())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Root statements merged with every named graph valid at `at`.
    pub fn assertions_at(&self, at: DateTime<Utc>) -> Graph {
        let mut graph = self.root.to_graph();
        for named in self.valid_graphs_at(at) {
            let body = named.to_graph();
            for (prefix, ns) in body.prefixes() {
                graph.bind_prefix(prefix.clone(), ns.clone());
            }
            graph.extend(body.into_triples());
        }
        graph
    }
}

/// Statements describing a new named graph: its type, format, topic,
/// creation time, validity window and the aggregation links both ways.
pub(crate) fn named_graph_triples(
    entity: &Uri,
    graph: &Uri,
    validity: Validity,
    created: DateTime<Utc>,
) -> Vec<(Uri, Uri, Term)> {
    let u = vocab::uri;
    let mut out = vec![
        (graph.clone(), u(vocab::RDF_TYPE), Term::Uri(u(vocab::RDFG_GRAPH))),
        (graph.clone(), u(vocab::DC_FORMAT), Term::Literal(Literal::string(RDF_XML))),
        (graph.clone(), u(vocab::FOAF_PRIMARY_TOPIC), Term::Uri(entity.clone())),
        (graph.clone(), u(vocab::DCTERMS_CREATED), Term::Literal(Literal::datetime(created))),
    ];
    if let Some(from) = validity.from() {
        out.push((graph.clone(), u(vocab::OV_VALID_FROM), Term::Literal(Literal::datetime(from))));
    }
    if let Some(until) = validity.until() {
        out.push((graph.clone(), u(vocab::OV_VALID_UNTIL), Term::Literal(Literal::datetime(until))));
    }
    out.push((entity.clone(), u(vocab::ORE_AGGREGATES), Term::Uri(graph.clone())));
    out.push((graph.clone(), u(vocab::DCTERMS_IS_PART_OF), Term::Uri(entity.clone())));
    out
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("uri", &self.uri)
            .field("root_triples", &self.root.len())
            .field("manifest_items", &self.manifest.len())
            .field("named_graphs", &self.graphs.len())
            .field("altered", &self.is_altered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entity() -> Entity {
        Entity::new(
            Uri::parse("info:local/e1").unwrap(),
            Arc::new(NamespaceRegistry::with_defaults()),
        )
    }

    fn t(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn triples_route_by_subject() {
        let mut e = entity();
        e.add_triple("info:local/e1", "dcterms:title", "Entity one").unwrap();
        e.add_triple("info:local/e1/a.txt", "dc:format", "text/plain").unwrap();
        assert_eq!(e.root().len(), 1);
        assert!(e.manifest().contains(&Uri::parse("info:local/e1/a.txt").unwrap()));

        e.del_triple("info:local/e1", "dcterms:title", "Entity one").unwrap();
        assert!(e.root().is_empty());
        assert!(e.del_triple("info:local/other", "dc:format", "x").is_err());
        e.del_objects("info:local/other", "dc:format").unwrap();
    }

    #[test]
    fn types_live_on_root() {
        let mut e = entity();
        e.add_type("foaf:Person").unwrap();
        assert_eq!(e.types().len(), 1);
        e.set_type("foaf:Organization").unwrap();
        assert!(e.types().contains(&vocab::uri(vocab::FOAF_ORGANIZATION)));
        e.del_type("foaf:Organization").unwrap();
        assert!(e.types().is_empty());
    }

    #[test]
    fn part_ids() {
        let e = entity();
        let part = e.part_uri("a.txt");
        assert_eq!(part.as_str(), "info:local/e1/a.txt");
        assert_eq!(e.part_id_of(&part), Some("a.txt"));
        assert_eq!(e.part_id_of(&Uri::parse("info:local/e10/x").unwrap()), None);
        assert_eq!(e.part_id_of(e.uri()), None);
    }

    #[test]
    fn named_graph_creation_is_idempotent() {
        let mut e = entity();
        e.add_named_graph("g1", Some(t(2020, 1, 1)), None)
            .unwrap()
            .add_triple("info:local/e1", "foaf:name", "Old name", true)
            .unwrap();
        let again = e.add_named_graph("g1", Some(t(2021, 1, 1)), None).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(e.named_graph_uris().len(), 1);

        let g_uri = e.named_graph_uri("g1");
        let item = e.manifest().get_item(&g_uri).unwrap();
        assert!(item.types().contains(&vocab::uri(vocab::RDFG_GRAPH)));
        assert!(item.contains(&vocab::uri(vocab::FOAF_PRIMARY_TOPIC), &Term::Uri(e.uri().clone())));
        assert_eq!(e.list_aggregates(), vec![Term::Uri(g_uri.clone())]);
        assert_eq!(e.graph_validity(&g_uri).unwrap().from(), Some(t(2020, 1, 1)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut e = entity();
        assert!(e.add_named_graph("g", Some(t(2021, 1, 1)), Some(t(2020, 1, 1))).is_err());
        assert!(e.named_graph_uris().is_empty());
    }

    #[test]
    fn del_named_graph_unlinks() {
        let mut e = entity();
        e.add_named_graph("g1", Some(t(2020, 1, 1)), None).unwrap();
        e.del_named_graph("g1").unwrap();
        assert!(e.list_aggregates().is_empty());
        assert!(e.manifest().is_empty());
        assert!(e.get_named_graph("g1").unwrap_err().is_not_found());
    }

    #[test]
    fn temporal_queries() {
        let mut e = entity();
        e.add_triple("info:local/e1", "foaf:name", "Stable").unwrap();
        e.add_named_graph("g2019", Some(t(2019, 1, 1)), Some(t(2019, 12, 31)))
            .unwrap()
            .add_triple("info:local/e1", "foaf:name", "Old", true)
            .unwrap();
        e.add_named_graph("g2020", Some(t(2020, 1, 1)), None)
            .unwrap()
            .add_triple("info:local/e1", "foaf:name", "New", true)
            .unwrap();
        e.add_named_graph("undated", None, None).unwrap();

        let g2019 = e.named_graph_uri("g2019");
        assert_eq!(e.is_graph_valid(&g2019, t(2019, 6, 1)).unwrap(), ValidityOutcome::Valid);
        assert_eq!(e.is_graph_valid(&g2019, t(2020, 6, 1)).unwrap(), ValidityOutcome::Invalid);
        assert_eq!(
            e.is_graph_valid(e.named_graph_uri("undated"), t(2020, 6, 1)).unwrap(),
            ValidityOutcome::Unknown
        );
        assert!(e.is_graph_valid("info:local/e1/nope", t(2020, 1, 1)).is_err());

        let names = |g: &Graph| -> Vec<String> {
            g.iter()
                .filter(|tr| tr.predicate.as_str() == "http://xmlns.com/foaf/0.1/name")
                .map(|tr| tr.object.to_string())
                .collect()
        };
        let at_2019 = names(&e.assertions_at(t(2019, 6, 1)));
        assert_eq!(at_2019.len(), 2);
        assert!(at_2019.iter().any(|n| n.contains("Old")));
        let at_2020 = names(&e.assertions_at(t(2020, 6, 1)));
        assert!(at_2020.iter().any(|n| n.contains("New")));
        assert!(!at_2020.iter().any(|n| n.contains("Old")));
    }

    #[test]
    fn namespaces_reach_every_component() {
        let mut e = entity();
        e.add_named_graph("g", None, None).unwrap();
        e.add_namespace("ex", "http://example.org/ns#").unwrap();
        assert_eq!(e.root().namespaces().get("ex").map(String::as_str), Some("http://example.org/ns#"));
        assert!(e.get_named_graph("g").unwrap().bindings().contains_key("ex"));
        assert_eq!(e.registry().resolve("ex").as_deref(), Some("http://example.org/ns#"));
        e.add_triple("info:local/e1", "ex:colour", "blue").unwrap();
        assert!(e.root().triple_exists("http://example.org/ns#colour", "blue").unwrap());
    }

    #[test]
    fn rebinding_a_prefix_changes_expansion() {
        let mut e = entity();
        e.add_namespace("dc", "http://example.org/mydc/").unwrap();
        e.add_triple("info:local/e1", "dc:title", "T").unwrap();
        assert!(e.root().triple_exists("http://example.org/mydc/title", "T").unwrap());
        assert!(!e.root().triple_exists("http://purl.org/dc/elements/1.1/title", "T").unwrap());
        assert_eq!(e.root().namespaces().get("dc").map(String::as_str), Some("http://example.org/mydc/"));
    }

    #[test]
    fn serialize_merges_root_and_manifest() {
        let mut e = entity();
        e.add_triple("info:local/e1", "dcterms:title", "T").unwrap();
        e.add_triple("info:local/e1/a.txt", "dc:format", "text/plain").unwrap();
        let text = e.serialize(RdfFormat::NTriples).unwrap();
        let graph = RdfFormat::NTriples.parse(&text).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.subjects().len(), 2);
    }
}
