use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use rdfo_types::{IntoTerm, IntoUri, NamespaceRegistry, Term, Uri};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::format::RdfFormat;
use crate::graph::Graph;
use crate::triples::TripleSet;

/// Which manifest items a lookup covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemSelector {
    /// Every item (`*`).
    All,
    Item(Uri),
}

impl From<Uri> for ItemSelector {
    fn from(uri: Uri) -> Self {
        ItemSelector::Item(uri)
    }
}

impl From<&Uri> for ItemSelector {
    fn from(uri: &Uri) -> Self {
        ItemSelector::Item(uri.clone())
    }
}

/// An ordered collection of subjects, each with its own [`TripleSet`].
///
/// Items keep insertion order. The merged document graph is cached; any
/// mutable access invalidates it. Building the cache never clears dirty
/// flags, so a serialization made before commit cannot hide pending changes.
pub struct Manifest {
    uri: Option<Uri>,
    items: Vec<Uri>,
    graphs: HashMap<Uri, TripleSet>,
    namespaces: BTreeMap<String, String>,
    altered: bool,
    cache: Option<Graph>,
    registry: Arc<NamespaceRegistry>,
}

impl Manifest {
    pub fn new(registry: Arc<NamespaceRegistry>) -> Self {
        Self {
            uri: None,
            items: Vec::new(),
            graphs: HashMap::new(),
            namespaces: BTreeMap::new(),
            altered: false,
            cache: None,
            registry,
        }
    }

    /// A manifest that names itself, as named graphs do.
    pub fn with_uri(uri: Uri, registry: Arc<NamespaceRegistry>) -> Self {
        Self {
            uri: Some(uri),
            ..Self::new(registry)
        }
    }

    pub fn uri(&self) -> Option<&Uri> {
        self.uri.as_ref()
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn items(&self) -> &[Uri] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &Uri) -> bool {
        self.graphs.contains_key(item)
    }

    /// Dirty if the manifest itself or any item changed.
    pub fn is_altered(&self) -> bool {
        self.altered || self.graphs.values().any(TripleSet::is_altered)
    }

    /// Clear the manifest flag and every item flag.
    pub fn mark_clean(&mut self) {
        self.altered = false;
        for ts in self.graphs.values_mut() {
            ts.mark_clean();
        }
    }

    fn touch(&mut self) {
        self.altered = true;
        self.cache = None;
    }

    pub fn add_namespace(&mut self, prefix: &str, namespace: &str) -> GraphResult<()> {
        self.registry.bind_if_absent(prefix, namespace)?;
        self.namespaces.insert(prefix.to_string(), namespace.to_string());
        for ts in self.graphs.values_mut() {
            ts.add_namespace(prefix, namespace)?;
        }
        self.touch();
        Ok(())
    }

    pub fn del_namespace(&mut self, prefix: &str) {
        self.namespaces.remove(prefix);
        for ts in self.graphs.values_mut() {
            ts.del_namespace(prefix);
        }
        self.touch();
    }

    pub fn add_item(&mut self, item: impl IntoUri) -> GraphResult<&mut TripleSet> {
        let item = item.into_uri(&self.registry)?;
        if self.graphs.contains_key(&item) {
            return Err(GraphError::ItemAlreadyExists(item));
        }
        Ok(self.insert_item(item))
    }

    fn insert_item(&mut self, item: Uri) -> &mut TripleSet {
        let mut ts = TripleSet::new(item.clone(), self.registry.clone());
        ts.inherit_namespaces(&self.namespaces);
        self.items.push(item.clone());
        self.touch();
        self.graphs.entry(item).or_insert(ts)
    }

    pub fn get_item(&self, item: impl IntoUri) -> GraphResult<&TripleSet> {
        let item = item.into_uri(&self.registry)?;
        self.graphs.get(&item).ok_or(GraphError::ItemNotFound(item))
    }

    /// Mutable access to an item. Invalidates the serialization cache.
    pub fn get_item_mut(&mut self, item: impl IntoUri) -> GraphResult<&mut TripleSet> {
        let item = item.into_uri(&self.registry)?;
        self.cache = None;
        self.graphs.get_mut(&item).ok_or(GraphError::ItemNotFound(item))
    }

    pub fn del_item(&mut self, item: impl IntoUri) -> GraphResult<TripleSet> {
        let item = item.into_uri(&self.registry)?;
        let ts = self
            .graphs
            .remove(&item)
            .ok_or_else(|| GraphError::ItemNotFound(item.clone()))?;
        self.items.retain(|u| *u != item);
        self.touch();
        Ok(ts)
    }

    pub fn add_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
        create_if_missing: bool,
    ) -> GraphResult<()> {
        let subject = subject.into_uri(&self.registry)?;
        let ts = if self.graphs.contains_key(&subject) {
            self.get_item_mut(subject)?
        } else if create_if_missing {
            self.insert_item(subject)
        } else {
            return Err(GraphError::ItemNotFound(subject));
        };
        ts.add_triple(predicate, object)
    }

    pub fn del_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> GraphResult<()> {
        self.get_item_mut(subject)?.del_triple(predicate, object)
    }

    /// Remove every object of `predicate` on `subject`.
    pub fn del_objects(&mut self, subject: impl IntoUri, predicate: impl IntoUri) -> GraphResult<()> {
        self.get_item_mut(subject)?.del_objects(predicate)
    }

    /// Replace every object of `predicate` on `subject`, creating the item
    /// if needed.
    pub fn set_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> GraphResult<()> {
        let subject = subject.into_uri(&self.registry)?;
        if !self.graphs.contains_key(&subject) {
            self.insert_item(subject.clone());
        }
        self.get_item_mut(subject)?.set_triple(predicate, object)
    }

    /// `false` when the item does not exist.
    pub fn triple_exists(
        &self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> GraphResult<bool> {
        let subject = subject.into_uri(&self.registry)?;
        match self.graphs.get(&subject) {
            Some(ts) => ts.triple_exists(predicate, object),
            None => Ok(false),
        }
    }

    /// Objects of `predicate` per item. [`ItemSelector::All`] covers every
    /// item that has at least one such object.
    pub fn list_objects(
        &self,
        selector: impl Into<ItemSelector>,
        predicate: impl IntoUri,
    ) -> GraphResult<BTreeMap<Uri, Vec<Term>>> {
        let predicate = predicate.into_uri(&self.registry)?;
        let mut out = BTreeMap::new();
        match selector.into() {
            ItemSelector::All => {
                for ts in self.iter() {
                    let objects = ts.objects(&predicate);
                    if !objects.is_empty() {
                        out.insert(ts.subject().clone(), objects);
                    }
                }
            }
            ItemSelector::Item(item) => {
                let ts = self
                    .graphs
                    .get(&item)
                    .ok_or_else(|| GraphError::ItemNotFound(item.clone()))?;
                out.insert(item, ts.objects(&predicate));
            }
        }
        Ok(out)
    }

    /// Objects of `predicate` on one item.
    pub fn item_objects(&self, subject: impl IntoUri, predicate: impl IntoUri) -> GraphResult<Vec<Term>> {
        self.get_item(subject)?.list_objects(predicate)
    }

    /// Items equal to or below `parent`, in insertion order.
    pub fn items_under(&self, parent: &Uri) -> Vec<Uri> {
        self.items.iter().filter(|u| u.is_under(parent)).cloned().collect()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            items: self.items.iter(),
            graphs: &self.graphs,
        }
    }

    /// Prefix bindings for the merged document: the first item's bindings,
    /// the registry's bindings and the manifest's own.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let mut out = self
            .iter()
            .next()
            .map(TripleSet::bindings)
            .unwrap_or_default();
        for (p, ns) in self.registry.bindings() {
            out.entry(p).or_insert(ns);
        }
        for (p, ns) in &self.namespaces {
            out.insert(p.clone(), ns.clone());
        }
        out
    }

    /// Build the merged document without touching the cache.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::with_prefixes(self.bindings());
        for ts in self.iter() {
            graph.extend(ts.list_triples());
        }
        graph
    }

    /// The merged document, built once and reused until the next mutation.
    pub fn graph(&mut self) -> &Graph {
        if self.cache.is_none() {
            debug!(items = self.items.len(), "rebuilding manifest graph cache");
        }
        let graph = match self.cache.take() {
            Some(g) => g,
            None => self.to_graph(),
        };
        self.cache.insert(graph)
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn serialize(&mut self, format: RdfFormat) -> GraphResult<String> {
        format.serialize(self.graph())
    }

    /// Load a document: every distinct subject becomes an item, in document
    /// order. The result is clean.
    pub fn from_graph(graph: &Graph, registry: Arc<NamespaceRegistry>) -> GraphResult<Self> {
        let mut manifest = Self::new(registry);
        manifest.namespaces = graph.prefixes().clone();
        for subject in graph.subjects() {
            manifest.insert_item(subject.clone());
        }
        for t in graph {
            if let Some(ts) = manifest.graphs.get_mut(&t.subject) {
                ts.add_triple(&t.predicate, &t.object)?;
            }
        }
        manifest.mark_clean();
        manifest.cache = None;
        Ok(manifest)
    }

    pub fn parse(text: &str, format: RdfFormat, registry: Arc<NamespaceRegistry>) -> GraphResult<Self> {
        let graph = format.parse(text)?;
        Self::from_graph(&graph, registry)
    }

    pub(crate) fn set_uri(&mut self, uri: Option<Uri>) {
        self.uri = uri;
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("uri", &self.uri)
            .field("items", &self.items)
            .field("altered", &self.is_altered())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

/// Iterator over manifest items in insertion order.
pub struct Iter<'a> {
    items: std::slice::Iter<'a, Uri>,
    graphs: &'a HashMap<Uri, TripleSet>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TripleSet;

    fn next(&mut self) -> Option<Self::Item> {
        let uri = self.items.next()?;
        self.graphs.get(uri)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a TripleSet;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdfo_types::{vocab, Literal};

    fn manifest() -> Manifest {
        Manifest::new(Arc::new(NamespaceRegistry::with_defaults()))
    }

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn add_item_twice_fails() {
        let mut m = manifest();
        m.add_item("info:local/a").unwrap();
        let err = m.add_item("info:local/a").unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn unknown_items_are_not_found() {
        let mut m = manifest();
        assert!(m.get_item("info:local/missing").unwrap_err().is_not_found());
        assert!(m.del_item("info:local/missing").unwrap_err().is_not_found());
        assert!(m.del_triple("info:local/missing", "dc:title", "x").unwrap_err().is_not_found());
        let err = m.add_triple("info:local/missing", "dc:title", "x", false).unwrap_err();
        assert!(err.is_not_found());
        assert!(!m.triple_exists("info:local/missing", "dc:title", "x").unwrap());
    }

    #[test]
    fn add_triple_creates_items_in_order() {
        let mut m = manifest();
        m.add_triple("info:local/b", "dc:title", "B", true).unwrap();
        m.add_triple("info:local/a", "dc:title", "A", true).unwrap();
        m.add_triple("info:local/b", "dc:format", "text/plain", true).unwrap();
        assert_eq!(m.items(), &[uri("info:local/b"), uri("info:local/a")]);
        let subjects: Vec<&Uri> = m.iter().map(TripleSet::subject).collect();
        assert_eq!(subjects, [&uri("info:local/b"), &uri("info:local/a")]);
        // Restartable.
        assert_eq!(m.iter().count(), 2);
        assert_eq!((&m).into_iter().count(), 2);
    }

    #[test]
    fn list_objects_across_items() {
        let mut m = manifest();
        m.add_triple("info:local/a", "dc:title", "A", true).unwrap();
        m.add_triple("info:local/b", "dc:title", "B", true).unwrap();
        m.add_triple("info:local/c", "dc:format", "x", true).unwrap();

        let all = m.list_objects(ItemSelector::All, "dc:title").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&uri("info:local/a")], vec![Term::Literal(Literal::string("A"))]);

        let one = m.list_objects(uri("info:local/c"), "dc:title").unwrap();
        assert_eq!(one[&uri("info:local/c")], Vec::<Term>::new());
        assert!(m.list_objects(uri("info:local/z"), "dc:title").is_err());
    }

    #[test]
    fn dirty_flag_is_or_of_items() {
        let mut m = manifest();
        m.add_triple("info:local/a", "dc:title", "A", true).unwrap();
        assert!(m.is_altered());
        m.mark_clean();
        assert!(!m.is_altered());
        m.get_item_mut("info:local/a").unwrap().add_type("foaf:Document").unwrap();
        assert!(m.is_altered());
        m.mark_clean();
        m.del_item("info:local/a").unwrap();
        assert!(m.is_altered());
    }

    #[test]
    fn cache_invalidated_by_item_mutation_and_keeps_dirty_flags() {
        let mut m = manifest();
        m.add_triple("info:local/a", "dc:title", "A", true).unwrap();
        assert_eq!(m.graph().len(), 1);
        assert!(m.is_cached());
        assert!(m.is_altered(), "building the cache must not clear dirty flags");

        m.get_item_mut("info:local/a").unwrap().add_triple("dc:creator", "me").unwrap();
        assert!(!m.is_cached());
        assert_eq!(m.graph().len(), 2);

        m.del_triple("info:local/a", "dc:creator", "me").unwrap();
        assert_eq!(m.graph().len(), 1);
    }

    #[test]
    fn items_under_uses_segment_boundaries() {
        let mut m = manifest();
        for s in ["info:local/e/a.txt", "info:local/e/a.txt/1", "info:local/e/b", "info:local/e/a.txtx"] {
            m.add_item(s).unwrap();
        }
        let under = m.items_under(&uri("info:local/e/a.txt"));
        assert_eq!(under, [uri("info:local/e/a.txt"), uri("info:local/e/a.txt/1")]);
    }

    #[test]
    fn namespaces_apply_to_all_items() {
        let mut m = manifest();
        m.add_item("info:local/a").unwrap();
        m.add_namespace("ex", "http://example.org/ns#").unwrap();
        m.add_item("info:local/b").unwrap();
        assert!(!m.get_item("info:local/b").unwrap().is_altered());
        for ts in &m {
            assert_eq!(ts.namespaces().get("ex").map(String::as_str), Some("http://example.org/ns#"));
        }
        m.del_namespace("ex");
        assert!(m.iter().all(|ts| !ts.namespaces().contains_key("ex")));
    }

    #[test]
    fn roundtrip_every_format() {
        let mut m = manifest();
        m.add_namespace("ex", "http://example.org/ns#").unwrap();
        m.add_triple("info:local/e/ROOT", "dc:format", "application/rdf+xml", true).unwrap();
        m.add_triple("info:local/e/a.txt", "dcterms:hasVersion", uri("info:local/e/a.txt/1"), true).unwrap();
        m.add_triple("info:local/e/a.txt", "ex:size", 12i64, true).unwrap();
        m.add_triple("info:local/e/a.txt", "rdf:type", "foaf:Document", true).unwrap();
        m.add_triple(
            "info:local/e/a.txt/1",
            vocab::uri(vocab::DCTERMS_MODIFIED),
            Literal::string("2009-10-05T08:00:00Z"),
            true,
        )
        .unwrap();

        for format in [RdfFormat::RdfXml, RdfFormat::NTriples] {
            let text = m.serialize(format).unwrap();
            let mut parsed = Manifest::parse(&text, format, m.registry().clone()).unwrap();
            assert!(!parsed.is_altered());
            assert_eq!(parsed.items(), m.items(), "{format}");
            let mut a = parsed.graph().clone();
            let mut b = m.to_graph();
            a.canonicalize();
            b.canonicalize();
            assert_eq!(a.triples(), b.triples(), "{format}");
            assert_eq!(parsed.bindings(), m.bindings(), "{format}");
        }
    }
}
