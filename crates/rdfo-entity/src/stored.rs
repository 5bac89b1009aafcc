use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rdfo_graph::{Manifest, NamedGraph, RdfFormat, TripleSet, Validity, ValidityOutcome};
use rdfo_store::{PartStore, PutReceipt, StoreError, MANIFEST_PART, ROOT_PART};
use rdfo_types::{vocab, IntoTerm, IntoUri, Literal, Term, Uri};
use tracing::{debug, info, warn};

use crate::change::{ChangeContext, ChangeKind, CommitSummary};
use crate::entity::{named_graph_triples, Entity, RDF_XML};
use crate::error::EntityResult;

/// An [`Entity`] bound to an object in a [`PartStore`].
///
/// Mutations are applied in memory and recorded in a pending
/// [`ChangeContext`]. [`commit`](Self::commit) writes the components that
/// changed and publishes the change-context as one audit event;
/// [`revert`](Self::revert) discards everything and reloads from the store.
///
/// Read access to the underlying entity is through `Deref`.
pub struct StoredEntity {
    id: String,
    store: Arc<PartStore>,
    entity: Entity,
    changes: ChangeContext,
    log_context: BTreeMap<String, String>,
}

impl StoredEntity {
    /// Load object `id`, creating it when missing and `create_if_missing`
    /// is set.
    pub fn open(store: Arc<PartStore>, id: &str, create_if_missing: bool) -> EntityResult<Self> {
        let uri = store.object_uri(id)?;
        let entity = Entity::new(uri, store.registry().clone());
        let mut stored = Self {
            id: id.to_string(),
            store,
            entity,
            changes: ChangeContext::new(),
            log_context: BTreeMap::new(),
        };
        stored.revert(create_if_missing)?;
        Ok(stored)
    }

    /// Fields attached to this entity's `metadatadelta` audit events.
    pub fn with_log_context(mut self, log_context: BTreeMap<String, String>) -> Self {
        self.log_context = log_context;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &Arc<PartStore> {
        &self.store
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn pending_changes(&self) -> &ChangeContext {
        &self.changes
    }

    // -- Load and persist ----------------------------------------------------

    /// Discard in-memory state and reload root, manifest and named graphs.
    ///
    /// The `ROOT` and `MANIFEST` manifest entries are re-established with
    /// their mimetype. A freshly created object therefore starts with a
    /// dirty manifest.
    pub fn revert(&mut self, create_if_missing: bool) -> EntityResult<()> {
        if !self.store.exists(&self.id)? {
            if !create_if_missing {
                return Err(StoreError::ObjectNotFound(self.id.clone()).into());
            }
            self.store.create_object(&self.id)?;
            info!(object_id = %self.id, uri = %self.entity.uri(), "created entity");
        }
        let uri = self.entity.uri().clone();
        let registry = self.entity.registry().clone();

        let root = match self.store.get_root(&self.id, &uri)? {
            Some(root) => root,
            None => TripleSet::new(uri.clone(), registry.clone()),
        };
        let mut manifest = match self.store.get_manifest(&self.id)? {
            Some(manifest) => manifest,
            None => Manifest::new(registry),
        };
        let format = Term::Literal(Literal::string(RDF_XML));
        for part in [ROOT_PART, MANIFEST_PART] {
            let item = uri.join(part);
            let current = if manifest.contains(&item) {
                manifest.item_objects(&item, vocab::DC_FORMAT)?
            } else {
                Vec::new()
            };
            if current != [format.clone()] {
                manifest.set_triple(&item, vocab::DC_FORMAT, &format)?;
            }
        }

        let graphs = self.load_named_graphs(&manifest)?;
        debug!(
            object_id = %self.id,
            root_triples = root.len(),
            manifest_items = manifest.len(),
            named_graphs = graphs.len(),
            "loaded entity"
        );
        self.entity.reset(root, manifest, graphs);
        self.changes.clear();
        Ok(())
    }

    fn load_named_graphs(&self, manifest: &Manifest) -> EntityResult<BTreeMap<Uri, NamedGraph>> {
        let topic = vocab::uri(vocab::FOAF_PRIMARY_TOPIC);
        let me = Term::Uri(self.entity.uri().clone());
        let format_predicate = vocab::uri(vocab::DC_FORMAT);
        let mut graphs = BTreeMap::new();
        for item in manifest {
            if !item.contains(&topic, &me) {
                continue;
            }
            let uri = item.subject();
            let Some(part_id) = self.entity.part_id_of(uri) else {
                warn!(graph = %uri, entity = %self.entity.uri(), "skipping named graph stored outside the entity");
                continue;
            };
            let format = item
                .first_object(&format_predicate)
                .and_then(Term::as_literal)
                .and_then(|l| RdfFormat::from_mimetype(&l.lexical).ok())
                .unwrap_or_default();
            let text = match self.store.get_part(&self.id, part_id, None) {
                Ok(bytes) => String::from_utf8(bytes)
                    .map_err(|e| StoreError::Serialization(format!("{part_id} is not UTF-8: {e}")))?,
                Err(e) if e.is_not_found() => {
                    warn!(graph = %uri, error = %e, "named graph has no stored body");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let graph = NamedGraph::parse(
                uri.clone(),
                &text,
                format,
                Validity::from_triples(item),
                self.entity.registry().clone(),
            )?;
            graphs.insert(uri.clone(), graph);
        }
        Ok(graphs)
    }

    /// Persist what changed, then audit the pending change-context.
    ///
    /// Named graphs go first so the metadata their writes generate lands in
    /// this commit. A failed step leaves its component dirty and the
    /// change-context in place, so a retry picks up where this one stopped.
    pub fn commit(&mut self) -> EntityResult<CommitSummary> {
        let mut summary = CommitSummary::default();

        let dirty: Vec<(Uri, String)> = self
            .entity
            .named_graphs()
            .filter(|g| g.is_altered())
            .filter_map(|g| {
                let part_id = self.entity.part_id_of(g.uri())?;
                Some((g.uri().clone(), part_id.to_string()))
            })
            .collect();
        for (uri, part_id) in dirty {
            let text = self.entity.graph_by_uri_mut(&uri)?.serialize(RdfFormat::RdfXml)?;
            let receipt = self.put_stream(&part_id, text.as_bytes(), Some(RDF_XML), None, false)?;
            self.entity.graph_by_uri_mut(&uri)?.mark_clean();
            summary.graphs.push((part_id, receipt.version));
        }

        if self.entity.root().is_altered() {
            let receipt = self.store.put_root(&self.id, self.entity.root())?;
            self.entity.root_mut().mark_clean();
            summary.root_version = Some(receipt.version);
        }

        if self.entity.manifest().is_altered() {
            let receipt = self.store.put_manifest(&self.id, self.entity.manifest_mut())?;
            self.entity.manifest_mut().mark_clean();
            summary.manifest_version = Some(receipt.version);
        }

        if !self.changes.is_empty() {
            self.store
                .log_audit(&self.id, &self.log_context, self.changes.to_json())?;
            summary.changes = self.changes.len();
            self.changes.clear();
        }

        if !summary.is_noop() {
            debug!(
                object_id = %self.id,
                graphs = summary.graphs.len(),
                root = ?summary.root_version,
                manifest = ?summary.manifest_version,
                changes = summary.changes,
                "committed entity"
            );
        }
        Ok(summary)
    }

    // -- Recorded mutations --------------------------------------------------

    pub fn add_namespace(&mut self, prefix: &str, namespace: &str) -> EntityResult<()> {
        self.entity.add_namespace(prefix, namespace)?;
        self.changes.record(ChangeKind::AddNamespace, [prefix, namespace]);
        Ok(())
    }

    pub fn del_namespace(&mut self, prefix: &str) {
        self.entity.del_namespace(prefix);
        self.changes.record(ChangeKind::DelNamespace, [prefix]);
    }

    pub fn add_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> EntityResult<()> {
        let registry = self.entity.registry().clone();
        let s = subject.into_uri(&registry)?;
        let p = predicate.into_uri(&registry)?;
        let o = object.into_term(&registry)?;
        self.entity.add_triple(&s, &p, &o)?;
        self.changes
            .record(ChangeKind::Add, [s.to_string(), p.to_string(), o.to_string()]);
        Ok(())
    }

    pub fn del_triple(
        &mut self,
        subject: impl IntoUri,
        predicate: impl IntoUri,
        object: impl IntoTerm,
    ) -> EntityResult<()> {
        let registry = self.entity.registry().clone();
        let s = subject.into_uri(&registry)?;
        let p = predicate.into_uri(&registry)?;
        let o = object.into_term(&registry)?;
        self.entity.del_triple(&s, &p, &o)?;
        self.changes
            .record(ChangeKind::Del, [s.to_string(), p.to_string(), o.to_string()]);
        Ok(())
    }

    /// Remove every object of `predicate` on `subject`.
    pub fn del_objects(&mut self, subject: impl IntoUri, predicate: impl IntoUri) -> EntityResult<()> {
        let registry = self.entity.registry().clone();
        let s = subject.into_uri(&registry)?;
        let p = predicate.into_uri(&registry)?;
        self.entity.del_objects(&s, &p)?;
        self.changes.record(ChangeKind::Del, [s.to_string(), p.to_string()]);
        Ok(())
    }

    pub fn add_type(&mut self, rdf_type: impl IntoUri) -> EntityResult<()> {
        let t = rdf_type.into_uri(self.entity.registry())?;
        self.entity.add_type(&t)?;
        self.changes.record(ChangeKind::AddType, [t.to_string()]);
        Ok(())
    }

    /// Replace every type with `rdf_type`.
    pub fn set_type(&mut self, rdf_type: impl IntoUri) -> EntityResult<()> {
        let t = rdf_type.into_uri(self.entity.registry())?;
        let old: Vec<Uri> = self.entity.types().iter().filter(|o| **o != t).cloned().collect();
        self.entity.set_type(&t)?;
        for o in old {
            self.changes.record(ChangeKind::DelType, [o.to_string()]);
        }
        self.changes.record(ChangeKind::AddType, [t.to_string()]);
        Ok(())
    }

    pub fn del_type(&mut self, rdf_type: impl IntoUri) -> EntityResult<()> {
        let t = rdf_type.into_uri(self.entity.registry())?;
        self.entity.del_type(&t)?;
        self.changes.record(ChangeKind::DelType, [t.to_string()]);
        Ok(())
    }

    /// Drop a manifest item.
    pub fn del_item(&mut self, item: impl IntoUri) -> EntityResult<TripleSet> {
        let item = item.into_uri(self.entity.registry())?;
        let removed = self.entity.manifest_mut().del_item(&item)?;
        self.changes.record(ChangeKind::DelItem, [item.to_string()]);
        Ok(removed)
    }

    // -- Streams -------------------------------------------------------------

    /// Store a new version of a binary part and describe it in the manifest.
    ///
    /// The part is linked from the entity (`ore:aggregates`) and to its new
    /// version node (`dcterms:hasVersion`). Its modification time, format
    /// and checksum are replaced, and copied onto the version node.
    pub fn put_stream(
        &mut self,
        part_id: &str,
        bytes: &[u8],
        mimetype: Option<&str>,
        version: Option<u32>,
        auto_commit: bool,
    ) -> EntityResult<PutReceipt> {
        if part_id == ROOT_PART || part_id == MANIFEST_PART {
            return Err(StoreError::InvalidId(part_id.to_string()).into());
        }
        let receipt = self.store.put_part(&self.id, part_id, bytes, mimetype, version)?;

        let uri = self.entity.uri().clone();
        let part_uri = self.entity.part_uri(part_id);
        let version_uri = part_uri.join(receipt.version);
        let now = Utc::now();

        self.add_triple(&uri, vocab::ORE_AGGREGATES, &part_uri)?;
        self.add_triple(&part_uri, vocab::DCTERMS_HAS_VERSION, &version_uri)?;
        self.add_triple(&part_uri, vocab::DCTERMS_IS_PART_OF, &uri)?;
        self.add_triple(&version_uri, vocab::DCTERMS_MODIFIED, now)?;
        self.del_objects(&part_uri, vocab::DCTERMS_MODIFIED)?;
        self.add_triple(&part_uri, vocab::DCTERMS_MODIFIED, now)?;
        if let Some(mimetype) = &receipt.mimetype {
            let format = Literal::string(mimetype.as_str());
            self.del_objects(&part_uri, vocab::DC_FORMAT)?;
            self.add_triple(&part_uri, vocab::DC_FORMAT, format.clone())?;
            self.add_triple(&version_uri, vocab::DC_FORMAT, format)?;
        }
        let checksum = Literal::string(receipt.checksum.to_string());
        self.del_objects(&part_uri, vocab::OV_HAS_CHECKSUM)?;
        self.add_triple(&part_uri, vocab::OV_HAS_CHECKSUM, checksum.clone())?;
        self.add_triple(&version_uri, vocab::OV_HAS_CHECKSUM, checksum)?;

        debug!(object_id = %self.id, part_id, version = receipt.version, "stored stream");
        if auto_commit {
            self.commit()?;
        }
        Ok(receipt)
    }

    /// Bytes of a part, newest version when `version` is unset.
    pub fn get_stream(&self, part_id: &str, version: Option<u32>) -> EntityResult<Vec<u8>> {
        Ok(self.store.get_part(&self.id, part_id, version)?)
    }

    /// The manifest description of a part, if it has one.
    pub fn get_stream_metadata(&self, part_id: &str) -> Option<&TripleSet> {
        self.entity.manifest().get_item(self.entity.part_uri(part_id)).ok()
    }

    pub fn list_parts(&self) -> EntityResult<Vec<String>> {
        Ok(self.store.list_parts(&self.id)?)
    }

    pub fn list_part_versions(&self, part_id: &str) -> EntityResult<Vec<u32>> {
        Ok(self.store.list_part_versions(&self.id, part_id)?)
    }

    /// Delete one version and its metadata, then commit.
    pub fn del_part_version(&mut self, part_id: &str, version: u32) -> EntityResult<()> {
        self.store.delete_part_version(&self.id, part_id, version)?;
        self.forget_version(part_id, version);
        self.commit()?;
        Ok(())
    }

    /// Delete several versions, then commit. See
    /// [`PartStore::delete_part_versions`] for `force`.
    pub fn del_part_versions(
        &mut self,
        part_id: &str,
        versions: &[u32],
        force: bool,
    ) -> EntityResult<BTreeMap<u32, bool>> {
        let results = self.store.delete_part_versions(&self.id, part_id, versions, force)?;
        for (&version, &deleted) in &results {
            if deleted {
                self.forget_version(part_id, version);
            }
        }
        self.commit()?;
        Ok(results)
    }

    /// Keep only the newest version of a part and return its number.
    pub fn remove_previous_versions(&mut self, part_id: &str) -> EntityResult<u32> {
        let mut versions = self.list_part_versions(part_id)?;
        let newest = versions.pop().ok_or_else(|| StoreError::PartNotFound {
            object_id: self.id.clone(),
            part_id: part_id.to_string(),
        })?;
        if !versions.is_empty() {
            self.del_part_versions(part_id, &versions, false)?;
        }
        Ok(newest)
    }

    /// Delete every version of a part, the part itself and every manifest
    /// item at or below the part's URI.
    pub fn del_stream(&mut self, part_id: &str, auto_commit: bool) -> EntityResult<()> {
        for version in self.list_part_versions(part_id)? {
            self.store.delete_part_version(&self.id, part_id, version)?;
            self.forget_version(part_id, version);
        }
        self.store.delete_part(&self.id, part_id)?;
        let uri = self.entity.uri().clone();
        let part_uri = self.entity.part_uri(part_id);
        self.del_triple(&uri, vocab::ORE_AGGREGATES, &part_uri)?;
        self.forget_items_under(&part_uri);
        if auto_commit {
            self.commit()?;
        }
        Ok(())
    }

    fn forget_version(&mut self, part_id: &str, version: u32) {
        let part_uri = self.entity.part_uri(part_id);
        let version_uri = part_uri.join(version);
        if let Err(e) = self.del_triple(&part_uri, vocab::DCTERMS_HAS_VERSION, &version_uri) {
            warn!(part = %part_uri, version, error = %e, "could not unlink version");
        }
        if let Err(e) = self.del_item(&version_uri) {
            warn!(item = %version_uri, error = %e, "could not remove version metadata");
        }
    }

    fn forget_items_under(&mut self, parent: &Uri) {
        for item in self.entity.manifest().items_under(parent) {
            if let Err(e) = self.del_item(&item) {
                warn!(item = %item, error = %e, "could not remove manifest item");
            }
        }
    }

    // -- Named graphs --------------------------------------------------------

    /// Create a named graph, write its initial body and commit. Returns the
    /// existing graph if `graph_id` is already in use.
    pub fn add_named_graph(
        &mut self,
        graph_id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    ) -> EntityResult<&mut NamedGraph> {
        let uri = self.entity.named_graph_uri(graph_id);
        if self.entity.has_named_graph(&uri) {
            return self.entity.graph_by_uri_mut(&uri);
        }
        let validity = Validity::new(valid_from, valid_until)?;
        let entity_uri = self.entity.uri().clone();
        for (s, p, o) in named_graph_triples(&entity_uri, &uri, validity, Utc::now()) {
            self.add_triple(s, p, o)?;
        }
        let mut graph = NamedGraph::new(uri.clone(), validity, self.entity.registry().clone());
        let text = graph.serialize(RdfFormat::RdfXml)?;
        self.put_stream(graph_id, text.as_bytes(), Some(RDF_XML), None, false)?;
        graph.mark_clean();
        self.entity.insert_named_graph(graph);
        self.commit()?;
        info!(object_id = %self.id, graph = %uri, "created named graph");
        self.entity.graph_by_uri_mut(&uri)
    }

    pub fn get_named_graph(&self, graph_id: &str) -> EntityResult<&NamedGraph> {
        self.entity.get_named_graph(graph_id)
    }

    /// Edits to the returned graph are written by the next commit.
    pub fn named_graph_mut(&mut self, graph_id: &str) -> EntityResult<&mut NamedGraph> {
        self.entity.named_graph_mut(graph_id)
    }

    /// Remove a named graph, its metadata and its stored body, then commit.
    pub fn del_named_graph(&mut self, graph_id: &str) -> EntityResult<()> {
        let uri = self.entity.named_graph_uri(graph_id);
        self.entity.remove_named_graph(&uri)?;
        let entity_uri = self.entity.uri().clone();
        self.del_triple(&entity_uri, vocab::ORE_AGGREGATES, &uri)?;
        self.forget_items_under(&uri);
        match self.store.delete_part(&self.id, graph_id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(graph = %uri, "named graph had no stored body");
            }
            Err(e) => return Err(e.into()),
        }
        self.commit()?;
        Ok(())
    }

    pub fn is_graph_valid(&self, graph_uri: impl IntoUri, at: DateTime<Utc>) -> EntityResult<ValidityOutcome> {
        self.entity.is_graph_valid(graph_uri, at)
    }

    pub fn set_graph_valid_from(&mut self, graph_uri: impl IntoUri, at: DateTime<Utc>) -> EntityResult<()> {
        let uri = graph_uri.into_uri(self.entity.registry())?;
        let validity = self.entity.graph_validity(&uri)?.with_from(Some(at))?;
        self.replace_window_bound(&uri, vocab::OV_VALID_FROM, at, validity)
    }

    pub fn set_graph_valid_until(&mut self, graph_uri: impl IntoUri, at: DateTime<Utc>) -> EntityResult<()> {
        let uri = graph_uri.into_uri(self.entity.registry())?;
        let validity = self.entity.graph_validity(&uri)?.with_until(Some(at))?;
        self.replace_window_bound(&uri, vocab::OV_VALID_UNTIL, at, validity)
    }

    fn replace_window_bound(
        &mut self,
        uri: &Uri,
        predicate: &'static str,
        at: DateTime<Utc>,
        validity: Validity,
    ) -> EntityResult<()> {
        // Fails before touching metadata if the graph is unknown.
        self.entity.graph_by_uri_mut(uri)?;
        self.del_objects(uri, predicate)?;
        self.add_triple(uri, predicate, at)?;
        self.entity.graph_by_uri_mut(uri)?.set_validity(validity);
        Ok(())
    }
}

impl Deref for StoredEntity {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.entity
    }
}

impl fmt::Debug for StoredEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredEntity")
            .field("id", &self.id)
            .field("entity", &self.entity)
            .field("pending_changes", &self.changes.len())
            .finish()
    }
}
