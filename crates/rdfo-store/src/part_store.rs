use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use rdfo_crypto::{Checksum, ChecksumAlgorithm};
use rdfo_graph::{Graph, Manifest, RdfFormat, TripleSet};
use rdfo_types::{NamespaceRegistry, Uri};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEvent, AuditSink, JsonLinesAuditSink};
use crate::backend::{parse_versioned_name, versioned_name, ByteStore};
use crate::config::{normalize_uri_base, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::fs::FsByteStore;
use crate::memory::InMemoryByteStore;

/// Reserved part holding an object's root description.
pub const ROOT_PART: &str = "ROOT";
/// Reserved part holding an object's manifest.
pub const MANIFEST_PART: &str = "MANIFEST";

/// Payload for [`PartStore::put_part`].
#[derive(Clone, Copy, Debug)]
pub enum PartContent<'a> {
    Bytes(&'a [u8]),
    /// Serialized with `format`; the part's mimetype defaults to the
    /// format's media type.
    Graph { graph: &'a Graph, format: RdfFormat },
}

impl<'a> PartContent<'a> {
    fn resolve(self) -> StoreResult<(Cow<'a, [u8]>, Option<&'static str>)> {
        match self {
            PartContent::Bytes(bytes) => Ok((Cow::Borrowed(bytes), None)),
            PartContent::Graph { graph, format } => {
                let text = format.serialize(graph)?;
                Ok((Cow::Owned(text.into_bytes()), Some(format.mimetype())))
            }
        }
    }
}

impl<'a> From<&'a [u8]> for PartContent<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        PartContent::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for PartContent<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        PartContent::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for PartContent<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        PartContent::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for PartContent<'a> {
    fn from(text: &'a str) -> Self {
        PartContent::Bytes(text.as_bytes())
    }
}

/// Outcome of storing one version of a part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutReceipt {
    pub version: u32,
    pub checksum: Checksum,
    pub mimetype: Option<String>,
}

struct Labels {
    create: &'static str,
    update: &'static str,
}

const PART_LABELS: Labels = Labels {
    create: "Creating a part",
    update: "Updating a part",
};
const ROOT_LABELS: Labels = Labels {
    create: "Creating an RDF Root",
    update: "Updating an RDF Root",
};
const MANIFEST_LABELS: Labels = Labels {
    create: "Creating an RDF Manifest",
    update: "Updating an RDF Manifest",
};

/// Versioned, checksummed, audited part storage over a [`ByteStore`].
///
/// Parts are addressed by `(object_id, part_id, version)`. Versions start
/// at 1 and are allocated under a store-wide lock, so concurrent writers in
/// one process never share a number.
pub struct PartStore {
    backend: Arc<dyn ByteStore>,
    uri_base: Uri,
    prefix: String,
    audit: Option<Arc<dyn AuditSink>>,
    context: BTreeMap<String, String>,
    registry: Arc<NamespaceRegistry>,
    allocation: Mutex<()>,
}

impl PartStore {
    pub fn new(backend: Arc<dyn ByteStore>, uri_base: &str) -> StoreResult<Self> {
        Ok(Self {
            backend,
            uri_base: normalize_uri_base(uri_base)?,
            prefix: "_".to_string(),
            audit: None,
            context: BTreeMap::new(),
            registry: Arc::new(NamespaceRegistry::with_defaults()),
            allocation: Mutex::new(()),
        })
    }

    pub fn in_memory(uri_base: &str) -> StoreResult<Self> {
        Self::new(Arc::new(InMemoryByteStore::new()), uri_base)
    }

    /// Open a filesystem-backed store as described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let backend = FsByteStore::open(&config.storage_dir, config.shorty_length, config.checksum)?;
        let mut store = Self::new(Arc::new(backend), &config.uri_base)?
            .with_prefix(&config.prefix)?
            .with_context(config.context.clone());
        if let Some(path) = &config.audit_log {
            store = store.with_audit(Arc::new(JsonLinesAuditSink::open(path)?));
        }
        debug!(dir = %config.storage_dir.display(), uri_base = %store.uri_base, "opened part store");
        Ok(store)
    }

    pub fn with_prefix(mut self, prefix: &str) -> StoreResult<Self> {
        if prefix.is_empty() || prefix.contains('/') || prefix.bytes().any(|b| b.is_ascii_digit()) {
            return Err(StoreError::InvalidConfig(format!("bad version prefix {prefix:?}")));
        }
        self.prefix = prefix.to_string();
        Ok(self)
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_registry(mut self, registry: Arc<NamespaceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ByteStore> {
        &self.backend
    }

    pub fn uri_base(&self) -> &Uri {
        &self.uri_base
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.backend.algorithm()
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// `{uri_base}{object_id}`.
    pub fn object_uri(&self, object_id: &str) -> StoreResult<Uri> {
        check_object_id(object_id)?;
        Ok(Uri::parse(format!("{}{}", self.uri_base, object_id))?)
    }

    // -- Objects -------------------------------------------------------------

    pub fn exists(&self, object_id: &str) -> StoreResult<bool> {
        self.backend.exists(object_id)
    }

    pub fn create_object(&self, object_id: &str) -> StoreResult<()> {
        check_object_id(object_id)?;
        self.backend.create_object(object_id)?;
        info!(object_id, "created object");
        self.emit(object_id, AuditAction::Create, "Creating an object", BTreeMap::new())
    }

    pub fn delete_object(&self, object_id: &str) -> StoreResult<()> {
        self.backend.delete_object(object_id)?;
        info!(object_id, "deleted object");
        self.emit(object_id, AuditAction::Delete, "Deleting an object", BTreeMap::new())
    }

    pub fn list_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = self.backend.list_ids()?;
        ids.sort();
        Ok(ids)
    }

    // -- Parts ---------------------------------------------------------------

    pub fn list_parts(&self, object_id: &str) -> StoreResult<Vec<String>> {
        let mut parts = self.backend.list_parts(object_id)?;
        parts.sort();
        Ok(parts)
    }

    /// Surviving version numbers, ascending.
    pub fn list_part_versions(&self, object_id: &str, part_id: &str) -> StoreResult<Vec<u32>> {
        let names = self.backend.list_part_versions(object_id, part_id)?;
        let mut versions: Vec<u32> = names
            .iter()
            .filter_map(|name| parse_versioned_name(part_id, &self.prefix, name))
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    pub fn latest_version(&self, object_id: &str, part_id: &str) -> StoreResult<Option<u32>> {
        Ok(self.list_part_versions(object_id, part_id)?.last().copied())
    }

    /// Store a new version of a part, creating the object if needed.
    ///
    /// With `version` unset the next free number is allocated. An explicit
    /// version overwrites whatever is stored under that number.
    pub fn put_part<'a>(
        &self,
        object_id: &str,
        part_id: &str,
        content: impl Into<PartContent<'a>>,
        mimetype: Option<&str>,
        version: Option<u32>,
    ) -> StoreResult<PutReceipt> {
        self.put_versioned(object_id, part_id, content.into(), mimetype, version, &PART_LABELS)
    }

    /// Bytes of a part version, or of the newest version when unset.
    pub fn get_part(&self, object_id: &str, part_id: &str, version: Option<u32>) -> StoreResult<Vec<u8>> {
        let (_, bytes) = self.get_part_version(object_id, part_id, version)?;
        Ok(bytes)
    }

    /// Like [`get_part`](Self::get_part), also returning the resolved version.
    pub fn get_part_version(
        &self,
        object_id: &str,
        part_id: &str,
        version: Option<u32>,
    ) -> StoreResult<(u32, Vec<u8>)> {
        if !self.backend.exists(object_id)? {
            return Err(StoreError::ObjectNotFound(object_id.to_string()));
        }
        let versions = self.list_part_versions(object_id, part_id)?;
        let version = match version {
            Some(v) => v,
            None => *versions.last().ok_or_else(|| part_not_found(object_id, part_id))?,
        };
        let name = versioned_name(part_id, &self.prefix, version);
        let bytes = match self.backend.get_stream(object_id, part_id, &name) {
            Err(StoreError::StreamNotFound { .. }) => {
                return Err(version_not_found(object_id, part_id, version))
            }
            other => other?,
        };
        debug!(object_id, part_id, version, bytes = bytes.len(), "loaded part");
        Ok((version, bytes))
    }

    /// Remove one version. The others keep their numbers.
    pub fn delete_part_version(&self, object_id: &str, part_id: &str, version: u32) -> StoreResult<()> {
        if !self.backend.exists(object_id)? {
            return Err(StoreError::ObjectNotFound(object_id.to_string()));
        }
        if !self.list_part_versions(object_id, part_id)?.contains(&version) {
            return Err(version_not_found(object_id, part_id, version));
        }
        let name = versioned_name(part_id, &self.prefix, version);
        self.backend.delete_stream(object_id, part_id, &name)?;
        debug!(object_id, part_id, version, "deleted part version");
        let fields = BTreeMap::from([
            ("part_id".to_string(), Value::from(part_id)),
            ("version".to_string(), Value::from(version)),
        ]);
        self.emit(object_id, AuditAction::Delete, "Deleting a version of a part", fields)
    }

    /// Delete several versions, reporting each outcome. With `force`, a
    /// failure is recorded as `false` instead of aborting.
    pub fn delete_part_versions(
        &self,
        object_id: &str,
        part_id: &str,
        versions: &[u32],
        force: bool,
    ) -> StoreResult<BTreeMap<u32, bool>> {
        let mut results = BTreeMap::new();
        for &version in versions {
            match self.delete_part_version(object_id, part_id, version) {
                Ok(()) => {
                    results.insert(version, true);
                }
                Err(e) if force => {
                    warn!(object_id, part_id, version, error = %e, "failed to delete part version");
                    results.insert(version, false);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Remove a part with every version.
    pub fn delete_part(&self, object_id: &str, part_id: &str) -> StoreResult<()> {
        self.backend.delete_part(object_id, part_id)?;
        debug!(object_id, part_id, "deleted part");
        let fields = BTreeMap::from([("part_id".to_string(), Value::from(part_id))]);
        self.emit(object_id, AuditAction::Delete, "Deleting a part", fields)
    }

    // -- Root and manifest ---------------------------------------------------

    pub fn put_root(&self, object_id: &str, root: &TripleSet) -> StoreResult<PutReceipt> {
        let text = root.serialize(RdfFormat::RdfXml)?;
        self.put_versioned(
            object_id,
            ROOT_PART,
            PartContent::Bytes(text.as_bytes()),
            Some(RdfFormat::RdfXml.mimetype()),
            None,
            &ROOT_LABELS,
        )
    }

    /// Newest root description, or `None` if none was ever stored.
    pub fn get_root(&self, object_id: &str, subject: &Uri) -> StoreResult<Option<TripleSet>> {
        let Some(text) = self.get_reserved(object_id, ROOT_PART)? else {
            return Ok(None);
        };
        let root = TripleSet::parse(subject.clone(), &text, RdfFormat::RdfXml, self.registry.clone())?;
        Ok(Some(root))
    }

    pub fn put_manifest(&self, object_id: &str, manifest: &mut Manifest) -> StoreResult<PutReceipt> {
        let text = manifest.serialize(RdfFormat::RdfXml)?;
        self.put_versioned(
            object_id,
            MANIFEST_PART,
            PartContent::Bytes(text.as_bytes()),
            Some(RdfFormat::RdfXml.mimetype()),
            None,
            &MANIFEST_LABELS,
        )
    }

    pub fn get_manifest(&self, object_id: &str) -> StoreResult<Option<Manifest>> {
        let Some(text) = self.get_reserved(object_id, MANIFEST_PART)? else {
            return Ok(None);
        };
        Ok(Some(Manifest::parse(&text, RdfFormat::RdfXml, self.registry.clone())?))
    }

    fn get_reserved(&self, object_id: &str, part_id: &str) -> StoreResult<Option<String>> {
        match self.get_part(object_id, part_id, None) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::Serialization(format!("{part_id} is not UTF-8: {e}"))),
            Err(StoreError::PartNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -- Audit ---------------------------------------------------------------

    /// Publish one batched `metadatadelta` event.
    pub fn log_audit(
        &self,
        object_id: &str,
        log_context: &BTreeMap<String, String>,
        changes: Value,
    ) -> StoreResult<()> {
        let mut fields: BTreeMap<String, Value> = log_context
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        fields.insert("changes".to_string(), changes);
        self.emit(object_id, AuditAction::MetadataDelta, "Metadata changes", fields)
    }

    fn emit(
        &self,
        object_id: &str,
        action: AuditAction,
        label: &str,
        fields: BTreeMap<String, Value>,
    ) -> StoreResult<()> {
        let Some(sink) = &self.audit else {
            return Ok(());
        };
        let mut event = AuditEvent::new(object_id, action, label, self.uri_base.as_str());
        for (key, value) in &self.context {
            event.fields.insert(key.clone(), Value::from(value.as_str()));
        }
        event.fields.extend(fields);
        sink.publish(&event)
    }

    // -- Internals -----------------------------------------------------------

    fn put_versioned(
        &self,
        object_id: &str,
        part_id: &str,
        content: PartContent<'_>,
        mimetype: Option<&str>,
        version: Option<u32>,
        labels: &Labels,
    ) -> StoreResult<PutReceipt> {
        check_object_id(object_id)?;
        check_part_id(part_id)?;
        if version == Some(0) {
            return Err(StoreError::InvalidVersion("versions start at 1".to_string()));
        }
        let (bytes, default_mimetype) = content.resolve()?;
        let mimetype = mimetype.or(default_mimetype).map(str::to_string);

        let (version, checksum) = {
            let _guard = self.allocation.lock().expect("lock poisoned");
            if !self.backend.exists(object_id)? {
                self.create_object(object_id)?;
            }
            let version = match version {
                Some(v) => v,
                None => self.next_version(object_id, part_id)?,
            };
            let name = versioned_name(part_id, &self.prefix, version);
            let checksum = self.backend.put_stream(object_id, part_id, &name, &bytes)?;
            self.backend.set_high_water(object_id, part_id, version)?;
            (version, checksum)
        };
        debug!(object_id, part_id, version, checksum = %checksum, "stored part version");

        let (action, label) = if version == 1 {
            (AuditAction::Create, labels.create)
        } else {
            (AuditAction::Update, labels.update)
        };
        let fields = BTreeMap::from([
            ("part_id".to_string(), Value::from(part_id)),
            ("version".to_string(), Value::from(version)),
            ("checksum".to_string(), Value::from(checksum.to_string())),
            ("mimetype".to_string(), Value::from(mimetype.clone())),
        ]);
        self.emit(object_id, action, label, fields)?;
        Ok(PutReceipt {
            version,
            checksum,
            mimetype,
        })
    }

    /// One past the highest version ever allocated. Caller holds the
    /// allocation lock.
    fn next_version(&self, object_id: &str, part_id: &str) -> StoreResult<u32> {
        let listed = match self.list_part_versions(object_id, part_id) {
            Ok(versions) => versions.last().copied().unwrap_or(0),
            Err(StoreError::PartNotFound { .. }) => 0,
            Err(e) => return Err(e),
        };
        let high_water = self.backend.high_water(object_id, part_id)?;
        listed
            .max(high_water)
            .checked_add(1)
            .ok_or_else(|| StoreError::InvalidVersion(format!("{part_id} has no versions left")))
    }
}

impl std::fmt::Debug for PartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartStore")
            .field("uri_base", &self.uri_base)
            .field("prefix", &self.prefix)
            .field("algorithm", &self.algorithm())
            .field("audited", &self.audit.is_some())
            .finish()
    }
}

fn check_object_id(object_id: &str) -> StoreResult<()> {
    if object_id.is_empty() || object_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StoreError::InvalidId(object_id.to_string()));
    }
    Ok(())
}

fn check_part_id(part_id: &str) -> StoreResult<()> {
    let bad_char = |c: char| c == '/' || c == '\\' || c.is_whitespace() || c.is_control();
    if part_id.is_empty() || part_id.starts_with('.') || part_id.chars().any(bad_char) {
        return Err(StoreError::InvalidId(part_id.to_string()));
    }
    Ok(())
}

fn part_not_found(object_id: &str, part_id: &str) -> StoreError {
    StoreError::PartNotFound {
        object_id: object_id.to_string(),
        part_id: part_id.to_string(),
    }
}

fn version_not_found(object_id: &str, part_id: &str, version: u32) -> StoreError {
    StoreError::VersionNotFound {
        object_id: object_id.to_string(),
        part_id: part_id.to_string(),
        version,
    }
}
