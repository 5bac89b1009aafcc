use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rdfo_types::{NamespaceRegistry, Uri};

use crate::error::GraphResult;
use crate::format::RdfFormat;
use crate::manifest::Manifest;
use crate::validity::{Validity, ValidityOutcome};

/// A manifest scoped to a validity window, holding time-bound assertions
/// about an entity.
///
/// Dereferences to its [`Manifest`], so items and triples are managed the
/// same way.
pub struct NamedGraph {
    uri: Uri,
    validity: Validity,
    manifest: Manifest,
}

impl NamedGraph {
    pub fn new(uri: Uri, validity: Validity, registry: Arc<NamespaceRegistry>) -> Self {
        Self {
            manifest: Manifest::with_uri(uri.clone(), registry),
            uri,
            validity,
        }
    }

    /// Load the graph body from a document. The result is clean.
    pub fn parse(
        uri: Uri,
        text: &str,
        format: RdfFormat,
        validity: Validity,
        registry: Arc<NamespaceRegistry>,
    ) -> GraphResult<Self> {
        let mut manifest = Manifest::parse(text, format, registry)?;
        manifest.set_uri(Some(uri.clone()));
        Ok(Self {
            uri,
            validity,
            manifest,
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn set_validity(&mut self, validity: Validity) {
        self.validity = validity;
    }

    pub fn check(&self, at: DateTime<Utc>) -> ValidityOutcome {
        self.validity.check(at)
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.check(at).is_valid()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }
}

impl Deref for NamedGraph {
    type Target = Manifest;

    fn deref(&self) -> &Manifest {
        &self.manifest
    }
}

impl DerefMut for NamedGraph {
    fn deref_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }
}

impl fmt::Debug for NamedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedGraph")
            .field("uri", &self.uri)
            .field("validity", &self.validity)
            .field("items", &self.manifest.len())
            .field("altered", &self.manifest.is_altered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn behaves_as_manifest_with_window() {
        let registry = Arc::new(NamespaceRegistry::with_defaults());
        let from = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut g = NamedGraph::new(
            Uri::parse("info:local/e/g1").unwrap(),
            Validity::starting(from),
            registry.clone(),
        );
        g.add_triple("info:local/e", "foaf:name", "Dept. of Things", true).unwrap();
        assert!(g.is_altered());
        assert_eq!(g.manifest().uri().map(Uri::as_str), Some("info:local/e/g1"));
        assert!(g.is_valid_at(from));
        assert!(!g.is_valid_at(from - chrono::Duration::days(1)));

        let text = g.serialize(RdfFormat::NTriples).unwrap();
        let back = NamedGraph::parse(g.uri().clone(), &text, RdfFormat::NTriples, g.validity(), registry).unwrap();
        assert!(!back.is_altered());
        assert_eq!(back.items(), g.items());
        assert_eq!(back.validity(), g.validity());
    }
}
