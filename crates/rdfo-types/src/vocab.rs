//! Namespace and term constants used across the workspace.

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const DC: &str = "http://purl.org/dc/elements/1.1/";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const OV: &str = "http://open.vocab.org/terms/";
pub const ORE: &str = "http://www.openarchives.org/ore/terms/";
pub const AIISO: &str = "http://purl.org/vocab/aiiso/schema#";
pub const RDFG: &str = "http://www.w3.org/2004/03/trix/rdfg-1/";

/// Prefixes bound by [`NamespaceRegistry::with_defaults`](crate::NamespaceRegistry::with_defaults).
pub const DEFAULT_PREFIXES: &[(&str, &str)] = &[
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("xsd", XSD),
    ("dc", DC),
    ("dcterms", DCTERMS),
    ("foaf", FOAF),
    ("ov", OV),
    ("ore", ORE),
    ("aiiso", AIISO),
];

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

pub const DC_FORMAT: &str = "http://purl.org/dc/elements/1.1/format";

pub const DCTERMS_CREATED: &str = "http://purl.org/dc/terms/created";
pub const DCTERMS_MODIFIED: &str = "http://purl.org/dc/terms/modified";
pub const DCTERMS_HAS_VERSION: &str = "http://purl.org/dc/terms/hasVersion";
pub const DCTERMS_IS_PART_OF: &str = "http://purl.org/dc/terms/isPartOf";

pub const FOAF_PRIMARY_TOPIC: &str = "http://xmlns.com/foaf/0.1/primaryTopic";
pub const FOAF_ORGANIZATION: &str = "http://xmlns.com/foaf/0.1/Organization";

pub const OV_VALID_FROM: &str = "http://open.vocab.org/terms/validFrom";
pub const OV_VALID_UNTIL: &str = "http://open.vocab.org/terms/validUntil";
pub const OV_HAS_CHECKSUM: &str = "http://open.vocab.org/terms/hasChecksum";

pub const ORE_AGGREGATES: &str = "http://www.openarchives.org/ore/terms/aggregates";

pub const RDFG_GRAPH: &str = "http://www.w3.org/2004/03/trix/rdfg-1/Graph";

/// A vocabulary constant as a [`Uri`](crate::Uri).
///
/// Only for the absolute URIs defined in this module.
pub fn uri(term: &'static str) -> crate::Uri {
    crate::Uri(term.to_owned())
}
