//! Exchange formats.
//!
//! Two syntaxes are supported: N-Triples (line based) and the common
//! `rdf:Description` subset of RDF/XML. Both carry prefix bindings: RDF/XML
//! as `xmlns` declarations, N-Triples as `# @prefix p: <ns> .` comments.

mod ntriples;
mod rdfxml;

use std::fmt;
use std::str::FromStr;

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;

/// A supported RDF syntax.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RdfFormat {
    #[default]
    RdfXml,
    NTriples,
}

impl RdfFormat {
    pub fn mimetype(&self) -> &'static str {
        match self {
            RdfFormat::RdfXml => "application/rdf+xml",
            RdfFormat::NTriples => "application/n-triples",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RdfFormat::RdfXml => "RDF/XML",
            RdfFormat::NTriples => "N-Triples",
        }
    }

    /// Look up a format by media type, ignoring parameters such as
    /// `; charset=utf-8`.
    pub fn from_mimetype(mimetype: &str) -> GraphResult<Self> {
        let base = mimetype.split(';').next().unwrap_or_default().trim();
        match base.to_ascii_lowercase().as_str() {
            "application/rdf+xml" | "text/xml" | "application/xml" => Ok(RdfFormat::RdfXml),
            "application/n-triples" | "text/plain" | "nt" => Ok(RdfFormat::NTriples),
            _ => Err(GraphError::UnknownFormat(mimetype.to_string())),
        }
    }

    pub fn serialize(&self, graph: &Graph) -> GraphResult<String> {
        match self {
            RdfFormat::RdfXml => rdfxml::serialize(graph),
            RdfFormat::NTriples => Ok(ntriples::serialize(graph)),
        }
    }

    pub fn parse(&self, text: &str) -> GraphResult<Graph> {
        match self {
            RdfFormat::RdfXml => rdfxml::parse(text),
            RdfFormat::NTriples => ntriples::parse(text),
        }
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RdfFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" | "rdfxml" | "rdf/xml" => Ok(RdfFormat::RdfXml),
            "ntriples" | "n-triples" => Ok(RdfFormat::NTriples),
            _ => Self::from_mimetype(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdfo_types::{vocab, Literal, Uri};

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.bind_prefix("dcterms", vocab::DCTERMS);
        g.bind_prefix("ex", "http://example.org/ns#");
        let s = uri("info:local/obj1");
        g.add(s.clone(), uri(vocab::RDF_TYPE), uri("http://example.org/ns#Thing"));
        g.add(s.clone(), uri("http://purl.org/dc/terms/title"), Literal::string("A <b> & \"c\"\nline two"));
        g.add(s.clone(), uri("http://purl.org/dc/terms/language"), Literal::lang("hei", "no"));
        g.add(s.clone(), uri("http://example.org/ns#count"), Literal::integer(3));
        g.add(s.clone(), uri("http://example.org/ns#empty"), Literal::string(""));
        g.add(uri("info:local/obj1/a.txt"), uri(vocab::DCTERMS_IS_PART_OF), s);
        g.add(uri("info:local/obj1/a.txt"), uri("http://other.org/vocab/note"), Literal::string("ünïcödé"));
        g
    }

    #[test]
    fn roundtrip_every_format() {
        for format in [RdfFormat::RdfXml, RdfFormat::NTriples] {
            let original = sample();
            let text = format.serialize(&original).unwrap();
            let mut parsed = format.parse(&text).unwrap();
            let mut expected = original.clone();
            parsed.canonicalize();
            expected.canonicalize();
            assert_eq!(parsed.triples(), expected.triples(), "{format}");
            for (p, ns) in original.prefixes() {
                assert_eq!(parsed.prefixes().get(p), Some(ns), "{format} {p}");
            }
        }
    }

    #[test]
    fn mimetype_lookup() {
        assert_eq!(RdfFormat::from_mimetype("application/rdf+xml").unwrap(), RdfFormat::RdfXml);
        assert_eq!(
            RdfFormat::from_mimetype("application/n-triples; charset=utf-8").unwrap(),
            RdfFormat::NTriples
        );
        assert!(matches!(
            RdfFormat::from_mimetype("image/png"),
            Err(GraphError::UnknownFormat(_))
        ));
        assert_eq!("xml".parse::<RdfFormat>().unwrap(), RdfFormat::RdfXml);
        assert_eq!(RdfFormat::NTriples.mimetype(), "application/n-triples");
    }
}
