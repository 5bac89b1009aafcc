//! RDF/XML: the flat `rdf:Description` subset.
//!
//! Supported on input:
//! - `rdf:Description rdf:about` and typed node elements
//! - property elements with `rdf:resource`, `rdf:datatype`, `xml:lang` or
//!   text content
//! - property attributes on node elements
//!
//! Blank nodes, nested node elements and `rdf:parseType` are rejected.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use quick_xml::events::{BytesStart, Event};
use quick_xml::escape::escape;
use quick_xml::Reader;
use rdfo_types::{vocab, Literal, Term, Uri};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Graph, Triple};

const FORMAT: &str = "RDF/XML";

pub(super) fn serialize(graph: &Graph) -> GraphResult<String> {
    let mut prefixes: BTreeMap<String, String> = graph
        .prefixes()
        .iter()
        .filter(|(p, _)| p.as_str() != "rdf")
        .map(|(p, ns)| (p.clone(), ns.clone()))
        .collect();
    prefixes.insert("rdf".into(), vocab::RDF.into());

    let mut by_ns: HashMap<String, String> = HashMap::new();
    by_ns.insert(vocab::RDF.into(), "rdf".into());
    for (p, ns) in &prefixes {
        by_ns.entry(ns.clone()).or_insert_with(|| p.clone());
    }

    // Subjects in order of first appearance, each with its statements.
    let mut order: Vec<&Uri> = Vec::new();
    let mut grouped: HashMap<&Uri, Vec<&Triple>> = HashMap::new();
    for t in graph {
        grouped
            .entry(&t.subject)
            .or_insert_with(|| {
                order.push(&t.subject);
                Vec::new()
            })
            .push(t);
    }

    let mut generated = 0usize;
    let mut qnames: HashMap<&Uri, String> = HashMap::new();
    for t in graph {
        if qnames.contains_key(&t.predicate) {
            continue;
        }
        let (ns, local) = split_predicate(&t.predicate)?;
        let prefix = match by_ns.get(ns) {
            Some(p) => p.clone(),
            None => {
                let mut candidate = format!("ns{generated}");
                while prefixes.contains_key(&candidate) {
                    generated += 1;
                    candidate = format!("ns{generated}");
                }
                generated += 1;
                prefixes.insert(candidate.clone(), ns.to_string());
                by_ns.insert(ns.to_string(), candidate.clone());
                candidate
            }
        };
        qnames.insert(&t.predicate, format!("{prefix}:{local}"));
    }

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rdf:RDF");
    for (p, ns) in &prefixes {
        let _ = write!(out, "\n   xmlns:{p}=\"{}\"", escape(ns.as_str()));
    }
    out.push_str(">\n");

    for subject in order {
        let _ = writeln!(out, "  <rdf:Description rdf:about=\"{}\">", escape(subject.as_str()));
        for t in &grouped[subject] {
            let qname = &qnames[&t.predicate];
            match &t.object {
                Term::Uri(u) => {
                    let _ = writeln!(out, "    <{qname} rdf:resource=\"{}\"/>", escape(u.as_str()));
                }
                Term::Literal(l) => {
                    let _ = write!(out, "    <{qname}");
                    if let Some(lang) = &l.language {
                        let _ = write!(out, " xml:lang=\"{}\"", escape(lang.as_str()));
                    } else if let Some(dt) = &l.datatype {
                        let _ = write!(out, " rdf:datatype=\"{}\"", escape(dt.as_str()));
                    }
                    let _ = writeln!(out, ">{}</{qname}>", escape(l.lexical.as_str()));
                }
            }
        }
        out.push_str("  </rdf:Description>\n");
    }
    out.push_str("</rdf:RDF>\n");
    Ok(out)
}

fn split_predicate(predicate: &Uri) -> GraphResult<(&str, &str)> {
    match predicate.split_local() {
        Some((ns, local)) if is_ncname(local) => Ok((ns, local)),
        _ => Err(GraphError::Unsupported {
            format: FORMAT,
            message: format!("predicate {predicate} has no XML-safe local name"),
        }),
    }
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
    first_ok && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

enum State {
    Outside,
    Node(Uri),
    Property(PendingProperty),
}

struct PendingProperty {
    subject: Uri,
    predicate: Uri,
    resource: Option<Uri>,
    datatype: Option<Uri>,
    language: Option<String>,
    text: String,
}

impl PendingProperty {
    fn finish(self) -> Triple {
        let object = match self.resource {
            Some(u) => Term::Uri(u),
            None => Term::Literal(literal(self.text, self.datatype, self.language)),
        };
        Triple::new(self.subject, self.predicate, object)
    }
}

fn literal(text: String, datatype: Option<Uri>, language: Option<String>) -> Literal {
    match (language, datatype) {
        (Some(lang), _) => Literal::lang(text, lang),
        (None, Some(dt)) => Literal::typed(text, dt),
        (None, None) => Literal::string(text),
    }
}

/// RDF-relevant attributes of one element.
#[derive(Default)]
struct Attrs {
    about: Option<Uri>,
    resource: Option<Uri>,
    datatype: Option<Uri>,
    language: Option<String>,
    types: Vec<Uri>,
    properties: Vec<(Uri, String)>,
}

struct Parser<'t> {
    text: &'t str,
    reader: Reader<&'t [u8]>,
    namespaces: HashMap<String, String>,
    graph: Graph,
    state: State,
}

pub(super) fn parse(text: &str) -> GraphResult<Graph> {
    Parser {
        text,
        reader: Reader::from_str(text),
        namespaces: HashMap::new(),
        graph: Graph::new(),
        state: State::Outside,
    }
    .run()
}

impl<'t> Parser<'t> {
    fn error(&self, message: impl Into<String>) -> GraphError {
        let pos = usize::try_from(self.reader.buffer_position()).unwrap_or(self.text.len());
        let line = self.text.as_bytes()[..pos.min(self.text.len())]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1;
        GraphError::Malformed {
            format: FORMAT,
            line,
            message: message.into(),
        }
    }

    fn run(mut self) -> GraphResult<Graph> {
        loop {
            let event = match self.reader.read_event() {
                Ok(event) => event.into_owned(),
                Err(e) => return Err(self.error(e.to_string())),
            };
            match event {
                Event::Start(e) => self.open(&e, false)?,
                Event::Empty(e) => self.open(&e, true)?,
                Event::End(_) => self.close()?,
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| self.error(err.to_string()))?;
                    self.text_content(&text)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    self.text_content(&text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !matches!(self.state, State::Outside) {
            return Err(self.error("unexpected end of document"));
        }
        Ok(self.graph)
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> GraphResult<()> {
        self.collect_namespaces(e)?;
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let element = self.resolve_qname(&name)?;
        let attrs = self.attributes(e)?;

        match std::mem::replace(&mut self.state, State::Outside) {
            State::Outside => {
                if element.as_str() == RDF_ROOT {
                    return Ok(());
                }
                let subject = attrs
                    .about
                    .clone()
                    .ok_or_else(|| self.error(format!("node element {name} without rdf:about (blank nodes are not supported)")))?;
                if element.as_str() != RDF_DESCRIPTION {
                    self.graph.add(subject.clone(), vocab::uri(vocab::RDF_TYPE), element);
                }
                for t in attrs.types {
                    self.graph.add(subject.clone(), vocab::uri(vocab::RDF_TYPE), t);
                }
                for (predicate, value) in attrs.properties {
                    self.graph.add(subject.clone(), predicate, Literal::string(value));
                }
                if !empty {
                    self.state = State::Node(subject);
                }
            }
            State::Node(subject) => {
                if empty {
                    let object = match attrs.resource {
                        Some(u) => Term::Uri(u),
                        None => Term::Literal(literal(String::new(), attrs.datatype, attrs.language)),
                    };
                    self.graph.add(subject.clone(), element, object);
                    self.state = State::Node(subject);
                } else {
                    self.state = State::Property(PendingProperty {
                        subject,
                        predicate: element,
                        resource: attrs.resource,
                        datatype: attrs.datatype,
                        language: attrs.language,
                        text: String::new(),
                    });
                }
            }
            State::Property(_) => {
                return Err(self.error("nested node elements are not supported"));
            }
        }
        Ok(())
    }

    fn close(&mut self) -> GraphResult<()> {
        self.state = match std::mem::replace(&mut self.state, State::Outside) {
            State::Property(pending) => {
                let subject = pending.subject.clone();
                self.graph.push(pending.finish());
                State::Node(subject)
            }
            State::Node(_) | State::Outside => State::Outside,
        };
        Ok(())
    }

    fn text_content(&mut self, text: &str) -> GraphResult<()> {
        match &mut self.state {
            State::Property(pending) => {
                if pending.resource.is_some() && !text.trim().is_empty() {
                    return Err(self.error("property has both rdf:resource and text"));
                }
                pending.text.push_str(text);
            }
            _ if !text.trim().is_empty() => {
                return Err(self.error(format!("unexpected text: {}", text.trim())));
            }
            _ => {}
        }
        Ok(())
    }

    fn collect_namespaces(&mut self, e: &BytesStart<'_>) -> GraphResult<()> {
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| self.error(err.to_string()))?
                .into_owned();
            if key == "xmlns" {
                self.namespaces.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.insert(prefix.to_string(), value.clone());
                self.graph.bind_prefix(prefix, value);
            }
        }
        Ok(())
    }

    fn attributes(&self, e: &BytesStart<'_>) -> GraphResult<Attrs> {
        let mut attrs = Attrs::default();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|err| self.error(err.to_string()))?
                .into_owned();
            if key == "xml:lang" {
                attrs.language = Some(value).filter(|v| !v.is_empty());
                continue;
            }
            if key.starts_with("xml:") {
                continue;
            }
            let name = self.resolve_qname(&key)?;
            let rdf_local = name.strip_prefix(vocab::RDF).map(str::to_owned);
            match rdf_local.as_deref() {
                Some("about") => attrs.about = Some(Uri::parse(value)?),
                Some("resource") => attrs.resource = Some(Uri::parse(value)?),
                Some("datatype") => attrs.datatype = Some(Uri::parse(value)?),
                Some("type") => attrs.types.push(Uri::parse(value)?),
                Some("nodeID") => return Err(self.error("blank nodes are not supported")),
                Some("parseType") => return Err(self.error("rdf:parseType is not supported")),
                Some(other) => return Err(self.error(format!("unsupported attribute rdf:{other}"))),
                None => attrs.properties.push((name, value)),
            }
        }
        Ok(attrs)
    }

    fn resolve_qname(&self, name: &str) -> GraphResult<Uri> {
        let (prefix, local) = name.split_once(':').unwrap_or(("", name));
        let ns = self
            .namespaces
            .get(prefix)
            .ok_or_else(|| self.error(format!("unbound namespace prefix in {name}")))?;
        Ok(Uri::parse(format!("{ns}{local}"))?)
    }
}

const RDF_ROOT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#RDF";
const RDF_DESCRIPTION: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Description";

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn writes_description_blocks() {
        let mut g = Graph::new();
        g.bind_prefix("dcterms", vocab::DCTERMS);
        g.add(uri("info:a"), uri(vocab::RDF_TYPE), uri("http://xmlns.com/foaf/0.1/Person"));
        g.add(uri("info:a"), uri("http://purl.org/dc/terms/title"), Literal::string("x & y"));
        let xml = serialize(&g).unwrap();
        assert!(xml.contains("xmlns:dcterms=\"http://purl.org/dc/terms/\""));
        assert!(xml.contains("<rdf:Description rdf:about=\"info:a\">"));
        assert!(xml.contains("<rdf:type rdf:resource=\"http://xmlns.com/foaf/0.1/Person\"/>"));
        assert!(xml.contains("<dcterms:title>x &amp; y</dcterms:title>"));
        assert!(!xml.contains("xmlns:ns0"));
    }

    #[test]
    fn generates_prefixes_for_unbound_namespaces() {
        let mut g = Graph::new();
        g.bind_prefix("ns0", "http://taken.org/");
        g.add(uri("info:a"), uri("http://unbound.org/v/p"), Literal::string("1"));
        let xml = serialize(&g).unwrap();
        assert!(xml.contains("xmlns:ns1=\"http://unbound.org/v/\""), "{xml}");
        assert!(xml.contains("<ns1:p>1</ns1:p>"));
    }

    #[test]
    fn rejects_predicates_without_local_name() {
        let mut g = Graph::new();
        g.add(uri("info:a"), uri("http://example.org/p/1"), Literal::string("x"));
        assert!(matches!(serialize(&g), Err(GraphError::Unsupported { .. })));
    }

    #[test]
    fn reads_typed_nodes_and_property_attributes() {
        let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:foaf="http://xmlns.com/foaf/0.1/"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <foaf:Person rdf:about="info:p1" dc:title="Dr">
    <foaf:name xml:lang="en">Ann</foaf:name>
    <foaf:knows rdf:resource="info:p2"/>
    <dc:description/>
  </foaf:Person>
  <rdf:Description rdf:about="info:p2" rdf:type="http://xmlns.com/foaf/0.1/Agent"/>
</rdf:RDF>"#;
        let mut g = parse(xml).unwrap();
        g.canonicalize();
        let expected: Vec<Triple> = {
            let mut v = vec![
                Triple::new(uri("info:p1"), uri(vocab::RDF_TYPE), uri("http://xmlns.com/foaf/0.1/Person")),
                Triple::new(uri("info:p1"), uri("http://purl.org/dc/elements/1.1/title"), Literal::string("Dr")),
                Triple::new(uri("info:p1"), uri("http://xmlns.com/foaf/0.1/name"), Literal::lang("Ann", "en")),
                Triple::new(uri("info:p1"), uri("http://xmlns.com/foaf/0.1/knows"), uri("info:p2")),
                Triple::new(uri("info:p1"), uri("http://purl.org/dc/elements/1.1/description"), Literal::string("")),
            ];
            v.sort();
            v
        };
        let p1: Vec<Triple> = g.iter().filter(|t| t.subject == uri("info:p1")).cloned().collect();
        assert_eq!(p1, expected);
        assert!(g.contains(&Triple::new(
            uri("info:p2"),
            uri(vocab::RDF_TYPE),
            uri("http://xmlns.com/foaf/0.1/Agent")
        )));
        assert_eq!(g.prefixes().get("foaf").map(String::as_str), Some(vocab::FOAF));
    }

    #[test]
    fn rejects_blank_and_nested_nodes() {
        let blank = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description/></rdf:RDF>"#;
        assert!(parse(blank).unwrap_err().is_malformed());

        let nested = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:ex="http://e.org/">
<rdf:Description rdf:about="info:a"><ex:p><rdf:Description rdf:about="info:b"/></ex:p></rdf:Description></rdf:RDF>"#;
        assert!(parse(nested).unwrap_err().is_malformed());

        assert!(parse("<rdf:RDF><unclosed").unwrap_err().is_malformed());
    }
}
