use std::fmt::Write;

use rdfo_types::{Literal, Term, Uri};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Graph, Triple};

const FORMAT: &str = "N-Triples";

pub(super) fn serialize(graph: &Graph) -> String {
    let mut out = String::new();
    for (prefix, ns) in graph.prefixes() {
        let _ = writeln!(out, "# @prefix {prefix}: <{}> .", escape_iri(ns));
    }
    for t in graph {
        let _ = write!(out, "<{}> <{}> ", escape_iri(t.subject.as_str()), escape_iri(t.predicate.as_str()));
        match &t.object {
            Term::Uri(u) => {
                let _ = write!(out, "<{}>", escape_iri(u.as_str()));
            }
            Term::Literal(l) => write_literal(&mut out, l),
        }
        out.push_str(" .\n");
    }
    out
}

fn write_literal(out: &mut String, lit: &Literal) {
    out.push('"');
    for c in lit.lexical.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    if let Some(lang) = &lit.language {
        let _ = write!(out, "@{lang}");
    } else if let Some(dt) = &lit.datatype {
        let _ = write!(out, "^^<{}>", escape_iri(dt.as_str()));
    }
}

fn escape_iri(iri: &str) -> String {
    let mut out = String::with_capacity(iri.len());
    for c in iri.chars() {
        if matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\') || c.is_control() {
            let _ = write!(out, "\\u{:04X}", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

pub(super) fn parse(text: &str) -> GraphResult<Graph> {
    let mut graph = Graph::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if let Some((prefix, ns)) = parse_prefix_comment(comment) {
                graph.bind_prefix(prefix, ns);
            }
            continue;
        }
        let mut cursor = Cursor::new(line, idx + 1);
        graph.push(cursor.statement()?);
    }
    Ok(graph)
}

/// `@prefix p: <ns> .` inside a comment. Anything else is an ordinary comment.
fn parse_prefix_comment(comment: &str) -> Option<(String, String)> {
    let rest = comment.trim().strip_prefix("@prefix")?.trim_start();
    let (prefix, rest) = rest.split_once(':')?;
    let rest = rest.trim();
    let rest = rest.strip_suffix('.').unwrap_or(rest).trim_end();
    let iri = rest.strip_prefix('<')?.strip_suffix('>')?;
    let prefix = prefix.trim();
    if prefix.is_empty() || prefix.contains(char::is_whitespace) {
        return None;
    }
    Some((prefix.to_string(), unescape_iri(iri)?))
}

fn unescape_iri(iri: &str) -> Option<String> {
    let mut out = String::with_capacity(iri.len());
    let mut chars = iri.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let width = match chars.next()? {
            'u' => 4,
            'U' => 8,
            _ => return None,
        };
        let hex: String = chars.by_ref().take(width).collect();
        out.push(decode_hex(&hex, width)?);
    }
    Some(out)
}

fn decode_hex(hex: &str, width: usize) -> Option<char> {
    if hex.len() != width {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

struct Cursor<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(line_text: &'a str, line: usize) -> Self {
        Self {
            rest: line_text,
            line,
        }
    }

    fn error(&self, message: impl Into<String>) -> GraphError {
        GraphError::Malformed {
            format: FORMAT,
            line: self.line,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn statement(&mut self) -> GraphResult<Triple> {
        let subject = self.subject()?;
        self.skip_ws();
        let predicate = self.iri()?;
        self.skip_ws();
        let object = self.object()?;
        self.skip_ws();
        self.rest = self
            .rest
            .strip_prefix('.')
            .ok_or_else(|| self.error("expected '.' at end of statement"))?;
        self.skip_ws();
        if !self.rest.is_empty() && !self.rest.starts_with('#') {
            return Err(self.error(format!("unexpected trailing input: {}", self.rest)));
        }
        Ok(Triple::new(subject, predicate, object))
    }

    fn subject(&mut self) -> GraphResult<Uri> {
        if self.rest.starts_with("_:") {
            return Err(self.error("blank nodes are not supported"));
        }
        self.iri()
    }

    fn iri(&mut self) -> GraphResult<Uri> {
        let body = self
            .rest
            .strip_prefix('<')
            .ok_or_else(|| self.error("expected '<'"))?;
        let end = body.find('>').ok_or_else(|| self.error("unterminated IRI"))?;
        let raw = &body[..end];
        self.rest = &body[end + 1..];
        let text = unescape_iri(raw).ok_or_else(|| self.error(format!("bad escape in IRI <{raw}>")))?;
        Ok(Uri::parse(text)?)
    }

    fn object(&mut self) -> GraphResult<Term> {
        match self.rest.chars().next() {
            Some('<') => Ok(Term::Uri(self.iri()?)),
            Some('"') => Ok(Term::Literal(self.literal()?)),
            Some('_') => Err(self.error("blank nodes are not supported")),
            _ => Err(self.error("expected IRI or literal object")),
        }
    }

    fn literal(&mut self) -> GraphResult<Literal> {
        let rest: &'a str = self.rest;
        let mut chars = rest[1..].char_indices();
        let mut lexical = String::new();
        let end = loop {
            let (i, c) = chars.next().ok_or_else(|| self.error("unterminated literal"))?;
            match c {
                '"' => break i + 2,
                '\\' => {
                    let (_, esc) = chars.next().ok_or_else(|| self.error("dangling escape"))?;
                    let decoded = match esc {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        'b' => '\u{8}',
                        'f' => '\u{c}',
                        '"' => '"',
                        '\'' => '\'',
                        '\\' => '\\',
                        'u' | 'U' => {
                            let width = if esc == 'u' { 4 } else { 8 };
                            let hex: String = chars.by_ref().take(width).map(|(_, c)| c).collect();
                            decode_hex(&hex, width)
                                .ok_or_else(|| self.error(format!("bad unicode escape \\{esc}{hex}")))?
                        }
                        other => return Err(self.error(format!("unknown escape \\{other}"))),
                    };
                    lexical.push(decoded);
                }
                c => lexical.push(c),
            }
        };
        self.rest = &rest[end..];

        if let Some(tag) = self.rest.strip_prefix('@') {
            let len = tag
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .unwrap_or(tag.len());
            if len == 0 {
                return Err(self.error("empty language tag"));
            }
            self.rest = &tag[len..];
            return Ok(Literal::lang(lexical, &tag[..len]));
        }
        if let Some(dt) = self.rest.strip_prefix("^^") {
            self.rest = dt;
            let datatype = self.iri()?;
            return Ok(Literal::typed(lexical, datatype));
        }
        Ok(Literal::string(lexical))
    }
}
