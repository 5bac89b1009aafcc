//! In-memory RDF metadata for rdfo.
//!
//! Entities describe themselves with three kinds of graph:
//!
//! - [`TripleSet`]: statements about one subject (the entity's root)
//! - [`Manifest`]: ordered items, each with a `TripleSet`, describing the
//!   entity's parts and sub-graphs
//! - [`NamedGraph`]: a manifest scoped to a [`Validity`] window
//!
//! All three track whether they changed since they were last persisted and
//! serialize through [`RdfFormat`] (N-Triples or RDF/XML).

pub mod error;
pub mod format;
pub mod graph;
pub mod manifest;
pub mod named_graph;
pub mod triples;
pub mod validity;

pub use error::{GraphError, GraphResult};
pub use format::RdfFormat;
pub use graph::{Graph, Triple};
pub use manifest::{ItemSelector, Manifest};
pub use named_graph::NamedGraph;
pub use triples::TripleSet;
pub use validity::{Validity, ValidityOutcome};
