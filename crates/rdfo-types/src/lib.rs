//! Foundation types for rdfo.
//!
//! This crate provides the identifier and term types used throughout the
//! workspace. Every other rdfo crate depends on `rdfo-types`.
//!
//! # Key Types
//!
//! - [`Uri`]: Absolute URI used for subjects, predicates, and resources
//! - [`Literal`]: Lexical value with optional datatype or language tag
//! - [`Term`]: Object position of a triple: a URI or a literal
//! - [`NamespaceRegistry`]: Shared prefix table for shorthand expansion
//! - [`IntoUri`] / [`IntoTerm`]: Conversions resolved against a registry

pub mod error;
pub mod namespace;
pub mod term;
pub mod uri;
pub mod vocab;

pub use error::{TypeError, TypeResult};
pub use namespace::{IntoTerm, IntoUri, NamespaceRegistry};
pub use term::{Literal, Term};
pub use uri::Uri;
