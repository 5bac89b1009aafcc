use rdfo_types::{TypeError, Uri};
use thiserror::Error;

/// Errors produced by graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("manifest item already exists: {0}")]
    ItemAlreadyExists(Uri),

    #[error("manifest item not found: {0}")]
    ItemNotFound(Uri),

    #[error("rdf:type object must be a URI, got literal {0:?}")]
    LiteralType(String),

    #[error("malformed {format} input at line {line}: {message}")]
    Malformed {
        format: &'static str,
        line: usize,
        message: String,
    },

    #[error("cannot serialize as {format}: {message}")]
    Unsupported {
        format: &'static str,
        message: String,
    },

    #[error("unknown RDF format: {0}")]
    UnknownFormat(String),

    #[error("validity window ends before it starts: {from} > {until}")]
    InvalidValidity { from: String, until: String },
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::ItemNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, GraphError::ItemAlreadyExists(_))
    }

    /// Parse failures and unparseable URIs.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            GraphError::Malformed { .. } | GraphError::Type(_) | GraphError::LiteralType(_)
        )
    }
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
