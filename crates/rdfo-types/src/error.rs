use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("not an absolute URI: {0:?}")]
    MalformedUri(String),

    #[error("unknown namespace prefix: {0}")]
    UnknownPrefix(String),

    #[error("namespace URI must end in '/' or '#': {0}")]
    NotANamespace(String),

    #[error("invalid dateTime literal: {0}")]
    InvalidDateTime(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
