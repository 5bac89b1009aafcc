use rdfo_graph::GraphError;
use rdfo_store::StoreError;
use rdfo_types::{TypeError, Uri};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("named graph not found: {0}")]
    NamedGraphNotFound(Uri),

    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("store already exists: {0}")]
    StoreAlreadyExists(String),

    /// Store names start with a letter and continue with letters or digits.
    #[error("not a valid store name: {0:?}")]
    InvalidStoreName(String),

    #[error("unknown organisation type: {0}")]
    UnknownOrgType(String),

    #[error("uri {uri} is not under {uri_base}")]
    UriOutsideStore { uri: String, uri_base: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EntityError {
    pub fn is_not_found(&self) -> bool {
        match self {
            EntityError::NamedGraphNotFound(_) | EntityError::StoreNotFound(_) => true,
            EntityError::Store(e) => e.is_not_found(),
            EntityError::Graph(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            EntityError::StoreAlreadyExists(_) => true,
            EntityError::Store(e) => e.is_already_exists(),
            EntityError::Graph(e) => e.is_already_exists(),
            _ => false,
        }
    }
}

pub type EntityResult<T> = Result<T, EntityError>;
