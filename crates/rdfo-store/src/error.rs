use std::path::PathBuf;

use rdfo_crypto::ChecksumError;
use rdfo_graph::GraphError;
use rdfo_types::TypeError;

/// Errors from part store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object does not exist in the store.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Attempted to create an object that already exists.
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// The part was never written for this object.
    #[error("part {part_id} not found in object {object_id}")]
    PartNotFound { object_id: String, part_id: String },

    /// The part exists but this version does not.
    #[error("version {version} of part {part_id} not found in object {object_id}")]
    VersionNotFound {
        object_id: String,
        part_id: String,
        version: u32,
    },

    /// A versioned stream is missing from the backend.
    #[error("stream {name} of part {part_id} not found in object {object_id}")]
    StreamNotFound {
        object_id: String,
        part_id: String,
        name: String,
    },

    /// Version numbers start at 1.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Object or part identifier that cannot be stored or turned into a URI.
    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    /// The directory exists but was not created as a store.
    #[error("not an rdfo store: {}", .0.display())]
    NotAStore(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A remote backend answered with a non-success status.
    #[error("backend failure during {action}: status {status}: {payload}")]
    BackendFailure {
        action: String,
        status: u16,
        payload: String,
    },

    /// The audit sink rejected an event.
    #[error("audit sink error: {0}")]
    Audit(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::ObjectNotFound(_)
            | StoreError::PartNotFound { .. }
            | StoreError::VersionNotFound { .. }
            | StoreError::StreamNotFound { .. } => true,
            StoreError::Graph(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            StoreError::ObjectAlreadyExists(_) => true,
            StoreError::Graph(e) => e.is_already_exists(),
            _ => false,
        }
    }

    /// Parse failures, bad identifiers and unparseable URIs.
    pub fn is_malformed(&self) -> bool {
        match self {
            StoreError::InvalidId(_) | StoreError::InvalidVersion(_) | StoreError::Type(_) => true,
            StoreError::Graph(e) => e.is_malformed(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(e: toml::de::Error) -> Self {
        StoreError::InvalidConfig(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
