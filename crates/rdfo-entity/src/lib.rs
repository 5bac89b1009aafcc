//! Versioned RDF entities for rdfo.
//!
//! An entity is a URI-identified object made of a root description, a
//! manifest describing its parts, and any number of named graphs. A
//! [`StoredEntity`] binds one to a [`PartStore`](rdfo_store::PartStore):
//! edits accumulate in memory, [`commit`](StoredEntity::commit) persists the
//! dirty components and audits the batch, and
//! [`revert`](StoredEntity::revert) reloads from the store.
//!
//! # Temporal Queries
//!
//! Named graphs carry a validity window. [`Entity::assertions_at`] merges
//! the root with every graph valid at a given instant, and
//! [`OrganisationUnit`] wraps this as time-bounded assertion groups.
//!
//! # Stores
//!
//! [`EntityFactory`] hands out entities for one store; [`StoreRegistry`]
//! manages a directory of named stores.

pub mod change;
pub mod entity;
pub mod error;
pub mod factory;
pub mod organisation;
pub mod stored;

pub use change::{ChangeContext, ChangeKind, ChangeRecord, CommitSummary};
pub use entity::{Entity, RDF_XML};
pub use error::{EntityError, EntityResult};
pub use factory::{EntityFactory, StoreRegistry, STORE_CONFIG_FILE};
pub use organisation::{OrgType, OrganisationUnit};
pub use stored::StoredEntity;

// Re-export the types callers need alongside entities
pub use rdfo_graph::{Manifest, NamedGraph, RdfFormat, TripleSet, Validity, ValidityOutcome};
pub use rdfo_store::{PartStore, PutReceipt, StoreConfig};
pub use rdfo_types::{Literal, NamespaceRegistry, Term, Uri};
