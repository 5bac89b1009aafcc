//! Versioned part storage for rdfo.
//!
//! An object is a named bag of parts; every write to a part creates a new
//! numbered version with a checksum. [`PartStore`] owns version allocation,
//! identifier rules and the audit trail, and delegates raw bytes to a
//! [`ByteStore`] backend.
//!
//! # Storage Backends
//!
//! - [`InMemoryByteStore`]: nested maps, for tests and embedding
//! - [`FsByteStore`]: sharded directory tree with atomic writes
//!
//! # Audit
//!
//! Every create, update and delete is published to an optional
//! [`AuditSink`] as an [`AuditEvent`]. [`InMemoryAuditLog`] collects events
//! in memory; [`JsonLinesAuditSink`] appends them to a file.
//!
//! # Design Rules
//!
//! 1. Version numbers start at 1 and are never renumbered.
//! 2. Version allocation is serialized within a process.
//! 3. A stream is visible whole or not at all.
//! 4. All I/O and audit errors are propagated, never silently ignored.

pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod part_store;

pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditLog, JsonLinesAuditSink};
pub use backend::{parse_versioned_name, versioned_name, ByteStore};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use fs::FsByteStore;
pub use memory::InMemoryByteStore;
pub use part_store::{PartContent, PartStore, PutReceipt, MANIFEST_PART, ROOT_PART};
