//! Checksums for rdfo part storage.
//!
//! Every stored part version carries a checksum computed while its bytes are
//! written. The algorithm is chosen per store and recorded alongside the
//! digest (`blake3:…` or `sha256:…`), so stored checksums stay verifiable
//! even if a later store is configured differently.
//!
//! Digests come from the `blake3` and `sha2` crates.

pub mod checksum;

pub use checksum::{Checksum, ChecksumAlgorithm, ChecksumError, ChecksumHasher};
