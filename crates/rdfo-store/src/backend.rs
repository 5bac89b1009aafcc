use rdfo_crypto::{Checksum, ChecksumAlgorithm};

use crate::error::StoreResult;

/// Key-value byte store addressed by `(object_id, part_id, versioned_name)`.
///
/// Backends store opaque bytes; version numbering, metadata and auditing
/// live in [`PartStore`](crate::PartStore). Implementations must satisfy:
/// - The same object id always maps to the same location.
/// - A stream is either fully written or absent; readers never observe a
///   partial write.
/// - Listing order is unspecified; callers sort.
/// - All I/O errors are propagated, never silently ignored.
pub trait ByteStore: Send + Sync {
    /// Checksum algorithm applied by [`ByteStore::put_stream`].
    fn algorithm(&self) -> ChecksumAlgorithm;

    fn exists(&self, object_id: &str) -> StoreResult<bool>;

    /// Fails with `ObjectAlreadyExists` if present.
    fn create_object(&self, object_id: &str) -> StoreResult<()>;

    /// Remove an object and everything in it. Fails with `ObjectNotFound`.
    fn delete_object(&self, object_id: &str) -> StoreResult<()>;

    /// Write one versioned stream, replacing any previous content, and
    /// return its checksum. Fails with `ObjectNotFound`.
    fn put_stream(
        &self,
        object_id: &str,
        part_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> StoreResult<Checksum>;

    fn get_stream(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<Vec<u8>>;

    fn stream_exists(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<bool>;

    /// Fails with `StreamNotFound`.
    fn delete_stream(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<()>;

    /// Remove a part with all its streams. Fails with `PartNotFound`.
    fn delete_part(&self, object_id: &str, part_id: &str) -> StoreResult<()>;

    fn list_parts(&self, object_id: &str) -> StoreResult<Vec<String>>;

    /// Stream names of one part. Fails with `PartNotFound`.
    fn list_part_versions(&self, object_id: &str, part_id: &str) -> StoreResult<Vec<String>>;

    fn list_ids(&self) -> StoreResult<Vec<String>>;

    /// Highest version ever allocated for a part, including deleted ones.
    ///
    /// Backends that cannot persist this return 0; version numbers are then
    /// derived from the surviving streams alone, and deleting the newest
    /// version lets its number be allocated again.
    fn high_water(&self, _object_id: &str, _part_id: &str) -> StoreResult<u32> {
        Ok(0)
    }

    fn set_high_water(&self, _object_id: &str, _part_id: &str, _version: u32) -> StoreResult<()> {
        Ok(())
    }
}

/// Stream name for one version of a part: `{part}{prefix}{version}`.
pub fn versioned_name(part_id: &str, prefix: &str, version: u32) -> String {
    format!("{part_id}{prefix}{version}")
}

/// Version number encoded in a stream name, if it belongs to `part_id`.
pub fn parse_versioned_name(part_id: &str, prefix: &str, name: &str) -> Option<u32> {
    let digits = name.strip_prefix(part_id)?.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|v| *v > 0)
}
