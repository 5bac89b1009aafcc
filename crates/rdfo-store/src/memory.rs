use std::collections::BTreeMap;
use std::sync::RwLock;

use rdfo_crypto::{Checksum, ChecksumAlgorithm};

use crate::backend::ByteStore;
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct PartEntry {
    streams: BTreeMap<String, Vec<u8>>,
    high_water: u32,
}

type Objects = BTreeMap<String, BTreeMap<String, PartEntry>>;

/// In-memory byte store.
///
/// Intended for tests and embedding. Everything is held behind a `RwLock`;
/// bytes are cloned on read and write.
pub struct InMemoryByteStore {
    algorithm: ChecksumAlgorithm,
    objects: RwLock<Objects>,
}

impl InMemoryByteStore {
    pub fn new() -> Self {
        Self::with_algorithm(ChecksumAlgorithm::default())
    }

    pub fn with_algorithm(algorithm: ChecksumAlgorithm) -> Self {
        Self {
            algorithm,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all streams.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .flat_map(|parts| parts.values())
            .flat_map(|part| part.streams.values())
            .map(|bytes| bytes.len() as u64)
            .sum()
    }

    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryByteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_not_found(object_id: &str, part_id: &str, name: &str) -> StoreError {
    StoreError::StreamNotFound {
        object_id: object_id.to_string(),
        part_id: part_id.to_string(),
        name: name.to_string(),
    }
}

impl ByteStore for InMemoryByteStore {
    fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    fn exists(&self, object_id: &str) -> StoreResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(object_id))
    }

    fn create_object(&self, object_id: &str) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        if map.contains_key(object_id) {
            return Err(StoreError::ObjectAlreadyExists(object_id.to_string()));
        }
        map.insert(object_id.to_string(), BTreeMap::new());
        Ok(())
    }

    fn delete_object(&self, object_id: &str) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(object_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))
    }

    fn put_stream(
        &self,
        object_id: &str,
        part_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> StoreResult<Checksum> {
        let checksum = self.algorithm.digest(bytes);
        let mut map = self.objects.write().expect("lock poisoned");
        let parts = map
            .get_mut(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        parts
            .entry(part_id.to_string())
            .or_default()
            .streams
            .insert(name.to_string(), bytes.to_vec());
        Ok(checksum)
    }

    fn get_stream(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        let parts = map
            .get(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        parts
            .get(part_id)
            .and_then(|part| part.streams.get(name))
            .cloned()
            .ok_or_else(|| stream_not_found(object_id, part_id, name))
    }

    fn stream_exists(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(object_id)
            .and_then(|parts| parts.get(part_id))
            .is_some_and(|part| part.streams.contains_key(name)))
    }

    fn delete_stream(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        let parts = map
            .get_mut(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        parts
            .get_mut(part_id)
            .and_then(|part| part.streams.remove(name))
            .map(|_| ())
            .ok_or_else(|| stream_not_found(object_id, part_id, name))
    }

    fn delete_part(&self, object_id: &str, part_id: &str) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        let parts = map
            .get_mut(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        parts
            .remove(part_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::PartNotFound {
                object_id: object_id.to_string(),
                part_id: part_id.to_string(),
            })
    }

    fn list_parts(&self, object_id: &str) -> StoreResult<Vec<String>> {
        let map = self.objects.read().expect("lock poisoned");
        let parts = map
            .get(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        Ok(parts.keys().cloned().collect())
    }

    fn list_part_versions(&self, object_id: &str, part_id: &str) -> StoreResult<Vec<String>> {
        let map = self.objects.read().expect("lock poisoned");
        let parts = map
            .get(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        let part = parts.get(part_id).ok_or_else(|| StoreError::PartNotFound {
            object_id: object_id.to_string(),
            part_id: part_id.to_string(),
        })?;
        Ok(part.streams.keys().cloned().collect())
    }

    fn list_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.objects.read().expect("lock poisoned").keys().cloned().collect())
    }

    fn high_water(&self, object_id: &str, part_id: &str) -> StoreResult<u32> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(object_id)
            .and_then(|parts| parts.get(part_id))
            .map_or(0, |part| part.high_water))
    }

    fn set_high_water(&self, object_id: &str, part_id: &str, version: u32) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        let parts = map
            .get_mut(object_id)
            .ok_or_else(|| StoreError::ObjectNotFound(object_id.to_string()))?;
        let part = parts.entry(part_id.to_string()).or_default();
        part.high_water = part.high_water.max(version);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryByteStore")
            .field("algorithm", &self.algorithm)
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_delete_object() {
        let store = InMemoryByteStore::new();
        assert!(store.is_empty());
        store.create_object("a").unwrap();
        assert!(store.exists("a").unwrap());
        assert!(store.create_object("a").unwrap_err().is_already_exists());
        store.delete_object("a").unwrap();
        assert!(!store.exists("a").unwrap());
        assert!(store.delete_object("a").unwrap_err().is_not_found());
    }

    #[test]
    fn streams_roundtrip_with_checksum() {
        let store = InMemoryByteStore::new();
        store.create_object("a").unwrap();
        let sum = store.put_stream("a", "p", "p_1", b"hello").unwrap();
        assert!(sum.verify(b"hello"));
        assert_eq!(store.get_stream("a", "p", "p_1").unwrap(), b"hello");
        assert!(store.stream_exists("a", "p", "p_1").unwrap());
        assert!(!store.stream_exists("a", "p", "p_2").unwrap());
        assert_eq!(store.total_bytes(), 5);
    }

    #[test]
    fn put_into_missing_object_fails() {
        let store = InMemoryByteStore::new();
        let err = store.put_stream("nope", "p", "p_1", b"x").unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound(_)));
    }

    #[test]
    fn listing_and_deletion() {
        let store = InMemoryByteStore::new();
        store.create_object("a").unwrap();
        store.put_stream("a", "p", "p_1", b"1").unwrap();
        store.put_stream("a", "p", "p_2", b"2").unwrap();
        store.put_stream("a", "q", "q_1", b"3").unwrap();
        assert_eq!(store.list_parts("a").unwrap(), vec!["p", "q"]);
        assert_eq!(store.list_part_versions("a", "p").unwrap(), vec!["p_1", "p_2"]);

        store.delete_stream("a", "p", "p_1").unwrap();
        assert!(matches!(
            store.delete_stream("a", "p", "p_1").unwrap_err(),
            StoreError::StreamNotFound { .. }
        ));
        store.delete_part("a", "q").unwrap();
        assert_eq!(store.list_parts("a").unwrap(), vec!["p"]);
        assert!(matches!(
            store.list_part_versions("a", "q").unwrap_err(),
            StoreError::PartNotFound { .. }
        ));
    }

    #[test]
    fn high_water_only_grows() {
        let store = InMemoryByteStore::new();
        store.create_object("a").unwrap();
        assert_eq!(store.high_water("a", "p").unwrap(), 0);
        store.set_high_water("a", "p", 3).unwrap();
        store.set_high_water("a", "p", 2).unwrap();
        assert_eq!(store.high_water("a", "p").unwrap(), 3);
    }

    #[test]
    fn list_ids_sorted() {
        let store = InMemoryByteStore::new();
        for id in ["b", "a", "c"] {
            store.create_object(id).unwrap();
        }
        assert_eq!(store.list_ids().unwrap(), vec!["a", "b", "c"]);
        store.clear();
        assert_eq!(store.len(), 0);
    }
}
