use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use vs_types::{Blob, BlobMeta, ContentHash};

use crate::error::StoreResult;
use crate::key::TableKey;
use crate::traits::{BlobStore, RecordTable};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock` and
/// cloned on read.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<ContentHash, Blob>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|b| b.meta.size)
            .sum()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn write(&self, blob: &Blob) -> StoreResult<ContentHash> {
        let hash = blob.hash();
        let mut map = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        // First write wins; a duplicate is the same content by construction.
        map.entry(hash).or_insert_with(|| blob.clone());
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Option<Blob>> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(hash).cloned())
    }

    fn meta(&self, hash: &ContentHash) -> StoreResult<Option<BlobMeta>> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(hash).map(|b| b.meta.clone()))
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(hash))
    }

    fn hashes(&self) -> StoreResult<Vec<ContentHash>> {
        let map = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut hashes: Vec<ContentHash> = map.keys().copied().collect();
        hashes.sort();
        Ok(hashes)
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

/// In-memory record table.
pub struct InMemoryTable<K, V> {
    rows: RwLock<HashMap<K, V>>,
}

impl<K: TableKey, V> InMemoryTable<K, V> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: TableKey, V> Default for InMemoryTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecordTable<K, V> for InMemoryTable<K, V>
where
    K: TableKey,
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn load(&self, key: &K) -> StoreResult<Option<V>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(key).cloned())
    }

    fn save(&self, key: &K, value: &V) -> StoreResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.insert(key.clone(), value.clone());
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<V>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vs_types::{AnalysisRecord, Identity, SignerSet};

    fn put(store: &InMemoryBlobStore, data: &[u8]) -> ContentHash {
        store.put(data.to_vec(), "text/plain", "f.txt").unwrap()
    }

    // -----------------------------------------------------------------------
    // Core put/get
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get() {
        let store = InMemoryBlobStore::new();
        let hash = put(&store, b"hello");
        let blob = store.get(&hash).unwrap().expect("should exist");
        assert_eq!(blob.bytes, b"hello");
        assert_eq!(blob.content_type(), "text/plain");
        assert_eq!(blob.hash(), hash);
    }

    #[test]
    fn get_missing_returns_none() {
        let store = InMemoryBlobStore::new();
        assert!(store.get(&ContentHash::of(b"missing")).unwrap().is_none());
        assert!(!store.exists(&ContentHash::of(b"missing")).unwrap());
    }

    // -----------------------------------------------------------------------
    // Dedup
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_put_is_noop_and_keeps_first_metadata() {
        let store = InMemoryBlobStore::new();
        let h1 = store.put(b"same".to_vec(), "application/pdf", "a.pdf").unwrap();
        let h2 = store.put(b"same".to_vec(), "text/plain", "b.txt").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.len(), 1);
        let meta = store.meta(&h1).unwrap().unwrap();
        assert_eq!(meta.filename, "a.pdf");
        assert_eq!(meta.content_type, "application/pdf");
    }

    #[test]
    fn different_content_different_hashes() {
        let store = InMemoryBlobStore::new();
        assert_ne!(put(&store, b"aaa"), put(&store, b"bbb"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 6);
    }

    #[test]
    fn hashes_are_sorted() {
        let store = InMemoryBlobStore::new();
        for data in [&b"x"[..], b"y", b"z"] {
            put(&store, data);
        }
        let hashes = store.hashes().unwrap();
        assert_eq!(hashes.len(), 3);
        assert!(hashes.windows(2).all(|w| w[0] <= w[1]));
    }

    proptest! {
        #[test]
        fn put_twice_stores_once(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let store = InMemoryBlobStore::new();
            let h1 = store.put(data.clone(), "", "a").unwrap();
            let h2 = store.put(data.clone(), "", "b").unwrap();
            prop_assert_eq!(h1, h2);
            prop_assert_eq!(store.len(), 1);
            prop_assert_eq!(store.get(&h1).unwrap().unwrap().bytes, data);
        }
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_puts_of_same_content_store_once() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryBlobStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(b"shared".to_vec(), "", &format!("{i}")).unwrap())
            })
            .collect();
        let hashes: Vec<ContentHash> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Tables
    // -----------------------------------------------------------------------

    #[test]
    fn table_save_load_list() {
        let table: InMemoryTable<ContentHash, AnalysisRecord> = InMemoryTable::new();
        let h = ContentHash::of(b"c");
        assert!(table.load(&h).unwrap().is_none());

        table.save(&h, &AnalysisRecord::pending(h)).unwrap();
        assert_eq!(table.load(&h).unwrap().unwrap().hash, h);

        table.save(&h, &AnalysisRecord::failed(h, "boom")).unwrap();
        assert!(table.load(&h).unwrap().unwrap().is_failed());
        assert_eq!(table.list().unwrap().len(), 1);
    }

    #[test]
    fn table_keyed_by_identity() {
        let table: InMemoryTable<Identity, SignerSet> = InMemoryTable::default();
        let id = Identity::parse("0xABC").unwrap();
        let set = SignerSet::empty(ContentHash::of(b"c"));
        table.save(&id, &set).unwrap();
        let lookup = Identity::parse("0xabc").unwrap();
        assert_eq!(table.load(&lookup).unwrap(), Some(set));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBlobStore::new();
        put(&store, b"x");
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBlobStore"));
        assert!(debug.contains("blob_count"));
    }
}
