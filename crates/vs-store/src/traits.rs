use serde::de::DeserializeOwned;
use serde::Serialize;
use vs_types::{Blob, BlobMeta, ContentHash};

use crate::error::StoreResult;
use crate::key::TableKey;

/// Content-addressed document store.
///
/// All implementations must satisfy these invariants:
/// - Equal bytes always resolve to the same [`ContentHash`], and the store
///   holds at most one blob per hash.
/// - Writing content that is already present is a no-op that still returns
///   its hash; the metadata of the first write is kept.
/// - Blobs are never modified or deleted.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlobStore: Send + Sync {
    /// Store a prepared blob and return its hash.
    fn write(&self, blob: &Blob) -> StoreResult<ContentHash>;

    /// Read a blob by hash. Returns `Ok(None)` if it was never stored.
    fn get(&self, hash: &ContentHash) -> StoreResult<Option<Blob>>;

    /// Read only the metadata of a blob.
    fn meta(&self, hash: &ContentHash) -> StoreResult<Option<BlobMeta>>;

    /// Check whether a blob exists.
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// All stored hashes, sorted.
    fn hashes(&self) -> StoreResult<Vec<ContentHash>>;

    /// Number of stored blobs.
    fn count(&self) -> StoreResult<usize> {
        Ok(self.hashes()?.len())
    }

    /// Hash `bytes` and store them.
    fn put(&self, bytes: Vec<u8>, content_type: &str, filename: &str) -> StoreResult<ContentHash> {
        self.write(&Blob::new(bytes, content_type, filename))
    }
}

/// Keyed table of serializable records.
///
/// Lookups are by exact key. `save` replaces any previous value; callers
/// that need read-modify-write atomicity serialize access themselves.
pub trait RecordTable<K: TableKey, V>: Send + Sync
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Returns `Ok(None)` if no record exists for `key`.
    fn load(&self, key: &K) -> StoreResult<Option<V>>;

    fn save(&self, key: &K, value: &V) -> StoreResult<()>;

    /// Every record in the table, in unspecified order.
    fn list(&self) -> StoreResult<Vec<V>>;
}
