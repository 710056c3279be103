use vs_types::{ContentHash, Identity};

/// A key a [`RecordTable`](crate::RecordTable) can be indexed by.
///
/// `storage_key` must be injective and safe to use as a file name.
pub trait TableKey: Clone + Eq + std::hash::Hash + Send + Sync + 'static {
    fn storage_key(&self) -> String;
}

impl TableKey for ContentHash {
    fn storage_key(&self) -> String {
        self.to_hex()
    }
}

// Identities are unbounded and may contain characters that are not valid in
// file names, so the key is the SHA-256 of the normalized identity. Records
// carry the identity itself.
impl TableKey for Identity {
    fn storage_key(&self) -> String {
        ContentHash::of(self.as_str().as_bytes()).to_hex()
    }
}
