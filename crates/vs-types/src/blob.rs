use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Content type recorded when the uploader supplied none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata stored alongside a blob's bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    pub hash: ContentHash,
    pub content_type: String,
    pub filename: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// An uploaded document: its bytes plus the metadata of the first upload.
///
/// Blobs are immutable. `meta.hash` is always the hash of `bytes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub meta: BlobMeta,
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Build a blob, hashing its bytes. A blank content type falls back to
    /// [`DEFAULT_CONTENT_TYPE`].
    pub fn new(bytes: Vec<u8>, content_type: &str, filename: &str) -> Self {
        let content_type = match content_type.trim() {
            "" => DEFAULT_CONTENT_TYPE.to_string(),
            ct => ct.to_string(),
        };
        let meta = BlobMeta {
            hash: ContentHash::of(&bytes),
            content_type,
            filename: filename.to_string(),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        };
        Self { meta, bytes }
    }

    pub fn hash(&self) -> ContentHash {
        self.meta.hash
    }

    pub fn content_type(&self) -> &str {
        &self.meta.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
