use std::sync::Arc;

use thiserror::Error;
use vs_store::StoreError;
use vs_types::ContentHash;

/// Errors from cache operations.
///
/// Cloneable because one result is shared by every caller waiting on the
/// same in-flight computation. Analyzer failures are not errors here: they
/// are stored as `Failed` records.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The document the computation needs was never uploaded.
    #[error("blob not found: {0}")]
    BlobNotFound(ContentHash),

    #[error("storage error: {0}")]
    Store(Arc<StoreError>),

    /// The owning computation ended without producing a result.
    #[error("computation for this key was abandoned")]
    Abandoned,
}

impl From<StoreError> for CacheError {
    fn from(e: StoreError) -> Self {
        Self::Store(Arc::new(e))
    }
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
