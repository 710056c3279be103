//! Content-addressed document storage for VicShield.
//!
//! Two kinds of storage live here:
//!
//! - a [`BlobStore`] holding uploaded documents keyed by their SHA-256
//!   [`ContentHash`](vs_types::ContentHash), so identical uploads are stored once;
//! - [`RecordTable`]s holding JSON records keyed by content hash or wallet
//!   identity (analyses, signer sets, KYC records).
//!
//! # Storage Backends
//!
//! - [`InMemoryBlobStore`] / [`InMemoryTable`] -- `HashMap`-based, for tests and embedding
//! - [`FsBlobStore`] / [`FsTable`] -- one file per key under a root directory,
//!   written through a temp file and an atomic rename
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; a duplicate `put` is a silent no-op.
//! 2. The hash is computed before any lookup.
//! 3. Concurrent reads are always safe.
//! 4. Tables never interpret records beyond serializing them.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod key;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FsBlobStore, FsTable};
pub use key::TableKey;
pub use memory::{InMemoryBlobStore, InMemoryTable};
pub use traits::{BlobStore, RecordTable};
