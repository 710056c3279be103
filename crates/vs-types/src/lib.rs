//! Foundation types for VicShield.
//!
//! This crate provides the keys and records shared by every other VicShield
//! crate. Nothing here performs I/O.
//!
//! # Key Types
//!
//! - [`ContentHash`]: SHA-256 content address of an uploaded document
//! - [`Identity`]: Normalized wallet address (or other principal)
//! - [`Blob`] / [`BlobMeta`]: Stored document bytes and their metadata
//! - [`AnalysisRecord`]: Cached AI analysis of a contract, keyed by hash
//! - [`IdentityRecord`]: Cached KYC verification, keyed by identity
//! - [`SignerSet`]: Identities that signed a contract
//! - [`RecordStatus`]: `Pending` / `Ready` / `Failed` lifecycle

pub mod blob;
pub mod error;
pub mod hash;
pub mod identity;
pub mod record;

pub use blob::{Blob, BlobMeta, DEFAULT_CONTENT_TYPE};
pub use error::TypeError;
pub use hash::ContentHash;
pub use identity::Identity;
pub use record::{
    clamp_score, Analysis, AnalysisRecord, Confidence, ExtractedFields, IdentityRecord,
    RecordStatus, SignerSet, Verification, MAX_SCORE,
};
