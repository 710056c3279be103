//! Lazy, single-flight caches over the VicShield document store.
//!
//! - [`AnalysisCache`]: contract analysis keyed by content hash
//! - [`IdentityRecordStore`]: KYC verification keyed by wallet identity
//! - [`SignatureLedger`]: signer sets keyed by content hash
//!
//! The first request for a key makes its caller the owner of the external
//! call; every concurrent request for the same key waits for that owner's
//! result through [`SingleFlight`]. Results, including failures, are
//! persisted in a [`RecordTable`](vs_store::RecordTable), so a `Ready` record
//! is never recomputed, even after a restart.

pub mod analysis;
pub mod error;
pub mod flight;
pub mod identity;
pub mod lazy;
pub mod signatures;

pub use analysis::AnalysisCache;
pub use error::{CacheError, CacheResult};
pub use flight::{Flight, SingleFlight, Ticket, Waiter};
pub use identity::IdentityRecordStore;
pub use lazy::CachePolicy;
pub use signatures::SignatureLedger;

#[cfg(test)]
pub(crate) mod testing;
