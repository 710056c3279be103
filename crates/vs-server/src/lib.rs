//! HTTP API for VicShield.
//!
//! Clients upload a contract or an identity document, then ask for its
//! analysis by content hash. The analysis is computed on first request and
//! cached; signatures and KYC results are recorded against the same hashes.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{CacheConfig, OracleConfig, ServerConfig, StorageBackend, StorageConfig};
pub use error::{ServerError, ServerResult};
pub use server::VsServer;
pub use state::{AppState, Oracles, Stores};
