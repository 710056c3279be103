use async_trait::async_trait;
use vs_types::Blob;

use crate::error::OracleError;

/// Produces a contract analysis for a stored document.
///
/// Returns the provider's raw text. The text is untrusted: callers validate
/// it with [`parse_analysis`](crate::parse_analysis).
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, blob: &Blob) -> Result<String, OracleError>;
}

/// Examines an identity document image.
///
/// Returns the provider's raw text, validated with
/// [`parse_verification`](crate::parse_verification).
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_identity(&self, evidence: &Blob) -> Result<String, OracleError>;
}
