use std::sync::Arc;

use tracing::{info, warn};
use vs_oracle::{parse_verification, IdentityVerifier};
use vs_store::{BlobStore, RecordTable};
use vs_types::{ContentHash, Identity, IdentityRecord};

use crate::error::{CacheError, CacheResult};
use crate::lazy::{CachePolicy, LazyTable};

/// KYC verification records, one per identity.
///
/// A `Ready` record answers every later request, including ones that bring
/// new evidence; only [`reverify`](Self::reverify) replaces it.
pub struct IdentityRecordStore {
    blobs: Arc<dyn BlobStore>,
    verifier: Arc<dyn IdentityVerifier>,
    records: LazyTable<Identity, IdentityRecord>,
}

impl IdentityRecordStore {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        table: Arc<dyn RecordTable<Identity, IdentityRecord>>,
        verifier: Arc<dyn IdentityVerifier>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            blobs,
            verifier,
            records: LazyTable::new("identities", table, policy),
        }
    }

    /// Return the settled verification of `identity`, verifying `evidence`
    /// if there is none.
    pub async fn get_or_verify(
        &self,
        identity: &Identity,
        evidence: &ContentHash,
    ) -> CacheResult<IdentityRecord> {
        self.verify(identity, evidence, false).await
    }

    /// Verify `evidence` even if a settled record exists. Joins a
    /// verification of `identity` that is already running instead of
    /// starting a second one.
    pub async fn reverify(
        &self,
        identity: &Identity,
        evidence: &ContentHash,
    ) -> CacheResult<IdentityRecord> {
        self.verify(identity, evidence, true).await
    }

    /// The stored record, if any. Never verifies.
    pub fn get(&self, identity: &Identity) -> CacheResult<Option<IdentityRecord>> {
        self.records.load(identity)
    }

    pub fn list(&self) -> CacheResult<Vec<IdentityRecord>> {
        let mut records = self.records.list()?;
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(records)
    }

    async fn verify(
        &self,
        identity: &Identity,
        evidence: &ContentHash,
        force: bool,
    ) -> CacheResult<IdentityRecord> {
        let blobs = Arc::clone(&self.blobs);
        let verifier = Arc::clone(&self.verifier);
        let timeout = self.records.policy().call_timeout;
        let who = identity.clone();
        let evidence = *evidence;

        self.records
            .get_or_compute(
                identity,
                force,
                || match self.blobs.exists(&evidence)? {
                    true => Ok(()),
                    false => Err(CacheError::BlobNotFound(evidence)),
                },
                IdentityRecord::pending(identity.clone(), evidence),
                move || async move {
                    let blob = blobs
                        .get(&evidence)?
                        .ok_or(CacheError::BlobNotFound(evidence))?;
                    info!(identity = %who.short_id(), evidence = %evidence.short_hex(), "verifying identity");

                    let outcome =
                        match tokio::time::timeout(timeout, verifier.verify_identity(&blob)).await {
                            Ok(Ok(text)) => parse_verification(&text).map_err(|e| e.to_string()),
                            Ok(Err(e)) => Err(e.to_string()),
                            Err(_) => Err(format!("verifier timed out after {}s", timeout.as_secs())),
                        };

                    Ok(match outcome {
                        Ok(verification) => {
                            info!(identity = %who.short_id(), valid = verification.is_valid, "identity verified");
                            IdentityRecord::ready(who, evidence, verification)
                        }
                        Err(reason) => {
                            warn!(identity = %who.short_id(), %reason, "identity verification failed");
                            IdentityRecord::failed(who, evidence, reason)
                        }
                    })
                },
            )
            .await
    }
}
