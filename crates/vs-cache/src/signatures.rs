use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};
use vs_store::RecordTable;
use vs_types::{ContentHash, Identity, SignerSet};

use crate::error::CacheResult;

/// Who has signed which document.
///
/// Sets only grow. The ledger does not check that the document or its
/// analysis exists.
pub struct SignatureLedger {
    table: Arc<dyn RecordTable<ContentHash, SignerSet>>,
    // Held across load and save so concurrent adds cannot lose an update.
    write_lock: Mutex<()>,
}

impl SignatureLedger {
    pub fn new(table: Arc<dyn RecordTable<ContentHash, SignerSet>>) -> Self {
        Self {
            table,
            write_lock: Mutex::new(()),
        }
    }

    /// Record `signer` against `hash` and return the resulting set.
    /// Adding a signer twice leaves the set unchanged.
    pub fn add_signer(&self, hash: &ContentHash, signer: Identity) -> CacheResult<SignerSet> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut set = self
            .table
            .load(hash)?
            .unwrap_or_else(|| SignerSet::empty(*hash));

        let who = signer.short_id();
        if set.insert(signer) {
            self.table.save(hash, &set)?;
            info!(hash = %hash.short_hex(), signer = %who, signers = set.len(), "contract signed");
        } else {
            debug!(hash = %hash.short_hex(), signer = %who, "already signed");
        }
        Ok(set)
    }

    /// Signers of `hash`; empty if nobody has signed.
    pub fn get_signers(&self, hash: &ContentHash) -> CacheResult<BTreeSet<Identity>> {
        Ok(self
            .table
            .load(hash)?
            .map(|set| set.signers)
            .unwrap_or_default())
    }
}
