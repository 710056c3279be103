use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use vs_cache::{AnalysisCache, IdentityRecordStore, SignatureLedger};
use vs_oracle::{Analyzer, IdentityVerifier, OpenAiAnalyzer, OpenAiClient, OpenAiIdentityVerifier};
use vs_store::{
    BlobStore, FsBlobStore, FsTable, InMemoryBlobStore, InMemoryTable, RecordTable,
};
use vs_types::{AnalysisRecord, ContentHash, Identity, IdentityRecord, SignerSet};

use crate::config::{OracleConfig, ServerConfig, StorageBackend, StorageConfig};
use crate::error::ServerResult;

/// The blob store and the three record tables.
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub analyses: Arc<dyn RecordTable<ContentHash, AnalysisRecord>>,
    pub signers: Arc<dyn RecordTable<ContentHash, SignerSet>>,
    pub identities: Arc<dyn RecordTable<Identity, IdentityRecord>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            blobs: Arc::new(InMemoryBlobStore::new()),
            analyses: Arc::new(InMemoryTable::<ContentHash, AnalysisRecord>::new()),
            signers: Arc::new(InMemoryTable::<ContentHash, SignerSet>::new()),
            identities: Arc::new(InMemoryTable::<Identity, IdentityRecord>::new()),
        }
    }

    /// Open (creating if needed) the on-disk layout under `data_dir`.
    pub fn open(data_dir: &Path) -> ServerResult<Self> {
        Ok(Self {
            blobs: Arc::new(FsBlobStore::open(data_dir.join("blobs"))?),
            analyses: Arc::new(FsTable::<ContentHash, AnalysisRecord>::open(
                data_dir.join("analyses"),
            )?),
            signers: Arc::new(FsTable::<ContentHash, SignerSet>::open(
                data_dir.join("signers"),
            )?),
            identities: Arc::new(FsTable::<Identity, IdentityRecord>::open(
                data_dir.join("identities"),
            )?),
        })
    }

    pub fn from_config(config: &StorageConfig) -> ServerResult<Self> {
        match config.backend {
            StorageBackend::Memory => {
                warn!("using in-memory storage; nothing survives a restart");
                Ok(Self::in_memory())
            }
            StorageBackend::Fs => {
                info!(data_dir = %config.data_dir.display(), "opening filesystem storage");
                Self::open(&config.data_dir)
            }
        }
    }
}

/// The external analysis and verification services.
pub struct Oracles {
    pub analyzer: Arc<dyn Analyzer>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl Oracles {
    /// OpenAI-compatible clients. The API key is read from the environment
    /// variable named by `api_key_env`; without it requests go out
    /// unauthenticated, which local endpoints accept.
    pub fn from_config(config: &OracleConfig) -> ServerResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(var = %config.api_key_env, "no API key set; provider calls are unauthenticated");
        }

        let analysis = OpenAiClient::new(&config.base_url, &config.analysis_model, api_key.clone())?;
        let kyc = OpenAiClient::new(&config.base_url, &config.kyc_model, api_key)?;
        info!(
            base_url = %config.base_url,
            analysis_model = %analysis.model(),
            kyc_model = %kyc.model(),
            "configured providers"
        );

        Ok(Self {
            analyzer: Arc::new(OpenAiAnalyzer::new(analysis)),
            verifier: Arc::new(OpenAiIdentityVerifier::new(kyc)),
        })
    }
}

/// Shared state behind every handler.
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub analyses: AnalysisCache,
    pub signatures: SignatureLedger,
    pub identities: IdentityRecordStore,
    pub max_upload_bytes: usize,
    config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig, stores: Stores, oracles: Oracles) -> Self {
        let policy = config.cache_policy();
        Self {
            analyses: AnalysisCache::new(
                Arc::clone(&stores.blobs),
                stores.analyses,
                oracles.analyzer,
                policy,
            ),
            signatures: SignatureLedger::new(stores.signers),
            identities: IdentityRecordStore::new(
                Arc::clone(&stores.blobs),
                stores.identities,
                oracles.verifier,
                policy,
            ),
            blobs: stores.blobs,
            max_upload_bytes: config.max_upload_bytes,
            config,
        }
    }

    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let stores = Stores::from_config(&config.storage)?;
        let oracles = Oracles::from_config(&config.oracle)?;
        Ok(Self::new(config, stores, oracles))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_layout_is_created() {
        let dir = tempfile::tempdir().unwrap();
        Stores::open(dir.path()).unwrap();
        for sub in ["blobs", "analyses", "signers", "identities"] {
            assert!(dir.path().join(sub).is_dir(), "{sub} missing");
        }
    }

    #[test]
    fn oracles_build_without_api_key() {
        let config = OracleConfig {
            api_key_env: "VS_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..OracleConfig::default()
        };
        assert!(Oracles::from_config(&config).is_ok());
    }
}
