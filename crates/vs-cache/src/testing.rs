//! Scripted oracles for cache tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vs_oracle::{Analyzer, IdentityVerifier, OracleError};
use vs_types::Blob;

#[derive(Clone, Debug)]
pub(crate) enum StubMode {
    /// Return this text verbatim.
    Reply(String),
    /// Return a provider error.
    Fail,
    Panic,
}

/// Counts calls and answers according to its mode, after an optional delay.
pub(crate) struct StubOracle {
    mode: StubMode,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

pub(crate) type StubAnalyzer = StubOracle;
pub(crate) type StubVerifier = StubOracle;

impl StubOracle {
    pub(crate) fn new(mode: StubMode) -> Self {
        Self {
            mode,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.mode {
            StubMode::Reply(text) => Ok(text.clone()),
            StubMode::Fail => Err(OracleError::Http {
                status: 500,
                body: "stub failure".into(),
            }),
            StubMode::Panic => panic!("stub oracle panicked"),
        }
    }
}

#[async_trait]
impl Analyzer for StubOracle {
    async fn analyze(&self, _blob: &Blob) -> Result<String, OracleError> {
        self.answer().await
    }
}

#[async_trait]
impl IdentityVerifier for StubOracle {
    async fn verify_identity(&self, _evidence: &Blob) -> Result<String, OracleError> {
        self.answer().await
    }
}
