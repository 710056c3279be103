use std::sync::Arc;

use tracing::{info, warn};
use vs_oracle::{parse_analysis, Analyzer};
use vs_store::{BlobStore, RecordTable};
use vs_types::{AnalysisRecord, ContentHash};

use crate::error::{CacheError, CacheResult};
use crate::lazy::{CachePolicy, LazyTable};

/// Contract analyses, computed once per content hash.
///
/// A `Ready` record is final. A `Failed` record is served until the retry
/// cooldown passes, then the next request recomputes it.
pub struct AnalysisCache {
    blobs: Arc<dyn BlobStore>,
    analyzer: Arc<dyn Analyzer>,
    records: LazyTable<ContentHash, AnalysisRecord>,
}

impl AnalysisCache {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        table: Arc<dyn RecordTable<ContentHash, AnalysisRecord>>,
        analyzer: Arc<dyn Analyzer>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            blobs,
            analyzer,
            records: LazyTable::new("analyses", table, policy),
        }
    }

    /// Return the analysis for `hash`, running the analyzer if no settled
    /// record exists.
    ///
    /// Analyzer failures come back as a `Failed` record, not as an error.
    /// Errors are reserved for a missing blob and storage failures.
    pub async fn get_or_compute(&self, hash: &ContentHash) -> CacheResult<AnalysisRecord> {
        let blobs = Arc::clone(&self.blobs);
        let analyzer = Arc::clone(&self.analyzer);
        let timeout = self.records.policy().call_timeout;
        let hash_owned = *hash;

        self.records
            .get_or_compute(
                hash,
                false,
                || match self.blobs.exists(hash)? {
                    true => Ok(()),
                    false => Err(CacheError::BlobNotFound(*hash)),
                },
                AnalysisRecord::pending(*hash),
                move || async move {
                    let hash = hash_owned;
                    let blob = blobs.get(&hash)?.ok_or(CacheError::BlobNotFound(hash))?;
                    info!(hash = %hash.short_hex(), size = blob.len(), "analyzing contract");

                    let outcome = match tokio::time::timeout(timeout, analyzer.analyze(&blob)).await {
                        Ok(Ok(text)) => parse_analysis(&text).map_err(|e| e.to_string()),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("analyzer timed out after {}s", timeout.as_secs())),
                    };

                    Ok(match outcome {
                        Ok(analysis) => {
                            info!(hash = %hash.short_hex(), score = analysis.score, "analysis ready");
                            AnalysisRecord::ready(hash, analysis)
                        }
                        Err(reason) => {
                            warn!(hash = %hash.short_hex(), %reason, "analysis failed");
                            AnalysisRecord::failed(hash, reason)
                        }
                    })
                },
            )
            .await
    }

    /// The stored record for `hash`, whatever its state. Never computes.
    pub fn peek(&self, hash: &ContentHash) -> CacheResult<Option<AnalysisRecord>> {
        self.records.load(hash)
    }

    /// Every stored record, sorted by hash.
    pub fn list(&self) -> CacheResult<Vec<AnalysisRecord>> {
        let mut records = self.records.list()?;
        records.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(records)
    }

    /// Number of analyses currently running.
    pub fn in_flight(&self) -> usize {
        self.records.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{StubAnalyzer, StubMode};
    use vs_store::{FsTable, InMemoryBlobStore, InMemoryTable};
    use vs_types::RecordStatus;

    const OK_JSON: &str = r#"{"title":"T","description":"D","score":50,"body":"B"}"#;

    struct Fixture {
        blobs: Arc<InMemoryBlobStore>,
        table: Arc<InMemoryTable<ContentHash, AnalysisRecord>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                blobs: Arc::new(InMemoryBlobStore::new()),
                table: Arc::new(InMemoryTable::new()),
            }
        }

        fn cache(&self, analyzer: Arc<StubAnalyzer>, policy: CachePolicy) -> AnalysisCache {
            AnalysisCache::new(self.blobs.clone(), self.table.clone(), analyzer, policy)
        }

        fn upload(&self, bytes: &[u8]) -> ContentHash {
            self.blobs
                .put(bytes.to_vec(), "application/pdf", "c.pdf")
                .unwrap()
        }
    }

    #[tokio::test]
    async fn first_request_computes_and_second_hits() {
        let fx = Fixture::new();
        let h1 = fx.upload(b"hello");

        let ok = Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into())));
        let rec = fx.cache(ok.clone(), CachePolicy::default()).get_or_compute(&h1).await.unwrap();
        assert_eq!(rec.status, RecordStatus::Ready);
        assert_eq!(rec.title, "T");
        assert_eq!(rec.score, 50);
        assert_eq!(rec.body, "B");
        assert_eq!(ok.calls(), 1);

        let failing = Arc::new(StubAnalyzer::new(StubMode::Fail));
        let again = fx
            .cache(failing.clone(), CachePolicy::default())
            .get_or_compute(&h1)
            .await
            .unwrap();
        assert_eq!(again, rec);
        assert_eq!(failing.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_call() {
        let fx = Fixture::new();
        let h = fx.upload(b"contract body");
        let stub = Arc::new(
            StubAnalyzer::new(StubMode::Reply(OK_JSON.into()))
                .with_delay(Duration::from_millis(200)),
        );
        let cache = Arc::new(fx.cache(stub.clone(), CachePolicy::default()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_compute(&h).await })
            })
            .collect();

        let mut records = Vec::new();
        for handle in handles {
            records.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(stub.calls(), 1);
        assert!(records.iter().all(|r| r == &records[0]));
        assert!(records[0].is_ready());
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn scores_are_clamped() {
        let fx = Fixture::new();
        let high = fx.upload(b"high");
        let low = fx.upload(b"low");

        let cache = fx.cache(
            Arc::new(StubAnalyzer::new(StubMode::Reply(
                r#"{"title":"T","description":"D","score":137,"content":"B"}"#.into(),
            ))),
            CachePolicy::default(),
        );
        assert_eq!(cache.get_or_compute(&high).await.unwrap().score, 100);

        let cache = fx.cache(
            Arc::new(StubAnalyzer::new(StubMode::Reply(
                r#"{"title":"T","description":"D","score":-5,"content":"B"}"#.into(),
            ))),
            CachePolicy::default(),
        );
        assert_eq!(cache.get_or_compute(&low).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn unknown_blob_is_an_error_and_writes_nothing() {
        let fx = Fixture::new();
        let stub = Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into())));
        let cache = fx.cache(stub.clone(), CachePolicy::default());
        let missing = ContentHash::of(b"never uploaded");

        let err = cache.get_or_compute(&missing).await.unwrap_err();
        assert!(matches!(err, CacheError::BlobNotFound(h) if h == missing));
        assert_eq!(cache.peek(&missing).unwrap(), None);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn failure_is_cached_within_cooldown() {
        let fx = Fixture::new();
        let h = fx.upload(b"bad scan");
        let policy = CachePolicy {
            retry_cooldown: Duration::from_secs(3600),
            ..CachePolicy::default()
        };
        let stub = Arc::new(StubAnalyzer::new(StubMode::Fail));
        let cache = fx.cache(stub.clone(), policy);

        let first = cache.get_or_compute(&h).await.unwrap();
        assert_eq!(first.status, RecordStatus::Failed);
        assert!(first.error.is_some());

        let second = cache.get_or_compute(&h).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn failure_is_retried_after_cooldown() {
        let fx = Fixture::new();
        let h = fx.upload(b"flaky");
        let policy = CachePolicy {
            retry_cooldown: Duration::ZERO,
            ..CachePolicy::default()
        };

        let failing = Arc::new(StubAnalyzer::new(StubMode::Fail));
        let rec = fx.cache(failing, policy).get_or_compute(&h).await.unwrap();
        assert!(rec.is_failed());

        let ok = Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into())));
        let rec = fx.cache(ok.clone(), policy).get_or_compute(&h).await.unwrap();
        assert!(rec.is_ready());
        assert_eq!(ok.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_output_is_a_failure() {
        let fx = Fixture::new();
        let h = fx.upload(b"prose");
        let cache = fx.cache(
            Arc::new(StubAnalyzer::new(StubMode::Reply("I cannot help with that.".into()))),
            CachePolicy::default(),
        );
        let rec = cache.get_or_compute(&h).await.unwrap();
        assert!(rec.is_failed());
        assert!(rec.title.is_empty());
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let fx = Fixture::new();
        let h = fx.upload(b"slow");
        let policy = CachePolicy {
            call_timeout: Duration::from_millis(20),
            ..CachePolicy::default()
        };
        let stub = Arc::new(
            StubAnalyzer::new(StubMode::Reply(OK_JSON.into())).with_delay(Duration::from_secs(5)),
        );
        let rec = fx.cache(stub, policy).get_or_compute(&h).await.unwrap();
        assert!(rec.is_failed());
        assert!(rec.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn stale_pending_is_recomputed() {
        let fx = Fixture::new();
        let h = fx.upload(b"crashed mid-analysis");
        fx.table.save(&h, &AnalysisRecord::pending(h)).unwrap();

        let stub = Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into())));
        let rec = fx.cache(stub.clone(), CachePolicy::default()).get_or_compute(&h).await.unwrap();
        assert!(rec.is_ready());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn panicking_analyzer_abandons_then_recovers() {
        let fx = Fixture::new();
        let h = fx.upload(b"poison");

        let cache = fx.cache(Arc::new(StubAnalyzer::new(StubMode::Panic)), CachePolicy::default());
        assert!(matches!(
            cache.get_or_compute(&h).await,
            Err(CacheError::Abandoned)
        ));
        assert_eq!(cache.in_flight(), 0);

        let stub = Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into())));
        let rec = fx.cache(stub, CachePolicy::default()).get_or_compute(&h).await.unwrap();
        assert!(rec.is_ready());
    }

    #[tokio::test]
    async fn ready_record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(InMemoryBlobStore::new());
        let h = blobs.put(b"durable".to_vec(), "application/pdf", "d.pdf").unwrap();

        {
            let table: Arc<FsTable<ContentHash, AnalysisRecord>> =
                Arc::new(FsTable::open(dir.path()).unwrap());
            let stub = Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into())));
            let cache = AnalysisCache::new(blobs.clone(), table, stub, CachePolicy::default());
            assert!(cache.get_or_compute(&h).await.unwrap().is_ready());
        }

        let table: Arc<FsTable<ContentHash, AnalysisRecord>> =
            Arc::new(FsTable::open(dir.path()).unwrap());
        let failing = Arc::new(StubAnalyzer::new(StubMode::Fail));
        let cache = AnalysisCache::new(blobs, table, failing.clone(), CachePolicy::default());
        let rec = cache.get_or_compute(&h).await.unwrap();
        assert!(rec.is_ready());
        assert_eq!(rec.score, 50);
        assert_eq!(failing.calls(), 0);
    }

    #[tokio::test]
    async fn list_returns_sorted_records() {
        let fx = Fixture::new();
        let cache = fx.cache(
            Arc::new(StubAnalyzer::new(StubMode::Reply(OK_JSON.into()))),
            CachePolicy::default(),
        );
        for body in [&b"one"[..], b"two", b"three"] {
            let h = fx.upload(body);
            cache.get_or_compute(&h).await.unwrap();
        }
        let hashes: Vec<_> = cache.list().unwrap().into_iter().map(|r| r.hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes.len(), 3);
        assert_eq!(hashes, sorted);
    }
}
