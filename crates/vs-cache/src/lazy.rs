use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use vs_store::{RecordTable, TableKey};
use vs_types::{AnalysisRecord, IdentityRecord, RecordStatus};

use crate::error::{CacheError, CacheResult};
use crate::flight::{Flight, SingleFlight};

/// Timing rules shared by the lazy caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    /// Upper bound on one external call. Exceeding it stores a `Failed` record.
    pub call_timeout: Duration,
    /// How long a `Failed` record is served from cache before a new request
    /// retries the computation. Zero retries on every request.
    pub retry_cooldown: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(120),
            retry_cooldown: Duration::from_secs(30),
        }
    }
}

impl CachePolicy {
    /// Whether a stored record can be served without recomputing.
    ///
    /// A `Pending` record found in storage has no live owner (owners are
    /// tracked in memory), so it is stale and gets recomputed.
    pub(crate) fn is_settled<R: Lifecycle>(&self, record: &R) -> bool {
        match record.status() {
            RecordStatus::Ready => true,
            RecordStatus::Pending => false,
            RecordStatus::Failed => {
                let age = (Utc::now() - record.updated_at())
                    .to_std()
                    .unwrap_or_default();
                age < self.retry_cooldown
            }
        }
    }
}

/// Status accessors the lazy table needs from a record.
pub(crate) trait Lifecycle {
    fn status(&self) -> RecordStatus;
    fn updated_at(&self) -> DateTime<Utc>;
}

impl Lifecycle for AnalysisRecord {
    fn status(&self) -> RecordStatus {
        self.status
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Lifecycle for IdentityRecord {
    fn status(&self) -> RecordStatus {
        self.status
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A record table populated on first request, one computation per key.
pub(crate) struct LazyTable<K, V> {
    label: &'static str,
    table: Arc<dyn RecordTable<K, V>>,
    flights: SingleFlight<K, V>,
    policy: CachePolicy,
}

impl<K, V> LazyTable<K, V>
where
    K: TableKey + Display,
    V: Lifecycle + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        label: &'static str,
        table: Arc<dyn RecordTable<K, V>>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            label,
            table,
            flights: SingleFlight::new(),
            policy,
        }
    }

    pub(crate) fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub(crate) fn load(&self, key: &K) -> CacheResult<Option<V>> {
        Ok(self.table.load(key)?)
    }

    pub(crate) fn list(&self) -> CacheResult<Vec<V>> {
        Ok(self.table.list()?)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Return the settled record for `key`, or compute it.
    ///
    /// `precheck` runs only when a computation would start and may veto it
    /// (e.g. the input blob is missing); no record is written in that case.
    /// `pending` is persisted before `compute` is spawned. `compute` runs in
    /// its own task, so callers that go away do not cancel it.
    ///
    /// With `force`, a settled record is recomputed, but an in-flight
    /// computation is still joined rather than duplicated. A `Ready` record
    /// stays in storage while a forced run is in flight, and a forced run that
    /// fails returns its `Failed` record without replacing the `Ready` one.
    pub(crate) async fn get_or_compute<P, C, Fut>(
        &self,
        key: &K,
        force: bool,
        precheck: P,
        pending: V,
        compute: C,
    ) -> CacheResult<V>
    where
        P: FnOnce() -> CacheResult<()>,
        C: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        let mut kept: Option<V> = None;
        let flight = self.flights.join(key, || {
            if let Some(record) = self.table.load(key)? {
                if !force && self.policy.is_settled(&record) {
                    return Ok(Some(record));
                }
                if force && record.status() == RecordStatus::Ready {
                    kept = Some(record);
                }
            }
            precheck()?;
            Ok(None)
        })?;

        match flight {
            Flight::Settled(record) => {
                debug!(table = self.label, key = %key, "cache hit");
                Ok(record)
            }
            Flight::Follower(waiter) => {
                debug!(table = self.label, key = %key, "joining in-flight computation");
                waiter.wait().await
            }
            Flight::Leader(ticket) => {
                let waiter = ticket.subscribe();
                if kept.is_none() {
                    if let Err(e) = self.table.save(key, &pending) {
                        let err = CacheError::from(e);
                        ticket.resolve(Err(err.clone()));
                        return Err(err);
                    }
                }

                let table = Arc::clone(&self.table);
                let owned_key = key.clone();
                let label = self.label;
                let work = compute();
                tokio::spawn(async move {
                    let result = match work.await {
                        Ok(record)
                            if kept.is_some() && record.status() == RecordStatus::Failed =>
                        {
                            debug!(table = label, key = %owned_key, "forced run failed, keeping ready record");
                            Ok(record)
                        }
                        Ok(record) => table
                            .save(&owned_key, &record)
                            .map(|()| record)
                            .map_err(CacheError::from),
                        Err(e) => Err(e),
                    };
                    ticket.resolve(result);
                });

                waiter.wait().await
            }
        }
    }
}
