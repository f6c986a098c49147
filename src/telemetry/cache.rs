// src/telemetry/cache.rs
//! TTL cache around [`TelemetryFetcher`].
//!
//! States: `Empty -> Fresh -> Stale -> Fresh(new) -> ...`. Staleness is
//! detected lazily on read; there is no background polling. Stores are
//! ordered by a generation reserved before fetching, so a slow older batch
//! never replaces a newer one (last batch wins by generation, not by
//! completion order).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use serde::Serialize;
use tracing::debug;

use crate::telemetry::fetcher::TelemetryFetcher;
use crate::telemetry::types::FetchBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Empty,
    Fresh,
    Stale,
}

/// How a `get` was served; surfaced as the `X-Telemetry-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRead {
    Hit,
    Miss,
}

impl CacheRead {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheRead::Hit => "HIT",
            CacheRead::Miss => "MISS",
        }
    }
}

#[derive(Debug)]
struct Slot {
    batch: Arc<FetchBatch>,
    stored_at: Instant,
}

pub struct TelemetryCache {
    fetcher: TelemetryFetcher,
    ttl: Duration,
    generation: AtomicU64,
    slot: Mutex<Option<Slot>>,
}

impl TelemetryCache {
    pub fn new(fetcher: TelemetryFetcher, ttl: Duration) -> Self {
        gauge!("telemetry_cache_ttl_secs").set(ttl.as_secs_f64());
        Self {
            fetcher,
            ttl,
            generation: AtomicU64::new(0),
            slot: Mutex::new(None),
        }
    }

    pub fn status(&self) -> CacheStatus {
        match self.lock().as_ref() {
            None => CacheStatus::Empty,
            Some(s) if s.stored_at.elapsed() > self.ttl => CacheStatus::Stale,
            Some(_) => CacheStatus::Fresh,
        }
    }

    /// Last stored batch regardless of age. Never fetches.
    pub fn current(&self) -> Option<Arc<FetchBatch>> {
        self.lock().as_ref().map(|s| Arc::clone(&s.batch))
    }

    /// Cached batch if fresh, otherwise fetch `ids` and store the result.
    pub async fn get(&self, ids: &[String], force_refresh: bool) -> Arc<FetchBatch> {
        self.get_traced(ids, force_refresh).await.0
    }

    /// Like [`get`](Self::get), also reporting whether the read was a hit.
    pub async fn get_traced(
        &self,
        ids: &[String],
        force_refresh: bool,
    ) -> (Arc<FetchBatch>, CacheRead) {
        if !force_refresh {
            if let Some(batch) = self.fresh_batch() {
                counter!("telemetry_cache_hits_total").increment(1);
                return (batch, CacheRead::Hit);
            }
        }
        counter!("telemetry_cache_misses_total").increment(1);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, force_refresh, "telemetry cache miss; fetching");
        let results = self.fetcher.fetch_all(ids).await;
        let batch = Arc::new(FetchBatch::new(generation, results));

        (self.store(batch), CacheRead::Miss)
    }

    fn fresh_batch(&self) -> Option<Arc<FetchBatch>> {
        match self.lock().as_ref() {
            Some(s) if s.stored_at.elapsed() <= self.ttl => Some(Arc::clone(&s.batch)),
            _ => None,
        }
    }

    /// Store unless a newer generation already landed; returns the batch now current.
    fn store(&self, batch: Arc<FetchBatch>) -> Arc<FetchBatch> {
        let mut slot = self.lock();
        if let Some(cur) = slot.as_ref() {
            if cur.batch.generation() > batch.generation() {
                debug!(
                    stale = batch.generation(),
                    current = cur.batch.generation(),
                    "discarding superseded telemetry batch"
                );
                return Arc::clone(&cur.batch);
            }
        }
        *slot = Some(Slot {
            batch: Arc::clone(&batch),
            stored_at: Instant::now(),
        });
        batch
    }

    fn lock(&self) -> MutexGuard<'_, Option<Slot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
