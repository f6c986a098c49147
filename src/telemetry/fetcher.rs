// src/telemetry/fetcher.rs
//! Concurrent per-station fetch with partial-failure isolation.
//!
//! Every requested id resolves to exactly one [`TelemetryResult`]; a failure
//! (HTTP status, transport error, timeout, bad body, panicked task) only
//! affects the station it belongs to.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::telemetry::types::{StageflowSource, Telemetry, TelemetryResult};

pub const DEFAULT_API_BASE: &str = "https://api.water.noaa.gov/nwps/v1";

const USER_AGENT: &str = concat!("gauge-dashboard/", env!("CARGO_PKG_VERSION"));

/// Real NWPS transport: `GET {api_base}/gauges/{id}/stageflow`.
pub struct NwpsClient {
    http: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl NwpsClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .context("building NWPS http client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn stageflow_url(&self, station_id: &str) -> String {
        format!("{}/gauges/{}/stageflow", self.api_base, station_id)
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl StageflowSource for NwpsClient {
    async fn fetch_stageflow(&self, station_id: &str) -> Result<Telemetry, FetchError> {
        let url = self.stageflow_url(station_id);
        debug!(station = station_id, %url, "requesting stageflow");

        let resp = self.http.get(&url).send().await.map_err(|e| self.map_err(e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await.map_err(|e| self.map_err(e))?;
        Telemetry::from_json(&body)
    }

    fn name(&self) -> &'static str {
        "nwps"
    }
}

/// Fans out one request per station id, at most `concurrency` in flight.
#[derive(Clone)]
pub struct TelemetryFetcher {
    source: Arc<dyn StageflowSource>,
    concurrency: usize,
    request_timeout: Duration,
}

impl TelemetryFetcher {
    pub fn new(
        source: Arc<dyn StageflowSource>,
        concurrency: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
            request_timeout,
        }
    }

    /// Fetch every distinct id and wait for all of them. No retries, no
    /// global deadline beyond the per-request timeout.
    pub async fn fetch_all(&self, ids: &[String]) -> HashMap<String, TelemetryResult> {
        let t0 = Instant::now();

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for id in unique.iter().cloned() {
            let sem = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let timeout = self.request_timeout;

            tasks.spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(timeout, source.fetch_stageflow(&id)).await {
                            Ok(r) => r,
                            Err(_) => Err(FetchError::Timeout(timeout)),
                        }
                    }
                    Err(_) => Err(FetchError::TaskAborted),
                };
                (id, result)
            });
        }

        let mut results = HashMap::with_capacity(unique.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(t))) => {
                    counter!("gauge_fetch_ok_total").increment(1);
                    results.insert(id, TelemetryResult::Fetched(t));
                }
                Ok((id, Err(e))) => {
                    warn!(station = %id, error = %e, source = self.source.name(), "stageflow fetch failed");
                    counter!("gauge_fetch_errors_total").increment(1);
                    results.insert(id, TelemetryResult::failed(e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "stageflow fetch task did not complete");
                }
            }
        }

        // A panicked task loses its id; fill the gap so the batch stays complete.
        for id in unique {
            results.entry(id).or_insert_with(|| {
                counter!("gauge_fetch_errors_total").increment(1);
                TelemetryResult::failed(FetchError::TaskAborted.to_string())
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("gauge_fetch_batch_ms").record(ms);
        let ok = results.values().filter(|r| r.is_ok()).count();
        info!(
            stations = results.len(),
            ok,
            failed = results.len() - ok,
            elapsed_ms = ms as u64,
            "telemetry batch fetched"
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails for ids starting with `bad`, panics for `panic`, otherwise returns
    /// telemetry whose `primary` echoes the id.
    struct Scripted {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl StageflowSource for Scripted {
        async fn fetch_stageflow(&self, station_id: &str) -> Result<Telemetry, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if station_id == "panic" {
                panic!("scripted panic");
            }
            if station_id.starts_with("bad") {
                return Err(FetchError::Status { status: 500 });
            }
            Ok(Telemetry {
                primary: Some(station_id.to_string()),
                ..Telemetry::default()
            })
        }
        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn scripted() -> Arc<Scripted> {
        Arc::new(Scripted {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let src = scripted();
        let fetcher = TelemetryFetcher::new(src.clone(), 3, Duration::from_secs(5));
        let all: Vec<String> = (0..20).map(|i| format!("{i:08}")).collect();
        let out = fetcher.fetch_all(&all).await;
        assert_eq!(out.len(), 20);
        assert!(src.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn duplicates_collapse_and_failures_stay_isolated() {
        let fetcher = TelemetryFetcher::new(scripted(), 4, Duration::from_secs(5));
        let out = fetcher
            .fetch_all(&ids(&["03207965", "bad1", "03207965", "ok2"]))
            .await;
        assert_eq!(out.len(), 3);
        assert!(!out["bad1"].is_ok());
        match &out["03207965"] {
            TelemetryResult::Fetched(t) => assert_eq!(t.primary.as_deref(), Some("03207965")),
            other => panic!("expected ok, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicked_task_is_reported_as_failed() {
        let fetcher = TelemetryFetcher::new(scripted(), 2, Duration::from_secs(5));
        let out = fetcher.fetch_all(&ids(&["panic", "ok"])).await;
        assert_eq!(out.len(), 2);
        assert_eq!(
            out["panic"],
            TelemetryResult::failed("fetch task aborted")
        );
        assert!(out["ok"].is_ok());
    }

    #[test]
    fn stageflow_url_strips_trailing_slash() {
        let c = NwpsClient::new("https://example.test/nwps/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.stageflow_url("03207965"),
            "https://example.test/nwps/v1/gauges/03207965/stageflow"
        );
    }
}
