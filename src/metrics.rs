//! Prometheus recorder and the `/metrics` exposition route.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and describe our series.
    /// Later calls reuse the same handle, so building several apps is fine.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe_all();
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_all() {
    describe_counter!("gauge_fetch_ok_total", "Stageflow fetches that returned telemetry.");
    describe_counter!(
        "gauge_fetch_errors_total",
        "Stageflow fetches that failed (status, transport, timeout, decode)."
    );
    describe_histogram!("gauge_fetch_batch_ms", "Wall time of one fetch cycle in milliseconds.");
    describe_counter!("telemetry_cache_hits_total", "Reads served from the cached batch.");
    describe_counter!(
        "telemetry_cache_misses_total",
        "Reads that triggered a fetch cycle (empty, stale or forced)."
    );
    describe_gauge!("telemetry_cache_ttl_secs", "Configured telemetry cache TTL.");
}
