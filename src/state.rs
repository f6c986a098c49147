// src/state.rs
//! Process-wide application state: created once at startup, shared by the
//! axum handlers, lives until process exit.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::DashboardConfig;
use crate::metrics::Metrics;
use crate::render::MapRenderer;
use crate::stations::StationRegistry;
use crate::telemetry::{
    CacheRead, FetchBatch, NwpsClient, StageflowSource, TelemetryCache, TelemetryFetcher,
};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StationRegistry>,
    pub cache: Arc<TelemetryCache>,
    pub map: Arc<MapRenderer>,
    pub metrics: Metrics,
    station_ids: Arc<Vec<String>>,
}

impl AppState {
    /// Wire state around an arbitrary stageflow source (stubbed in tests).
    pub fn new(
        config: DashboardConfig,
        registry: StationRegistry,
        source: Arc<dyn StageflowSource>,
    ) -> anyhow::Result<Self> {
        // Recorder first, so the cache's TTL gauge lands in it.
        let metrics = Metrics::init()?;
        let fetcher = TelemetryFetcher::new(source, config.concurrency, config.request_timeout());
        let cache = TelemetryCache::new(fetcher, config.ttl());
        let map = MapRenderer::from_config(&config);
        let station_ids = registry.ids();

        Ok(Self {
            registry: Arc::new(registry),
            cache: Arc::new(cache),
            map: Arc::new(map),
            metrics,
            station_ids: Arc::new(station_ids),
        })
    }

    /// Production wiring: station list from disk, real NWPS client.
    pub fn from_config(config: DashboardConfig) -> anyhow::Result<Self> {
        let registry = StationRegistry::load_from_path(&config.stations_path)?;
        let client = NwpsClient::new(config.api_base.clone(), config.request_timeout())
            .context("creating NWPS client")?;
        info!(
            stations = registry.len(),
            ttl_secs = config.ttl_secs,
            concurrency = config.concurrency,
            api_base = %config.api_base,
            "dashboard state ready"
        );
        Self::new(config, registry, Arc::new(client))
    }

    /// Current batch via the cache (TTL honored unless `force_refresh`).
    pub async fn batch(&self, force_refresh: bool) -> (Arc<FetchBatch>, CacheRead) {
        self.cache
            .get_traced(&self.station_ids, force_refresh)
            .await
    }

    /// Startup fetch so the first page load is served from cache.
    pub async fn prime(&self) -> Arc<FetchBatch> {
        let (batch, _) = self.batch(false).await;
        batch
    }
}
