// src/telemetry/mod.rs
pub mod cache;
pub mod fetcher;
pub mod types;

pub use cache::{CacheRead, CacheStatus, TelemetryCache};
pub use fetcher::{NwpsClient, TelemetryFetcher, DEFAULT_API_BASE};
pub use types::{FetchBatch, Observation, StageflowSource, Telemetry, TelemetryResult};
