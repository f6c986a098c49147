// src/config/dashboard.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs};
use tracing::warn;

use crate::telemetry::DEFAULT_API_BASE;

pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";
pub const DEFAULT_STATIONS_PATH: &str = "config/stations.txt";

pub const ENV_CONFIG_PATH: &str = "GAUGE_CONFIG_PATH";
pub const ENV_TTL_SECS: &str = "GAUGE_TTL_SECS";
pub const ENV_CONCURRENCY: &str = "GAUGE_CONCURRENCY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "GAUGE_REQUEST_TIMEOUT_SECS";
pub const ENV_API_BASE: &str = "GAUGE_API_BASE";
pub const ENV_STATIONS_PATH: &str = "GAUGE_STATIONS_PATH";

const GOOGLE_SATELLITE_TILES: &str = "https://mt1.google.com/vt/lyrs=s,h&x={x}&y={y}&z={z}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// How long a fetched batch is served before a read refetches it.
    pub ttl_secs: u64,
    /// Max stageflow requests in flight at once.
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub api_base: String,
    pub stations_path: PathBuf,
    pub map_zoom: u8,
    pub tile_url: String,
    pub tile_attribution: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            concurrency: 10,
            request_timeout_secs: 10,
            api_base: DEFAULT_API_BASE.to_string(),
            stations_path: PathBuf::from(DEFAULT_STATIONS_PATH),
            map_zoom: 7,
            tile_url: GOOGLE_SATELLITE_TILES.to_string(),
            tile_attribution: "Map data \u{a9} Google".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Resolve config:
    /// 1) $GAUGE_CONFIG_PATH (must exist)
    /// 2) config/dashboard.toml
    /// 3) built-in defaults
    ///
    /// then apply `GAUGE_*` env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        pb.display()
                    ));
                }
                Self::load_from_file(&pb)?
            }
            Err(_) => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: DashboardConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env(ENV_TTL_SECS) {
            self.ttl_secs = v;
        }
        if let Some(v) = parse_env(ENV_CONCURRENCY) {
            self.concurrency = v;
        }
        if let Some(v) = parse_env(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = v;
        }
        if let Ok(v) = env::var(ENV_API_BASE) {
            if !v.trim().is_empty() {
                self.api_base = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var(ENV_STATIONS_PATH) {
            if !v.trim().is_empty() {
                self.stations_path = PathBuf::from(v.trim());
            }
        }
    }

    fn sanitize(&mut self) {
        self.concurrency = self.concurrency.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.map_zoom = self.map_zoom.clamp(1, 20);
        let trimmed = self.api_base.trim().trim_end_matches('/');
        self.api_base = if trimmed.is_empty() {
            DEFAULT_API_BASE.to_string()
        } else {
            trimmed.to_string()
        };
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable config override");
            None
        }
    }
}
