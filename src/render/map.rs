// src/render/map.rs
//! Projects stations + a fetch batch into map markers and aggregate counts.
//! Pure read of registry and batch.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use html_escape::encode_text;
use serde::Serialize;

use crate::config::DashboardConfig;
use crate::stations::{Station, StationRegistry};
use crate::telemetry::{FetchBatch, Telemetry, TelemetryResult};

pub const MISSING_MESSAGE: &str = "no data";
const NOT_AVAILABLE: &str = "N/A";
const MARKER_RADIUS: u32 = 6;
const POPUP_MAX_WIDTH: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Blue,
    Red,
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub color: MarkerColor,
    pub radius: u32,
    pub tooltip: String,
    pub popup_html: String,
    pub popup_max_width: u32,
    /// Error text for red markers.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StationCounts {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileLayer {
    pub url: String,
    pub attribution: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub center: [f64; 2],
    pub zoom: u8,
    pub tiles: TileLayer,
    pub markers: Vec<Marker>,
    pub counts: StationCounts,
    pub generation: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MapRenderer {
    zoom: u8,
    tiles: TileLayer,
}

impl MapRenderer {
    pub fn new(zoom: u8, tiles: TileLayer) -> Self {
        Self { zoom, tiles }
    }

    pub fn from_config(cfg: &DashboardConfig) -> Self {
        Self::new(
            cfg.map_zoom,
            TileLayer {
                url: cfg.tile_url.clone(),
                attribution: cfg.tile_attribution.clone(),
            },
        )
    }

    pub fn render(&self, registry: &StationRegistry, batch: &FetchBatch) -> MapView {
        let markers: Vec<Marker> = registry
            .stations()
            .iter()
            .map(|st| marker_for(st, batch.get(&st.id)))
            .collect();

        let total = markers.len();
        let ok = markers
            .iter()
            .filter(|m| m.color == MarkerColor::Blue)
            .count();
        let (lat, lon) = registry.centroid();

        MapView {
            center: [lat, lon],
            zoom: self.zoom,
            tiles: self.tiles.clone(),
            markers,
            counts: StationCounts {
                total,
                ok,
                failed: total - ok,
            },
            generation: batch.generation(),
            last_updated: batch.fetched_at(),
        }
    }
}

/// Build one marker; a station absent from the batch counts as failed.
pub fn marker_for(station: &Station, result: Option<&TelemetryResult>) -> Marker {
    let mut popup = format!(
        "<b>Station:</b> {}<br><b>Name:</b> {}<br>",
        encode_text(&station.id),
        encode_text(&station.name)
    );

    let (color, message) = match result {
        Some(TelemetryResult::Fetched(t)) => {
            write_telemetry(&mut popup, t);
            (MarkerColor::Blue, None)
        }
        Some(TelemetryResult::Failed { message }) => {
            write_failure(&mut popup, message);
            (MarkerColor::Red, Some(message.clone()))
        }
        None => {
            write_failure(&mut popup, MISSING_MESSAGE);
            (MarkerColor::Red, Some(MISSING_MESSAGE.to_string()))
        }
    };

    Marker {
        station_id: station.id.clone(),
        name: station.name.clone(),
        lat: station.lat,
        lon: station.lon,
        color,
        radius: MARKER_RADIUS,
        tooltip: format!("{} ({})", station.name, station.id),
        popup_html: popup,
        popup_max_width: POPUP_MAX_WIDTH,
        message,
    }
}

fn write_telemetry(out: &mut String, t: &Telemetry) {
    let line = |out: &mut String, label: &str, value: Option<&str>| {
        let _ = write!(
            out,
            "<b>{label}:</b> {}<br>",
            encode_text(value.unwrap_or(NOT_AVAILABLE))
        );
    };
    line(out, "Valid Time", t.valid_time.as_deref());
    line(out, "Generated Time", t.generated_time.as_deref());
    line(
        out,
        "Primary",
        with_units(&t.primary, &t.primary_units).as_deref(),
    );
    line(
        out,
        "Secondary",
        with_units(&t.secondary, &t.secondary_units).as_deref(),
    );

    if let Some(obs) = t.latest_observation() {
        let _ = write!(
            out,
            "<b>Most Recent Observation:</b> {}",
            encode_text(&obs.to_string())
        );
    }
}

fn write_failure(out: &mut String, message: &str) {
    let _ = write!(out, "\u{26a0}\u{fe0f} No API data<br>{}", encode_text(message));
}

fn with_units(value: &Option<String>, units: &Option<String>) -> Option<String> {
    match (value, units) {
        (Some(v), Some(u)) if !u.is_empty() => Some(format!("{v} {u}")),
        (Some(v), _) => Some(v.clone()),
        (None, _) => None,
    }
}
