// src/render/chart.rs
//! Observation time series for one selected station.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::telemetry::{FetchBatch, Observation, Telemetry, TelemetryResult};

const PREFERRED_FIELD: &str = "primary";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub station_id: String,
    pub title: String,
    pub field: String,
    pub x_label: String,
    pub y_label: String,
    pub units: Option<String>,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartView {
    Line(LineChart),
    /// Explicit "no data" state; never a blank chart.
    Empty { station_id: String, reason: String },
}

impl ChartView {
    fn empty(station_id: &str, reason: impl Into<String>) -> Self {
        Self::Empty {
            station_id: station_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}

pub fn render(station_id: &str, batch: &FetchBatch) -> ChartView {
    let telemetry = match batch.get(station_id) {
        Some(TelemetryResult::Fetched(t)) => t,
        Some(TelemetryResult::Failed { message }) => {
            return ChartView::empty(station_id, format!("fetch error: {message}"));
        }
        None => return ChartView::empty(station_id, "no data available for this station"),
    };
    if telemetry.observed.is_empty() {
        return ChartView::empty(station_id, "no observation data available");
    }

    let Some(field) = value_field(&telemetry.observed) else {
        return ChartView::empty(station_id, "observations carry no value field");
    };

    let mut points: Vec<ChartPoint> = telemetry
        .observed
        .iter()
        .filter_map(|obs| {
            let time = obs.valid_time().and_then(parse_timestamp)?;
            let value = obs.get(&field).and_then(numeric)?;
            Some(ChartPoint { time, value })
        })
        .collect();
    if points.is_empty() {
        return ChartView::empty(station_id, "no observation data available");
    }
    // Provider order is ascending in practice but not guaranteed.
    points.sort_by_key(|p| p.time);

    ChartView::Line(LineChart {
        station_id: station_id.to_string(),
        title: format!("Observed {field}, station {station_id}"),
        x_label: "Time (UTC)".to_string(),
        y_label: capitalize(&field),
        units: units_for(telemetry, &field),
        field,
        points,
    })
}

/// `primary` if any entry has it, else the second field in first-seen key order.
pub fn value_field(series: &[Observation]) -> Option<String> {
    let mut keys: Vec<&str> = Vec::new();
    for obs in series {
        for k in obs.fields().keys() {
            if !keys.contains(&k.as_str()) {
                keys.push(k.as_str());
            }
        }
    }
    if keys.contains(&PREFERRED_FIELD) {
        return Some(PREFERRED_FIELD.to_string());
    }
    keys.get(1).map(|k| k.to_string())
}

/// RFC 3339, or a naive date-time taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|n| n.and_utc())
}

fn numeric(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}

fn units_for(t: &Telemetry, field: &str) -> Option<String> {
    match field {
        "primary" => t.primary_units.clone(),
        "secondary" => t.secondary_units.clone(),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
