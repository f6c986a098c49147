// src/telemetry/types.rs
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FetchError;

/// Raw NWPS `stageflow` body. Every field is optional; absence is not an error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StageflowPayload {
    #[serde(rename = "validTime")]
    valid_time: Option<Value>,
    #[serde(rename = "generatedTime")]
    generated_time: Option<Value>,
    primary: Option<Value>,
    secondary: Option<Value>,
    observed: Option<ObservedBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObservedBlock {
    data: Option<Vec<Value>>,
    #[serde(rename = "primaryUnits")]
    primary_units: Option<Value>,
    #[serde(rename = "secondaryUnits")]
    secondary_units: Option<Value>,
}

/// One observation row. Field order is the order the provider declared them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Observation(Map<String, Value>);

impl Observation {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn valid_time(&self) -> Option<&str> {
        self.0.get("validTime").and_then(Value::as_str)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{k}: {}", scalar_text(v).unwrap_or_else(|| "null".into()))?;
        }
        Ok(())
    }
}

/// Successfully fetched stage/flow telemetry for one gauge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub valid_time: Option<String>,
    pub generated_time: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub primary_units: Option<String>,
    pub secondary_units: Option<String>,
    pub observed: Vec<Observation>,
}

impl Telemetry {
    /// Decode a `stageflow` JSON body. The body must be a JSON object;
    /// missing or `null` fields inside it become `None` / empty series.
    pub fn from_json(body: &[u8]) -> Result<Self, FetchError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        if !value.is_object() {
            return Err(FetchError::Decode(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        let payload: StageflowPayload =
            serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Self::from(payload))
    }

    /// Last element of the observed series (provider order is ascending).
    pub fn latest_observation(&self) -> Option<&Observation> {
        self.observed.last()
    }
}

impl From<StageflowPayload> for Telemetry {
    fn from(p: StageflowPayload) -> Self {
        let observed = p.observed.unwrap_or_default();
        Self {
            valid_time: p.valid_time.as_ref().and_then(scalar_text),
            generated_time: p.generated_time.as_ref().and_then(scalar_text),
            primary: p.primary.as_ref().and_then(scalar_text),
            secondary: p.secondary.as_ref().and_then(scalar_text),
            primary_units: observed.primary_units.as_ref().and_then(scalar_text),
            secondary_units: observed.secondary_units.as_ref().and_then(scalar_text),
            observed: observed
                .data
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(m) => Some(Observation(m)),
                    _ => None,
                })
                .collect(),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Display form of a JSON scalar. `null` counts as absent.
pub(crate) fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Outcome for one station in one fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum TelemetryResult {
    #[serde(rename = "ok")]
    Fetched(Telemetry),
    #[serde(rename = "error")]
    Failed { message: String },
}

impl TelemetryResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

impl From<Result<Telemetry, FetchError>> for TelemetryResult {
    fn from(r: Result<Telemetry, FetchError>) -> Self {
        match r {
            Ok(t) => Self::Fetched(t),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// All per-station results of a single fetch cycle. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct FetchBatch {
    generation: u64,
    fetched_at: DateTime<Utc>,
    results: HashMap<String, TelemetryResult>,
}

impl FetchBatch {
    pub fn new(generation: u64, results: HashMap<String, TelemetryResult>) -> Self {
        Self {
            generation,
            fetched_at: Utc::now(),
            results,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn get(&self, station_id: &str) -> Option<&TelemetryResult> {
        self.results.get(station_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn ok_count(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.ok_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TelemetryResult)> {
        self.results.iter()
    }
}

/// Transport seam: fetches one station's stage/flow telemetry.
#[async_trait::async_trait]
pub trait StageflowSource: Send + Sync {
    async fn fetch_stageflow(&self, station_id: &str) -> Result<Telemetry, FetchError>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_payload_and_keeps_field_order() {
        let body = br#"{
            "validTime": "2024-01-01T01:00:00Z",
            "generatedTime": "2024-01-01T01:05:00Z",
            "primary": 4.2,
            "secondary": "120",
            "observed": {
                "primaryUnits": "ft",
                "secondaryUnits": "kcfs",
                "data": [
                    {"validTime": "2024-01-01T00:00:00Z", "primary": 4.1, "secondary": 0.11},
                    {"validTime": "2024-01-01T01:00:00Z", "primary": 4.2, "secondary": 0.12}
                ]
            }
        }"#;
        let t = Telemetry::from_json(body).unwrap();
        assert_eq!(t.primary.as_deref(), Some("4.2"));
        assert_eq!(t.secondary.as_deref(), Some("120"));
        assert_eq!(t.primary_units.as_deref(), Some("ft"));
        assert_eq!(t.observed.len(), 2);

        let last = t.latest_observation().unwrap();
        let keys: Vec<&str> = last.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["validTime", "primary", "secondary"]);
        assert_eq!(
            last.to_string(),
            "validTime: 2024-01-01T01:00:00Z, primary: 4.2, secondary: 0.12"
        );
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        let t = Telemetry::from_json(br#"{"primary": null, "unrelated": 1}"#).unwrap();
        assert_eq!(t, Telemetry::default());
    }

    #[test]
    fn null_observed_block_or_series_is_still_ok() {
        let t = Telemetry::from_json(
            br#"{"validTime":"2024-01-01T00:00:00Z","primary":1.0,"observed":{"data":null}}"#,
        )
        .unwrap();
        assert_eq!(t.valid_time.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(t.primary.as_deref(), Some("1.0"));
        assert!(t.observed.is_empty());
        assert!(t.latest_observation().is_none());

        let t = Telemetry::from_json(br#"{"primary":"2.5","observed":null}"#).unwrap();
        assert_eq!(t.primary.as_deref(), Some("2.5"));
        assert!(t.observed.is_empty());
        assert_eq!(t.primary_units, None);
    }

    #[test]
    fn top_level_non_object_is_decode_error() {
        for body in [&b"[]"[..], b"[1, 2]", b"null", b"42", br#""text""#] {
            let err = Telemetry::from_json(body).unwrap_err();
            match err {
                FetchError::Decode(msg) => assert!(msg.starts_with("expected a JSON object"), "{msg}"),
                other => panic!("expected decode error, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_json_body_is_decode_error() {
        let err = Telemetry::from_json(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn result_serializes_with_status_tag() {
        let ok = serde_json::to_value(TelemetryResult::Fetched(Telemetry::default())).unwrap();
        assert_eq!(ok["status"], "ok");
        let err = serde_json::to_value(TelemetryResult::failed("boom")).unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["message"], "boom");
    }

    #[test]
    fn batch_counts_add_up() {
        let mut m = HashMap::new();
        m.insert("a".to_string(), TelemetryResult::Fetched(Telemetry::default()));
        m.insert("b".to_string(), TelemetryResult::failed("x"));
        m.insert("c".to_string(), TelemetryResult::failed("y"));
        let b = FetchBatch::new(1, m);
        assert_eq!(b.ok_count(), 1);
        assert_eq!(b.failed_count(), 2);
        assert_eq!(b.ok_count() + b.failed_count(), b.len());
    }
}
