// src/error.rs
//! Domain error types for station loading and per-station telemetry fetches.

use std::time::Duration;

/// Fatal station list errors: nothing usable to display.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("station list is empty")]
    Empty,
    #[error("station list produced no valid rows ({dropped} rows dropped)")]
    NoValidRows { dropped: usize },
}

/// A single row rejected at load time. Recovered by dropping the row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct StationCoordinateError {
    pub line: usize,
    pub reason: String,
}

/// Per-station fetch failure. Never propagates past its own station.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP status {status}")]
    Status { status: u16 },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("invalid payload: {0}")]
    Decode(String),
    #[error("fetch task aborted")]
    TaskAborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages_are_human_readable() {
        assert_eq!(
            FetchError::Status { status: 500 }.to_string(),
            "HTTP status 500"
        );
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(10)).to_string(),
            "timed out after 10s"
        );
        assert_eq!(FetchError::TaskAborted.to_string(), "fetch task aborted");
    }
}
