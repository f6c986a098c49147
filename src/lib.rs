// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod render;
pub mod state;
pub mod stations;
pub mod telemetry;

pub use crate::api::router;
pub use crate::state::AppState;
