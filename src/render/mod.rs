// src/render/mod.rs
//! View models consumed by the dashboard page.

pub mod chart;
pub mod map;

pub use chart::{ChartPoint, ChartView, LineChart};
pub use map::{MapRenderer, MapView, Marker, MarkerColor, StationCounts, TileLayer};
