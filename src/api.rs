//! HTTP routes serving the dashboard view models and the static page.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::render::{chart, ChartView, MapView, StationCounts};
use crate::stations::Station;
use crate::state::AppState;

pub const CACHE_HEADER: &str = "X-Telemetry-Cache";
const STATIC_DIR: &str = "static";

/// Build the dashboard router: JSON view models, actions, metrics and the static page.
pub fn router(state: AppState) -> Router {
    let metrics: Router<AppState> = state.metrics.router();

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/stations", get(list_stations))
        .route("/api/stations/{id}/chart", get(station_chart))
        .route("/api/map", get(map_view))
        .route("/api/refresh", post(refresh))
        .merge(metrics)
        .fallback_service(ServeDir::new(STATIC_DIR))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn list_stations(State(state): State<AppState>) -> Json<Vec<Station>> {
    Json(state.registry.stations().to_vec())
}

async fn map_view(
    State(state): State<AppState>,
) -> ([(&'static str, &'static str); 1], Json<MapView>) {
    let (batch, read) = state.batch(false).await;
    let view = state.map.render(&state.registry, &batch);
    ([(CACHE_HEADER, read.as_str())], Json(view))
}

#[derive(serde::Serialize)]
struct RefreshOut {
    generation: u64,
    fetched_at: DateTime<Utc>,
    counts: StationCounts,
}

/// Explicit refresh: always runs a new fetch cycle.
async fn refresh(State(state): State<AppState>) -> Json<RefreshOut> {
    let (batch, _) = state.batch(true).await;
    let view = state.map.render(&state.registry, &batch);
    Json(RefreshOut {
        generation: view.generation,
        fetched_at: view.last_updated,
        counts: view.counts,
    })
}

#[derive(serde::Serialize)]
struct ErrorOut {
    error: String,
}

/// Station selection: chart for one station from the cached batch.
async fn station_chart(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.registry.get(&id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorOut {
                error: format!("unknown station '{id}'"),
            }),
        )
            .into_response();
    }
    let (batch, read) = state.batch(false).await;
    let view: ChartView = chart::render(&id, &batch);
    ([(CACHE_HEADER, read.as_str())], Json(view)).into_response()
}
