//! Gauge Dashboard: Binary Entrypoint
//! Loads config and the station roster, primes the telemetry cache, and
//! boots the Axum HTTP server.

use gauge_dashboard::{api, config::DashboardConfig, AppState};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Local log output for working on the dashboard outside Shuttle's log
/// stream. Off unless `GAUGE_DEV_LOG=1` on a debug build (or a `local`
/// Shuttle env).
/// `RUST_LOG` overrides the default filter, which surfaces per-station
/// fetch failures and cache misses.
fn enable_dev_tracing() {
    let requested = std::env::var("GAUGE_DEV_LOG").is_ok_and(|v| v == "1");
    let local = cfg!(debug_assertions)
        || std::env::var("SHUTTLE_ENV").is_ok_and(|v| v.eq_ignore_ascii_case("local"));
    if !(requested && local) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gauge_dashboard=debug,reqwest=info,warn"));

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed; dev logging skipped");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = DashboardConfig::load()?;
    let state = AppState::from_config(cfg)?;

    let batch = state.prime().await;
    tracing::info!(
        generation = batch.generation(),
        ok = batch.ok_count(),
        failed = batch.failed_count(),
        "initial telemetry batch loaded"
    );

    Ok(api::router(state).into())
}
