//! # ce-api server entry point
//!
//! Reads `CE_*` configuration, installs logging and the Prometheus
//! recorder, connects the optional database, applies the optional legacy
//! seed and serves the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::EnvFilter;

use ce_api::middleware::metrics::LATENCY_BUCKETS;
use ce_api::otp::LogOtpSender;
use ce_api::{app, db, seed, spawn_expiry_sweeper, AppConfig, AppState};

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let metrics = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("ce_http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;

    tracing::info!(?config, "starting ce-api");

    let pool = db::init_pool().await?;
    let port = config.port;
    let seed_file = config.seed_file.clone();
    let max_document_bytes = config.max_document_bytes;

    let state = AppState::with_parts(config, pool, Arc::new(LogOtpSender), Some(metrics));
    state.hydrate_from_db().await?;

    if let Some(path) = seed_file {
        seed::seed_from_file(&state.repo, &path, max_document_bytes).await?;
    }

    spawn_expiry_sweeper(state.clone(), SWEEP_PERIOD);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
