//! # ce-api — Axum API Service for Chartered Ease
//!
//! HTTP surface of the Chartered Ease tax and compliance service. Customers
//! log in with a mobile OTP; agents, corporates, admins and associates log
//! in with a password. Clients apply for services, walk through GST and
//! income tax return wizards, and staff move submissions along their status
//! lifecycle.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                     |
//! |------------------------|----------------------------|
//! | `/v1/auth/*`           | [`routes::auth`]           |
//! | `/v1/navigation/*`     | [`routes::navigation`]     |
//! | `/v1/clients/*`        | [`routes::clients`]        |
//! | `/v1/submissions/*`    | [`routes::submissions`]    |
//! | `/v1/filings/*`        | [`routes::filings`]        |
//! | `/v1/dashboard`        | [`routes::dashboard`]      |
//! | `/v1/tasks/*`          | [`routes::tasks`]          |
//! | `/v1/admin/*`          | [`routes::admin`]          |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → MetricsMiddleware (route layer) → Handler
//! ```
//!
//! Health probes and `/metrics` sit outside the auth middleware.

pub mod access;
pub mod accounts;
pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod otp;
pub mod repository;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;

use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes();

    let api = Router::new()
        .merge(routes::auth::router())
        .merge(routes::navigation::router())
        .merge(routes::clients::router())
        .merge(routes::submissions::router())
        .merge(routes::filings::router())
        .merge(routes::dashboard::router())
        .merge(routes::tasks::router())
        .merge(routes::admin::router())
        .merge(openapi::router())
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics));

    Router::new()
        .merge(unauthenticated)
        .merge(api)
        .with_state(state)
}

/// Periodically drop expired sessions, OTP challenges and idle filing
/// wizards.
pub fn spawn_expiry_sweeper(state: AppState, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let sessions = state.sessions.purge_expired();
            let challenges = state.otp.purge_expired();
            let filings = state.purge_stale_filings();
            if sessions + challenges + filings > 0 {
                tracing::debug!(sessions, challenges, filings, "expired state purged");
            }
        }
    })
}

/// GET /metrics — Prometheus scrape endpoint.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Liveness probe. 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. 503 when a configured database does not answer.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = state.repo.pool() {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        app(AppState::new(AppConfig::default()))
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn liveness_ok() {
        let (status, body) = get_text(test_app(), "/health/liveness").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn readiness_without_database() {
        let (status, body) = get_text(test_app(), "/health/readiness").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ready");
    }

    #[tokio::test]
    async fn metrics_unavailable_without_recorder() {
        let (status, _) = get_text(test_app(), "/metrics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn openapi_served_without_auth() {
        let (status, body) = get_text(test_app(), "/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Chartered Ease API"));
    }

    #[tokio::test]
    async fn protected_route_requires_session() {
        let (status, _) = get_text(test_app(), "/v1/dashboard").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_bearer_token_rejected() {
        let resp = test_app()
            .oneshot(
                Request::builder()
                    .uri("/v1/auth/session")
                    .header("authorization", "Bearer deadbeef")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sweeper_drops_idle_filings() {
        let state = AppState::new(AppConfig {
            filing_ttl_secs: 0,
            ..AppConfig::default()
        });
        let filing = state::Filing::GstReturn(ce_state::GstReturnWizard::new(ce_core::ClientId::new()));
        state.filings.insert(filing.id(), filing);

        let sweeper = spawn_expiry_sweeper(state.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();
        assert!(state.filings.is_empty());
    }
}
