//! # Registra API
//!
//! Axum service for the tenant-scoped membership registry: the access
//! request approval pipeline, derived seven-day grants, the confidential
//! document lifecycle, officer credentialing, tenant field encryption, and
//! the audit trail.
//!
//! [`app`] builds the full router around an [`AppState`]; the binary in
//! `main.rs` wires configuration, the optional database, and the listener.

pub mod audit;
pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::metrics::{metrics_middleware, ApiMetrics};
use crate::state::AppState;

pub use crate::auth::{Session, SessionToken, CSRF_HEADER};
pub use crate::state::AppConfig;

/// Build the application router.
///
/// `/v1/*` requires a session; health, metrics, and the OpenAPI document do
/// not. HTTP metrics are recorded for every route including the public
/// ones.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    metrics
        .master_key_ephemeral()
        .set(if state.config.master_key_ephemeral { 1.0 } else { 0.0 });

    let api = Router::new()
        .merge(routes::requests::router())
        .merge(routes::grants::router())
        .merge(routes::documents::router())
        .merge(routes::officers::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(Extension(state.clone()));

    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(serve_metrics))
        .merge(openapi::router());

    Router::new()
        .merge(api)
        .merge(public)
        .layer(from_fn(metrics_middleware))
        .layer(Extension(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness: verifies the database when one is configured; in-memory mode
/// is always ready.
async fn readiness(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    if let Some(pool) = &state.db_pool {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "readiness probe failed");
                StatusCode::SERVICE_UNAVAILABLE
            })?;
    }
    Ok(Json(serde_json::json!({ "status": "ready" })))
}

/// Prometheus scrape endpoint. Domain gauges are recomputed from the stores
/// on each scrape; HTTP counters accumulate in middleware.
async fn serve_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> Result<String, AppError> {
    let now = Utc::now();

    for status in ["pending", "approved", "rejected"] {
        let count = state
            .requests
            .list()
            .iter()
            .filter(|r| !r.is_tombstoned() && r.status.as_str() == status)
            .count();
        metrics
            .access_requests_total()
            .with_label_values(&[status])
            .set(count as f64);
    }

    let live = state.grants.list().iter().filter(|g| g.is_live(now)).count();
    metrics.grants_active().set(live as f64);

    for stage in ["approved_unopened", "opened", "locked", "deleted"] {
        let count = state
            .documents
            .list()
            .iter()
            .filter(|d| d.state().as_str() == stage)
            .count();
        metrics
            .documents_total()
            .with_label_values(&[stage])
            .set(count as f64);
    }

    for status in [
        "pending",
        "requested_to_seminar",
        "in_seminar",
        "seminar_completed",
        "requested_to_oath",
        "ready_to_oath",
        "oath_taken",
        "rejected",
        "cancelled",
    ] {
        let count = state
            .officer_requests
            .list()
            .iter()
            .filter(|r| r.status.as_str() == status)
            .count();
        metrics
            .officer_requests_total()
            .with_label_values(&[status])
            .set(count as f64);
    }

    metrics.officers_total().set(state.officers.len() as f64);
    metrics.audit_events_total().set(state.audit.len() as f64);

    metrics.gather_and_encode().map_err(AppError::Internal)
}
