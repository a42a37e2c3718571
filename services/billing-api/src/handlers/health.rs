//! Liveness and readiness probes

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub gateway_mode: &'static str,
    pub scheduler: &'static str,
}

/// Liveness: the process is up
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "billing-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness: the database answers, with gateway mode and sweep state
///
/// A round trip through the pool is the one dependency worth gating on. The
/// gateway is only reached per-request and the sweep runs in-process, so
/// those are reported rather than probed.
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.pool).await {
        tracing::error!(error = ?e, "Readiness check could not reach the database");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(ReadyResponse {
        status: "ready",
        database: "connected",
        gateway_mode: if state.config.production {
            "production"
        } else {
            "sandbox"
        },
        scheduler: if state.config.scheduler_enabled {
            "enabled"
        } else {
            "disabled"
        },
    }))
}
