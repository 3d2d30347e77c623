//! Health, status and lifecycle handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use hail_ledger::LedgerStats;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub connected_parties: usize,
    pub available_workers: usize,
    pub stats: LedgerStats,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> ApiResult<Json<DaemonStatusResponse>> {
    let stats = state.engine.statistics().await?;
    let directory = state.engine.directory();
    let connected = directory
        .snapshot()
        .iter()
        .filter(|party| party.connected)
        .count();
    let available = directory.list_available_workers().len();

    Ok(Json(DaemonStatusResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        connected_parties: connected,
        available_workers: available,
        stats,
    }))
}

/// Response body for shutdown requests
#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub status: String,
    pub message: String,
}

/// Request a graceful daemon shutdown
pub async fn shutdown_daemon(State(state): State<AppState>) -> Json<ShutdownResponse> {
    if let Err(err) = state.shutdown_tx.send(true) {
        tracing::warn!("Failed to signal shutdown: {}", err);
        return Json(ShutdownResponse {
            status: "error".to_string(),
            message: "Unable to signal shutdown".to_string(),
        });
    }

    Json(ShutdownResponse {
        status: "accepted".to_string(),
        message: "Shutting down".to_string(),
    })
}
