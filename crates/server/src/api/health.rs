use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

use super::AppState;

/// Response for the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server can answer at all.
    pub status: String,
    /// Send-capable workers that survived pool verification.
    pub workers: usize,
    /// Sessions currently marked active.
    pub active_sessions: u64,
    /// Bytes delivered across every file, all time.
    pub bytes_delivered: u64,
    /// Completed accesses across every file, all time.
    pub access_count: u64,
}

/// `GET /health` -- returns service status and delivery counters.
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let stats = state.gateway.stats().await?;
    let body = HealthResponse {
        status: "ok".into(),
        workers: stats.sender_workers,
        active_sessions: stats.active_sessions,
        bytes_delivered: stats.bytes_delivered,
        access_count: stats.access_count,
    };
    Ok((StatusCode::OK, Json(body)))
}
