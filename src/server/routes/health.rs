//! Health Routes
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health - Hub status

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::server::state::AppState;

/// Hub status body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub hub: String,
    pub sessions: usize,
    pub groups: usize,
    pub uptime_seconds: u64,
    pub version: String,
}

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        hub: state.registry.name().to_string(),
        sessions: state.registry.session_count().await,
        groups: state.registry.group_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
