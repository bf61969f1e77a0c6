//! Liveness endpoint

use axum::{Json, extract::State as AxumState};
use serde::Serialize;

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub started_at: String,
    pub uptime_seconds: u64,
}

/// GET / - Static liveness payload with uptime
pub async fn root(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "not terribly broken (yet)",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.to_rfc3339(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
