//! Health check endpoint.

use axum::{extract::State, Json};

use crate::state::AppState;
use crate::types::HealthResponse;

/// GET `/healthz` - liveness plus a couple of cheap gauges.
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        live_agents: state.registry.agent_count().await,
    })
}
