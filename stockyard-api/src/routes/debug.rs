//! Diagnostic handlers. Not part of the stable surface.

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use stockyard_core::OwnerKey;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET `/debug/locations` - every persisted fleet-state row.
pub async fn locations(state: AppState) -> ApiResult<Response> {
    let rows = state
        .store
        .list_locations()
        .await
        .map_err(stockyard_core::FleetError::from)?;
    let total = rows.len();
    Ok(Json(serde_json::json!({
        "locations": rows,
        "total": total,
    }))
    .into_response())
}

/// GET `/debug/db` - persisted row plus in-memory snapshot for one agent.
pub async fn db_snapshot(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let snapshot = state.registry.handle(&key).await.debug_snapshot().await?;
    Ok(Json(snapshot).into_response())
}
