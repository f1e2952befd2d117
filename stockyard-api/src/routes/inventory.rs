//! Inventory handlers.

use axum::{
    body::Bytes,
    response::{IntoResponse, Response},
    Json,
};

use stockyard_core::{InventoryUpdate, OwnerKey};

use crate::error::{ApiError, ApiResult};
use crate::routes::query_param;
use crate::state::AppState;
use crate::types::{
    AlertsResponse, InventoryResponse, StockQueryResponse, StockUpdateResponse, SyncBody,
};
use crate::validation::ValidateRange;

/// GET `/inventory/stock` - full listing, served through the TTL cache.
pub async fn get_stock(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let snapshot = state.registry.inventory_cached(&key).await?;
    let last_updated = snapshot.items.iter().map(|i| i.last_updated).max();
    Ok(Json(InventoryResponse {
        location: key.path.canonical(),
        agent_type: snapshot.agent_type,
        total_items: snapshot.items.len(),
        inventory: snapshot.items,
        last_updated,
    })
    .into_response())
}

/// POST `/inventory/stock` - apply one stock mutation.
pub async fn post_stock(state: AppState, key: OwnerKey, body: Bytes) -> ApiResult<Response> {
    let update: InventoryUpdate = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid stock update: {e}")))?;
    update.quantity.validate_non_negative("quantity")?;

    let applied = state
        .registry
        .handle(&key)
        .await
        .stock_update(update.clone())
        .await?;
    let mut update = update;
    update.location = key.path.canonical();
    update.timestamp = applied.last_updated;
    Ok(Json(StockUpdateResponse {
        success: true,
        update,
    })
    .into_response())
}

/// GET `/inventory/query?sku` - one SKU, 404 when unknown.
pub async fn query_stock(
    state: AppState,
    key: OwnerKey,
    query: Option<&str>,
) -> ApiResult<Response> {
    let sku = query_param(query, "sku")
        .ok_or_else(|| ApiError::validation("Missing query parameter 'sku'"))?;

    match state.registry.handle(&key).await.stock_query(&sku).await? {
        Some(item) => Ok(Json(StockQueryResponse {
            sku: item.sku,
            current_stock: item.current_stock,
            location: key.path.canonical(),
            available: true,
        })
        .into_response()),
        None => Err(ApiError::not_found(format!("SKU not found: {sku:?}"))
            .with_details(serde_json::json!({ "available": false }))),
    }
}

/// POST `/inventory/sync` - batch apply; partial failures reported, never
/// aborting the batch.
pub async fn sync(state: AppState, key: OwnerKey, body: Bytes) -> ApiResult<Response> {
    let body: SyncBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid sync body: {e}")))?;

    let report = state
        .registry
        .handle(&key)
        .await
        .inventory_sync(body.updates)
        .await?;
    Ok(Json(report).into_response())
}

/// GET `/inventory/alerts` - items at or below threshold.
pub async fn alerts(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let alerts = state.registry.handle(&key).await.alerts().await?;
    Ok(Json(AlertsResponse::from_alerts(alerts)).into_response())
}
