//! Fleet-state and messaging handlers.

use axum::{
    body::Bytes,
    response::{IntoResponse, Response},
    Json,
};

use stockyard_core::OwnerKey;

use crate::error::{ApiError, ApiResult};
use crate::routes::query_param;
use crate::state::AppState;
use crate::types::{
    AckResponse, CounterResponse, MessageBody, MessagesResponse, StateResponse,
};
use crate::validation::ValidateNonEmpty;

/// GET `/state` - counter plus child names, served through the TTL cache.
pub async fn get_state(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let view = state.registry.state_cached(&key).await?;
    Ok(Json(StateResponse {
        counter: view.counter,
        agents: view.agents,
    })
    .into_response())
}

/// GET `/increment` - bump and return the counter.
pub async fn increment(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let view = state.registry.handle(&key).await.increment().await?;
    Ok(Json(CounterResponse { counter: view.counter }).into_response())
}

/// GET `/messages?limit&offset` - paged history in chronological order.
pub async fn get_messages(
    state: AppState,
    key: OwnerKey,
    query: Option<&str>,
) -> ApiResult<Response> {
    let limit = query_param(query, "limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(50i64);
    let offset = query_param(query, "offset")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0i64);

    let page = state.registry.handle(&key).await.messages(limit, offset).await?;
    Ok(Json(MessagesResponse {
        messages: page.messages,
        total_count: page.total_count,
        has_more: page.has_more,
    })
    .into_response())
}

/// POST `/message` - inbound message from a peer or external caller.
pub async fn post_message(state: AppState, key: OwnerKey, body: Bytes) -> ApiResult<Response> {
    let body: MessageBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid message body: {e}")))?;
    body.from.validate_non_empty("from")?;
    body.content.validate_non_empty("content")?;

    state
        .registry
        .handle(&key)
        .await
        .inbound_message(&body.from, &body.content, body.message_type)
        .await?;
    Ok(Json(AckResponse { success: true }).into_response())
}

/// POST `/delete-subtree` - cascade deletion of this agent and all
/// descendants.
pub async fn delete_subtree(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    state.registry.handle(&key).await.delete_subtree().await?;
    Ok(Json(AckResponse { success: true }).into_response())
}
