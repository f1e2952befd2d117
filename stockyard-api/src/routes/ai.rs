//! Analysis, forecast, and insight handlers.

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use stockyard_core::OwnerKey;

use crate::error::{ApiError, ApiResult};
use crate::routes::query_param;
use crate::state::AppState;

/// GET `/ai/analyze?sku` - run the trend-analysis flow for one SKU.
pub async fn analyze(state: AppState, key: OwnerKey, query: Option<&str>) -> ApiResult<Response> {
    let sku = query_param(query, "sku")
        .ok_or_else(|| ApiError::validation("Missing query parameter 'sku'"))?;

    let insights = state.registry.handle(&key).await.analyze(&sku).await?;
    Ok(Json(insights).into_response())
}

/// POST `/ai/forecast` - run the demand-forecast flow and return recent
/// forecasts.
pub async fn forecast(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let forecasts = state.registry.handle(&key).await.forecast().await?;
    Ok(Json(forecasts).into_response())
}

/// GET `/ai/insights` - recent analyses, decisions, forecasts, summary.
pub async fn insights(state: AppState, key: OwnerKey) -> ApiResult<Response> {
    let insights = state.registry.handle(&key).await.insights().await?;
    Ok(Json(insights).into_response())
}
