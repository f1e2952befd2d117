//! HTTP routes.
//!
//! Agent paths are dynamic URL prefixes, so the router is one wildcard
//! route plus `/healthz`; `routing::resolve` classifies each request and
//! this dispatcher fans out to the per-concern handlers.

pub mod ai;
pub mod debug;
pub mod fleet;
pub mod health;
pub mod inventory;

use axum::{
    body::Bytes,
    extract::{Host, State, WebSocketUpgrade},
    http::{HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::routing::{self, Endpoint, RouteTarget};
use crate::state::AppState;
use crate::ws::serve_socket;

/// Build the full application router.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = build_cors_layer(config);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/", any(dispatch))
        .route("/*path", any(dispatch))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

/// Classify and dispatch one request.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    Host(host): Host,
    uri: Uri,
    ws: Option<WebSocketUpgrade>,
    body: Bytes,
) -> Response {
    let target = match routing::resolve(Some(&host), uri.path()) {
        Ok(Some(target)) => target,
        Ok(None) => {
            return ApiError::not_found(format!("No such endpoint: {}", uri.path()))
                .into_response();
        }
        Err(e) => return ApiError::validation(e.to_string()).into_response(),
    };

    debug!(
        owner_key = %target.key.canonical(),
        endpoint = ?target.endpoint,
        %method,
        "dispatching request"
    );

    if target.endpoint == Endpoint::Ws {
        return match ws {
            Some(upgrade) => {
                let key = target.key;
                upgrade
                    .on_upgrade(move |socket| serve_socket(socket, state, key))
                    .into_response()
            }
            None => ApiError::validation("subscription endpoint requires a websocket upgrade")
                .into_response(),
        };
    }

    handle_api(state, method, target, uri.query(), body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// The endpoint-by-verb table.
async fn handle_api(
    state: AppState,
    method: Method,
    target: RouteTarget,
    query: Option<&str>,
    body: Bytes,
) -> ApiResult<Response> {
    let key = target.key;
    match target.endpoint {
        Endpoint::State if method == Method::GET => fleet::get_state(state, key).await,
        Endpoint::Increment if method == Method::GET => fleet::increment(state, key).await,
        Endpoint::Messages if method == Method::GET => fleet::get_messages(state, key, query).await,
        Endpoint::PostMessage if method == Method::POST => fleet::post_message(state, key, body).await,
        Endpoint::DeleteSubtree if method == Method::POST => fleet::delete_subtree(state, key).await,

        Endpoint::InventoryStock if method == Method::GET => inventory::get_stock(state, key).await,
        Endpoint::InventoryStock if method == Method::POST => {
            inventory::post_stock(state, key, body).await
        }
        Endpoint::InventoryQuery if method == Method::GET => {
            inventory::query_stock(state, key, query).await
        }
        Endpoint::InventorySync if method == Method::POST => inventory::sync(state, key, body).await,
        Endpoint::InventoryAlerts if method == Method::GET => inventory::alerts(state, key).await,

        Endpoint::AiAnalyze if method == Method::GET => ai::analyze(state, key, query).await,
        Endpoint::AiForecast if method == Method::POST => ai::forecast(state, key).await,
        Endpoint::AiInsights if method == Method::GET => ai::insights(state, key).await,

        Endpoint::DebugLocations if method == Method::GET => debug::locations(state).await,
        Endpoint::DebugDb if method == Method::GET => debug::db_snapshot(state, key).await,

        _ => Err(ApiError::method_not_allowed(&method)),
    }
}

/// Pull one query parameter out of a raw query string, percent-decoded.
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then(|| stockyard_core::percent_decode(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        assert_eq!(
            query_param(Some("sku=SKU-1&limit=10"), "sku").as_deref(),
            Some("SKU-1")
        );
        assert_eq!(
            query_param(Some("sku=A%20B"), "sku").as_deref(),
            Some("A B")
        );
        assert_eq!(query_param(Some("a=1"), "sku"), None);
        assert_eq!(query_param(None, "sku"), None);
    }
}
