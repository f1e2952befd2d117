//! HTTP surface tests driven through the router with `tower::ServiceExt`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use stockyard_agent::{AgentRegistry, Bindings};
use stockyard_api::{create_api_router, ApiConfig, AppState};
use stockyard_core::FleetConfig;
use stockyard_test_utils::{
    memory_store, InMemoryVectorStore, InstantApprovalHook, MockModelClient,
    RecordingMessageBus, RecordingWorkflowDispatcher,
};

fn test_app() -> Router {
    let store = memory_store();
    let config = FleetConfig::default();
    let bindings = Bindings {
        model: Arc::new(MockModelClient::new()),
        vector: Arc::new(InMemoryVectorStore::new()),
        workflow: Arc::new(RecordingWorkflowDispatcher::new()),
        bus: Arc::new(RecordingMessageBus::new()),
        approval: Arc::new(InstantApprovalHook::approving()),
    };
    let registry = AgentRegistry::new(store.clone(), config.clone(), bindings);
    let state = AppState::new(registry, store, config);
    create_api_router(state, &ApiConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "localhost:3000")
        .header("content-type", "application/json")
        .body(match &body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn state_starts_empty_and_increments() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counter"], 0);
    assert_eq!(body["agents"], json!([]));

    let (status, body) = send(&app, "GET", "/increment", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counter"], 1);

    // The cache was invalidated by the write.
    let (_, body) = send(&app, "GET", "/state", None).await;
    assert_eq!(body["counter"], 1);
}

#[tokio::test]
async fn unknown_endpoint_is_404_wrong_verb_is_405_bad_path_is_400() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/definitely/not/here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app, "POST", "/state", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");

    let (status, body) = send(&app, "GET", "/tenant/demo/bad.seg/state", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body.get("timestamp").is_some());
}

#[tokio::test]
async fn stock_decrement_clamps_via_http() {
    let app = test_app();
    let uri = "/tenant/demo/wh/inventory/stock";

    let (status, body) = send(
        &app,
        "POST",
        uri,
        Some(json!({"sku": "SKU-1", "quantity": 100, "operation": "set"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        &app,
        "POST",
        uri,
        Some(json!({"sku": "SKU-1", "quantity": 150, "operation": "decrement"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "/wh");
    assert_eq!(body["totalItems"], 1);
    assert_eq!(body["inventory"][0]["currentStock"], 0);
}

#[tokio::test]
async fn stock_query_known_and_unknown() {
    let app = test_app();
    send(
        &app,
        "POST",
        "/inventory/stock",
        Some(json!({"sku": "SKU-7", "quantity": 9, "operation": "set"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/inventory/query?sku=SKU-7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentStock"], 9);
    assert_eq!(body["available"], true);

    let (status, body) = send(&app, "GET", "/inventory/query?sku=SKU-404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"]["available"], false);
}

#[tokio::test]
async fn inventory_sync_reports_outcomes() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/inventory/sync",
        Some(json!({"updates": [
            {"sku": "SKU-1", "quantity": 5, "operation": "set"},
            {"sku": "no/good", "quantity": 5, "operation": "set"},
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["successful"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn alerts_report_totals_and_severity() {
    let app = test_app();
    send(
        &app,
        "POST",
        "/inventory/stock",
        Some(json!({"sku": "SKU-A", "quantity": 0, "operation": "set", "lowStockThreshold": 5})),
    )
    .await;
    send(
        &app,
        "POST",
        "/inventory/stock",
        Some(json!({"sku": "SKU-B", "quantity": 3, "operation": "set", "lowStockThreshold": 5})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/inventory/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalAlerts"], 2);
    assert_eq!(body["criticalAlerts"], 1);
}

#[tokio::test]
async fn messages_round_trip_with_paging() {
    let app = test_app();

    let (status, _) = send(
        &app,
        "POST",
        "/message",
        Some(json!({"from": "/supplier", "content": "shipment delayed", "type": "direct"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/messages?limit=10&offset=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["messages"][0]["content"], "shipment delayed");

    let (status, body) = send(&app, "POST", "/message", Some(json!({"from": "", "content": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let app = test_app();

    send(&app, "GET", "/tenant/acme/increment", None).await;
    let (_, acme) = send(&app, "GET", "/tenant/acme/state", None).await;
    assert_eq!(acme["counter"], 1);

    let (_, demo) = send(&app, "GET", "/state", None).await;
    assert_eq!(demo["counter"], 0);

    // Host-derived tenant addresses its own agent tree.
    let request = Request::builder()
        .method("GET")
        .uri("/increment")
        .header("host", "zenith.stockyard.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, locations) = send(&app, "GET", "/debug/locations", None).await;
    let keys: Vec<&str> = locations["locations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["location"].as_str().unwrap())
        .collect();
    assert!(keys.contains(&"acme:/"));
    assert!(keys.contains(&"zenith:/"));
}

#[tokio::test]
async fn debug_db_exposes_memory_and_persisted_state() {
    let app = test_app();
    send(&app, "GET", "/increment", None).await;

    let (status, body) = send(&app, "GET", "/debug/db", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ownerKey"], "demo:/");
    assert_eq!(body["memory"]["counter"], 1);
    assert_eq!(body["memory"]["lifecycle"], "ready");
    assert_eq!(body["persisted"]["counter"], 1);
}

#[tokio::test]
async fn delete_subtree_clears_persisted_rows() {
    let app = test_app();
    send(&app, "GET", "/tenant/demo/a/increment", None).await;

    let (status, _) = send(&app, "POST", "/tenant/demo/a/delete-subtree", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/tenant/demo/a/state", None).await;
    assert_eq!(body["counter"], 0);
}
