//! End-to-end subscription channel tests against a live server socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use stockyard_agent::{AgentRegistry, Bindings};
use stockyard_api::{create_api_router, ApiConfig, AppState};
use stockyard_core::FleetConfig;
use stockyard_test_utils::{
    memory_store, InMemoryVectorStore, InstantApprovalHook, MockModelClient,
    RecordingMessageBus, RecordingWorkflowDispatcher, Store,
};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    registry: Arc<AgentRegistry>,
    store: Store,
    model: Arc<MockModelClient>,
    server: JoinHandle<()>,
}

impl TestServer {
    async fn start(store: Store) -> Self {
        let config = FleetConfig::default();
        let model = Arc::new(MockModelClient::new());
        let bindings = Bindings {
            model: model.clone(),
            vector: Arc::new(InMemoryVectorStore::new()),
            workflow: Arc::new(RecordingWorkflowDispatcher::new()),
            bus: Arc::new(RecordingMessageBus::new()),
            approval: Arc::new(InstantApprovalHook::approving()),
        };
        let registry = AgentRegistry::new(store.clone(), config.clone(), bindings);
        let state = AppState::new(registry.clone(), store.clone(), config);
        let app = create_api_router(state, &ApiConfig::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            registry,
            store,
            model,
            server,
        }
    }

    async fn connect(&self, path: &str) -> WsClient {
        let url = format!("ws://{}{}", self.addr, path);
        let (socket, _) = connect_async(url).await.expect("websocket connect");
        socket
    }

    /// Stop the process: server task and fleet both go away.
    fn stop(self) -> Store {
        self.registry.shutdown();
        self.server.abort();
        self.store
    }
}

/// Next JSON frame, skipping transport-level ping/pong.
async fn next_json(socket: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(3), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).expect("frame is JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => panic!("unexpected close"),
            other => panic!("unexpected message {other:?}"),
        }
    }
}

/// Skip frames until one with the given `type` tag arrives.
async fn next_of_type(socket: &mut WsClient, frame_type: &str) -> Value {
    loop {
        let frame = next_json(socket).await;
        if frame["type"] == frame_type {
            return frame;
        }
    }
}

async fn send_json(socket: &mut WsClient, value: Value) {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .expect("send frame");
}

#[tokio::test]
async fn create_list_delete_across_restart() {
    let server = TestServer::start(memory_store()).await;

    let mut session = server.connect("/ws").await;
    let state = next_of_type(&mut session, "state").await;
    assert_eq!(state["counter"], 0);
    assert_eq!(state["agents"], json!([]));

    send_json(&mut session, json!({"type": "createAgent", "name": "warehouse-ny"})).await;
    let created = next_of_type(&mut session, "agentCreated").await;
    assert_eq!(created["name"], "warehouse-ny");
    let state = next_of_type(&mut session, "state").await;
    assert_eq!(state["counter"], 0);
    assert_eq!(state["agents"], json!(["warehouse-ny"]));

    drop(session);
    let store = server.stop();

    // Restart the process over the same store.
    let server = TestServer::start(store).await;
    let mut session = server.connect("/ws").await;
    let state = next_of_type(&mut session, "state").await;
    assert_eq!(state["agents"], json!(["warehouse-ny"]));

    send_json(&mut session, json!({"type": "deleteAgent", "name": "warehouse-ny"})).await;
    let deleted = next_of_type(&mut session, "agentDeleted").await;
    assert_eq!(deleted["name"], "warehouse-ny");
    let state = next_of_type(&mut session, "state").await;
    assert_eq!(state["counter"], 0);
    assert_eq!(state["agents"], json!([]));
}

#[tokio::test]
async fn unknown_frame_type_is_non_fatal() {
    let server = TestServer::start(memory_store()).await;
    let mut session = server.connect("/ws").await;
    next_of_type(&mut session, "state").await;

    send_json(&mut session, json!({"type": "selfDestruct"})).await;
    let error = next_of_type(&mut session, "error").await;
    assert_eq!(error["message"], "Unknown message type");

    // Session is still alive: ping answers with pong plus state.
    send_json(&mut session, json!({"type": "ping"})).await;
    next_of_type(&mut session, "pong").await;
    next_of_type(&mut session, "state").await;
}

#[tokio::test]
async fn stock_updates_broadcast_and_query_over_ws() {
    let server = TestServer::start(memory_store()).await;
    let mut session = server.connect("/ws").await;
    next_of_type(&mut session, "state").await;

    send_json(
        &mut session,
        json!({"type": "stockUpdate", "sku": "SKU-1", "quantity": 25, "operation": "set"}),
    )
    .await;
    let update = next_of_type(&mut session, "stockUpdate").await;
    assert_eq!(update["sku"], "SKU-1");
    assert_eq!(update["quantity"], 25);

    send_json(&mut session, json!({"type": "stockQuery", "sku": "SKU-1"})).await;
    let response = next_of_type(&mut session, "stockResponse").await;
    assert_eq!(response["quantity"], 25);
    assert_eq!(response["location"], "/");

    send_json(&mut session, json!({"type": "stockQuery", "sku": "SKU-404"})).await;
    let error = next_of_type(&mut session, "error").await;
    assert!(error["message"].as_str().unwrap().contains("SKU-404"));
}

#[tokio::test]
async fn chat_round_trip_streams_responses_and_stats() {
    let server = TestServer::start(memory_store()).await;
    server.model.push_text("Looks manageable to me.");

    let mut session = server.connect("/ws").await;
    next_of_type(&mut session, "state").await;
    let stats = next_of_type(&mut session, "chatStats").await;
    assert_eq!(stats["messagesToday"], 0);

    send_json(
        &mut session,
        json!({"type": "chatMessage", "content": "how are we doing today?"}),
    )
    .await;

    let echo = next_of_type(&mut session, "chatResponse").await;
    assert_eq!(echo["role"], "user");
    let reply = next_of_type(&mut session, "chatResponse").await;
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "Looks manageable to me.");

    let stats = next_of_type(&mut session, "chatStats").await;
    assert_eq!(stats["messagesToday"], 1);
    assert_eq!(stats["actionsExecuted"], 1);
    assert_eq!(stats["successRate"], 100.0);
}

#[tokio::test]
async fn subscription_upgrade_requires_websocket() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let server = TestServer::start(memory_store()).await;

    // A plain GET on the subscription endpoint is rejected with 400.
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let request = "GET /ws HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    let status = text.split_whitespace().nth(1).unwrap_or("");
    assert_eq!(status, "400");
}
