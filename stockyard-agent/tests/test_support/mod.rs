//! Shared fixtures for agent runtime tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use stockyard_agent::{AgentRegistry, Bindings};
use stockyard_core::{AgentPath, FleetConfig, OwnerKey, ServerFrame, Tenant};
use stockyard_test_utils::{
    memory_store, InMemoryVectorStore, InstantApprovalHook, MockModelClient,
    RecordingMessageBus, RecordingWorkflowDispatcher, Store,
};

/// A registry wired to recording mocks over one shared in-memory store.
pub struct Fixture {
    pub registry: Arc<AgentRegistry>,
    pub store: Store,
    pub model: Arc<MockModelClient>,
    pub workflow: Arc<RecordingWorkflowDispatcher>,
    pub bus: Arc<RecordingMessageBus>,
    pub vector: Arc<InMemoryVectorStore>,
    pub approval: Arc<InstantApprovalHook>,
    pub config: FleetConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_approval(InstantApprovalHook::approving())
    }

    pub fn with_approval(approval: InstantApprovalHook) -> Self {
        let store = memory_store();
        Self::over_store(store, approval)
    }

    /// Build a second fixture over the same store, simulating a process
    /// restart. Call `shutdown` on the old fixture first.
    pub fn restart(&self) -> Self {
        Self::over_store(self.store.clone(), InstantApprovalHook::approving())
    }

    fn over_store(store: Store, approval: InstantApprovalHook) -> Self {
        let model = Arc::new(MockModelClient::new());
        let workflow = Arc::new(RecordingWorkflowDispatcher::new());
        let bus = Arc::new(RecordingMessageBus::new());
        let vector = Arc::new(InMemoryVectorStore::new());
        let approval = Arc::new(approval);

        let config = FleetConfig {
            rpc_timeout: Duration::from_secs(2),
            model_timeout: Duration::from_secs(2),
            ..FleetConfig::default()
        };

        let bindings = Bindings {
            model: model.clone(),
            vector: vector.clone(),
            workflow: workflow.clone(),
            bus: bus.clone(),
            approval: approval.clone(),
        };

        let registry = AgentRegistry::new(store.clone(), config.clone(), bindings);
        Self {
            registry,
            store,
            model,
            workflow,
            bus,
            vector,
            approval,
            config,
        }
    }
}

/// Owner key under the default tenant.
pub fn key(path: &str) -> OwnerKey {
    OwnerKey::new(Tenant::default(), AgentPath::parse(path).expect("test path"))
}

/// A bounded subscription channel sized like production sessions.
pub fn subscription_channel() -> (mpsc::Sender<ServerFrame>, mpsc::Receiver<ServerFrame>) {
    mpsc::channel(64)
}

/// Next frame, bounded by a timeout.
pub async fn next_frame(rx: &mut mpsc::Receiver<ServerFrame>) -> ServerFrame {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("subscription closed")
}

/// Skip frames until one matches the predicate.
pub async fn next_matching(
    rx: &mut mpsc::Receiver<ServerFrame>,
    mut pred: impl FnMut(&ServerFrame) -> bool,
) -> ServerFrame {
    loop {
        let frame = next_frame(rx).await;
        if pred(&frame) {
            return frame;
        }
    }
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within deadline");
}
