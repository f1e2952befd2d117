//! STOCKYARD Test Utilities
//!
//! Centralized test infrastructure for the Stockyard workspace:
//! - Scripted and recording mocks for the four collaborator ports
//! - An instant approval hook (approve or deny, no waiting)
//! - An in-memory vector store with real cosine scoring
//!
//! Everything here is deterministic; tests assert on recorded calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use stockyard_core::{
    ApprovalHook, MessageBus, ModelClient, ModelError, ModelMessage, ModelOutput, VectorMatch,
    VectorStore, WorkflowDispatcher, WorkflowStatus,
};
pub use stockyard_store::Store;

/// A fresh in-memory store with the schema applied.
pub fn memory_store() -> Store {
    Store::open_in_memory().expect("in-memory store")
}

// ============================================================================
// MOCK MODEL CLIENT
// ============================================================================

/// One recorded model call.
#[derive(Debug, Clone)]
pub struct RecordedModelCall {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub had_schema: bool,
}

/// Scripted model client: pops pre-loaded outputs in order and records
/// every call. When the script runs dry it returns a provider error, which
/// exercises the caller's fallback path.
#[derive(Default)]
pub struct MockModelClient {
    script: Mutex<VecDeque<Result<ModelOutput, ModelError>>>,
    calls: Mutex<Vec<RecordedModelCall>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text completion.
    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(ModelOutput {
            parsed: None,
            text: text.into(),
        }));
    }

    /// Queue a structured completion.
    pub fn push_parsed(&self, parsed: JsonValue) {
        self.script.lock().unwrap().push_back(Ok(ModelOutput {
            text: parsed.to_string(),
            parsed: Some(parsed),
        }));
    }

    /// Queue a provider failure.
    pub fn push_error(&self) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(ModelError::ProviderNotConfigured));
    }

    pub fn calls(&self) -> Vec<RecordedModelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn run(
        &self,
        model: &str,
        messages: &[ModelMessage],
        response_schema: Option<&JsonValue>,
    ) -> Result<ModelOutput, ModelError> {
        self.calls.lock().unwrap().push(RecordedModelCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            had_schema: response_schema.is_some(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::ProviderNotConfigured))
    }
}

// ============================================================================
// RECORDING WORKFLOW DISPATCHER
// ============================================================================

/// One recorded workflow dispatch.
#[derive(Debug, Clone)]
pub struct RecordedDispatch {
    pub name: String,
    pub payload: JsonValue,
}

/// Records every dispatch and returns sequential workflow ids.
#[derive(Default)]
pub struct RecordingWorkflowDispatcher {
    dispatches: Mutex<Vec<RecordedDispatch>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingWorkflowDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatches(&self) -> Vec<RecordedDispatch> {
        self.dispatches.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowDispatcher for RecordingWorkflowDispatcher {
    async fn create(&self, name: &str, payload: JsonValue) -> Option<String> {
        let mut dispatches = self.dispatches.lock().unwrap();
        dispatches.push(RecordedDispatch {
            name: name.to_string(),
            payload,
        });
        Some(format!("wf-{}", dispatches.len()))
    }

    async fn get(&self, _id: &str) -> WorkflowStatus {
        WorkflowStatus::Queued
    }

    async fn cancel(&self, id: &str) {
        self.cancelled.lock().unwrap().push(id.to_string());
    }
}

// ============================================================================
// RECORDING MESSAGE BUS
// ============================================================================

/// Records every publish.
#[derive(Default)]
pub struct RecordingMessageBus {
    published: Mutex<Vec<(String, JsonValue)>>,
}

impl RecordingMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, JsonValue)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBus for RecordingMessageBus {
    async fn send(&self, topic: &str, payload: JsonValue) {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
    }
}

// ============================================================================
// IN-MEMORY VECTOR STORE
// ============================================================================

/// Vector store with real cosine scoring over an in-memory table.
#[derive(Default)]
pub struct InMemoryVectorStore {
    rows: Mutex<Vec<(String, Vec<f32>, Option<JsonValue>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, id: &str, vector: &[f32], metadata: Option<JsonValue>) {
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|(existing, _, _)| existing != id);
        rows.push((id.to_string(), vector.to_vec(), metadata));
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        return_metadata: bool,
    ) -> Vec<VectorMatch> {
        let rows = self.rows.lock().unwrap();
        let mut scored: Vec<VectorMatch> = rows
            .iter()
            .map(|(id, stored, metadata)| VectorMatch {
                id: id.clone(),
                score: cosine(vector, stored),
                metadata: if return_metadata { metadata.clone() } else { None },
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    async fn delete_by_ids(&self, ids: &[String]) {
        self.rows
            .lock()
            .unwrap()
            .retain(|(id, _, _)| !ids.contains(id));
    }
}

// ============================================================================
// INSTANT APPROVAL HOOKS
// ============================================================================

/// Approval hook that decides instantly, recording each request.
pub struct InstantApprovalHook {
    decision: bool,
    requests: Mutex<Vec<(String, i64, String)>>,
}

impl InstantApprovalHook {
    pub fn approving() -> Self {
        Self {
            decision: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            decision: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(sku, quantity, urgency)` per recorded request.
    pub fn requests(&self) -> Vec<(String, i64, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalHook for InstantApprovalHook {
    async fn approve(&self, sku: &str, _location: &str, quantity: i64, urgency: &str) -> bool {
        self.requests
            .lock()
            .unwrap()
            .push((sku.to_string(), quantity, urgency.to_string()));
        self.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_script_order() {
        let model = MockModelClient::new();
        model.push_text("first");
        model.push_error();

        let out = model.run("m", &[], None).await.unwrap();
        assert_eq!(out.text, "first");
        assert!(model.run("m", &[], None).await.is_err());
        // Script exhausted: further calls fail too.
        assert!(model.run("m", &[], None).await.is_err());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_vector_store_ranks_by_cosine() {
        let store = InMemoryVectorStore::new();
        store.insert("a", &[1.0, 0.0], None).await;
        store.insert("b", &[0.0, 1.0], None).await;

        let matches = store.query(&[1.0, 0.1], 1, false).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn test_recording_dispatcher_ids() {
        let dispatcher = RecordingWorkflowDispatcher::new();
        let id = dispatcher
            .create("reorder-workflow", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(id, "wf-1");
        assert_eq!(dispatcher.dispatches().len(), 1);
    }
}
