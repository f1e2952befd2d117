//! External Collaborator Ports
//!
//! The fleet core treats the model, vector store, workflow backend, and
//! message bus as narrow constructor-injected interfaces. Every port has a
//! deterministic offline fallback so the system keeps functioning when a
//! binding is absent; tests replace them with in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ModelError;

// ============================================================================
// MODEL CLIENT
// ============================================================================

/// One message in a model conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The result of one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Parsed JSON when a response schema was supplied and honored.
    pub parsed: Option<JsonValue>,
    /// Raw text of the completion.
    pub text: String,
}

/// Turns prompts into JSON or text.
///
/// Implementations must be thread-safe. Callers never hard-fail on model
/// errors; the agent substitutes a deterministic fallback reply instead.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one completion.
    ///
    /// # Arguments
    /// * `model` - provider-specific model identifier
    /// * `messages` - the conversation so far
    /// * `response_schema` - optional JSON schema the reply should satisfy
    async fn run(
        &self,
        model: &str,
        messages: &[ModelMessage],
        response_schema: Option<&JsonValue>,
    ) -> Result<ModelOutput, ModelError>;
}

// ============================================================================
// VECTOR STORE
// ============================================================================

/// One nearest-neighbor match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
    pub metadata: Option<JsonValue>,
}

/// Nearest-neighbor lookup over embedded content.
///
/// When no binding is configured, similarity operations return empty results
/// and never error.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert(&self, id: &str, vector: &[f32], metadata: Option<JsonValue>);

    async fn query(&self, vector: &[f32], top_k: usize, return_metadata: bool)
        -> Vec<VectorMatch>;

    async fn delete_by_ids(&self, ids: &[String]);
}

// ============================================================================
// WORKFLOW DISPATCHER
// ============================================================================

/// Status of a dispatched workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Queued,
    Running,
    Complete,
    Failed,
    Unknown,
}

/// Enqueues named background jobs. Dispatch must be non-blocking; unknown
/// workflow names are logged and dropped.
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    /// Enqueue a job; returns the workflow id, or `None` when the name is
    /// unknown to the backend.
    async fn create(&self, name: &str, payload: JsonValue) -> Option<String>;

    async fn get(&self, id: &str) -> WorkflowStatus;

    async fn cancel(&self, id: &str);
}

// ============================================================================
// MESSAGE BUS
// ============================================================================

/// Best-effort publish channel for audit, notification, and embedding
/// updates.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send(&self, topic: &str, payload: JsonValue);
}

// ============================================================================
// APPROVAL HOOK
// ============================================================================

/// Human-in-the-loop approval for large or critical reorders.
///
/// The default implementation auto-approves after a bounded wait; real
/// deployments supply their own.
#[async_trait]
pub trait ApprovalHook: Send + Sync {
    /// Decide whether the described reorder may proceed.
    async fn approve(&self, sku: &str, location: &str, quantity: i64, urgency: &str) -> bool;
}

// ============================================================================
// FALLBACK IMPLEMENTATIONS
// ============================================================================

/// Vector store fallback: every query is empty, every write is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVectorStore;

#[async_trait]
impl VectorStore for NoopVectorStore {
    async fn insert(&self, _id: &str, _vector: &[f32], _metadata: Option<JsonValue>) {}

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _return_metadata: bool,
    ) -> Vec<VectorMatch> {
        Vec::new()
    }

    async fn delete_by_ids(&self, _ids: &[String]) {}
}

/// Workflow fallback: logs the dispatch and reports it as queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWorkflowDispatcher;

#[async_trait]
impl WorkflowDispatcher for NoopWorkflowDispatcher {
    async fn create(&self, name: &str, _payload: JsonValue) -> Option<String> {
        tracing::debug!(workflow = name, "no workflow backend bound, dropping dispatch");
        None
    }

    async fn get(&self, _id: &str) -> WorkflowStatus {
        WorkflowStatus::Unknown
    }

    async fn cancel(&self, _id: &str) {}
}

/// Bus fallback: drops every publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMessageBus;

#[async_trait]
impl MessageBus for NoopMessageBus {
    async fn send(&self, topic: &str, _payload: JsonValue) {
        tracing::trace!(topic, "no message bus bound, dropping publish");
    }
}

// The default auto-approving hook lives in the agent runtime crate; it needs
// a timer and this crate stays runtime-free.
