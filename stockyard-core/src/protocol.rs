//! Subscription Channel Protocol
//!
//! Frame types exchanged over the bidirectional client channel. Every frame
//! is a JSON object tagged by its `type` field; unknown tags are answered
//! with a non-fatal `error` frame rather than dropping the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::InventoryUpdate;
use crate::enums::{ChatRole, StockOperation};

/// Frames a client may send to its agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Increment the agent's counter.
    Increment,

    /// Create a direct child agent.
    CreateAgent { name: String },

    /// Delete a direct child agent (cascades through the subtree).
    DeleteAgent { name: String },

    /// Send a message to one direct child.
    #[serde(rename_all = "camelCase")]
    DirectMessage { agent_name: String, message: String },

    /// Fan a message out to every direct child.
    Broadcast { message: String },

    /// Liveness probe; answered with `pong` plus a state snapshot.
    Ping,

    /// Liveness reply to a server-initiated ping.
    Pong,

    /// Apply one stock mutation.
    StockUpdate {
        sku: String,
        quantity: i64,
        operation: StockOperation,
    },

    /// Look up current stock for one SKU.
    StockQuery { sku: String },

    /// Apply a batch of stock mutations.
    InventorySync { updates: Vec<InventoryUpdate> },

    /// Submit a chat message to the location assistant.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

/// Frames an agent may push to a subscribed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Current state snapshot.
    State { counter: u64, agents: Vec<String> },

    /// A child agent was created.
    AgentCreated { name: String },

    /// A child agent was deleted.
    AgentDeleted { name: String },

    /// A fleet message addressed to or observed by this subscription.
    Message { from: String, content: String },

    /// Liveness reply.
    Pong,

    /// Non-fatal protocol or operation error.
    Error { message: String },

    /// A stock mutation was applied at this location.
    StockUpdate {
        sku: String,
        quantity: i64,
        operation: StockOperation,
    },

    /// Answer to a `stockQuery`.
    StockResponse {
        sku: String,
        quantity: i64,
        location: String,
    },

    /// A SKU crossed its low-stock threshold.
    #[serde(rename_all = "camelCase")]
    LowStockAlert {
        sku: String,
        current_stock: i64,
        threshold: i64,
        location: String,
    },

    /// One chat transcript entry (user echo or assistant reply).
    ChatResponse {
        role: ChatRole,
        content: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },

    /// Current chat statistics for this location.
    #[serde(rename_all = "camelCase")]
    ChatStats {
        messages_today: i64,
        actions_executed: i64,
        success_rate: f64,
    },
}

impl ServerFrame {
    /// The wire tag of this frame, for logging.
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::State { .. } => "state",
            Self::AgentCreated { .. } => "agentCreated",
            Self::AgentDeleted { .. } => "agentDeleted",
            Self::Message { .. } => "message",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
            Self::StockUpdate { .. } => "stockUpdate",
            Self::StockResponse { .. } => "stockResponse",
            Self::LowStockAlert { .. } => "lowStockAlert",
            Self::ChatResponse { .. } => "chatResponse",
            Self::ChatStats { .. } => "chatStats",
        }
    }
}
