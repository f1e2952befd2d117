//! Mailbox request types.
//!
//! Every operation on an agent travels through its mailbox as one of these
//! variants; request/response operations carry a oneshot reply slot. The
//! mailbox is the serialization point: one variant processed at a time per
//! owner key.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use stockyard_core::{
    AgentType, ChatStats, ClientFrame, FleetResult, InventoryAlert, InventoryItem,
    InventoryUpdate, MessagePage, MessageType, ServerFrame,
};

use crate::subscriptions::SubscriptionId;

/// Reply slot carried by request/response operations.
pub type Responder<T> = oneshot::Sender<FleetResult<T>>;

/// A state snapshot as exposed on the wire: counter plus child names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub counter: u64,
    pub agents: Vec<String>,
}

/// Outcome of one batch inventory sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub successful: usize,
    pub failed: usize,
    /// At most the first ten failure descriptions.
    pub errors: Vec<String>,
}

/// Inventory listing plus the owning agent's role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySnapshot {
    pub agent_type: AgentType,
    pub items: Vec<InventoryItem>,
}

/// Outcome of one chat exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub reply: String,
    pub stats: ChatStats,
}

/// Outcome of deleting a child: whether the cascade fully succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteChildOutcome {
    pub cascade_complete: bool,
}

/// One queued operation for an agent actor.
pub enum AgentRequest {
    /// Read the current state snapshot.
    GetState(Responder<StateView>),

    /// Bump the counter and persist.
    Increment(Responder<StateView>),

    /// Register a new direct child.
    CreateChild {
        name: String,
        reply: Responder<StateView>,
    },

    /// Remove a direct child, cascading deletion through its subtree.
    DeleteChild {
        name: String,
        reply: Responder<DeleteChildOutcome>,
    },

    /// Recursively delete this agent and all descendants.
    DeleteSubtree(Responder<()>),

    /// Forward a message to one direct child.
    DirectMessage {
        to: String,
        message: String,
        reply: Responder<()>,
    },

    /// Fan a message out to every direct child and echo locally.
    Broadcast {
        message: String,
        reply: Responder<usize>,
    },

    /// A message arriving from a peer agent or the HTTP surface.
    InboundMessage {
        from: String,
        content: String,
        message_type: MessageType,
        reply: Responder<()>,
    },

    /// Apply one stock mutation.
    StockUpdate {
        update: InventoryUpdate,
        reply: Responder<InventoryItem>,
    },

    /// Look up one SKU.
    StockQuery {
        sku: String,
        reply: Responder<Option<InventoryItem>>,
    },

    /// Apply a batch of stock mutations; partial failures do not abort.
    InventorySync {
        updates: Vec<InventoryUpdate>,
        reply: Responder<SyncReport>,
    },

    /// Current low-stock alerts.
    GetAlerts(Responder<Vec<InventoryAlert>>),

    /// Full inventory listing with the agent's role.
    GetInventory(Responder<InventorySnapshot>),

    /// Paged message history.
    GetMessages {
        limit: i64,
        offset: i64,
        reply: Responder<MessagePage>,
    },

    /// One chat exchange with the location assistant.
    Chat {
        content: String,
        user_id: Option<String>,
        reply: Responder<ChatOutcome>,
    },

    /// Run the trend-analysis flow for one SKU.
    Analyze {
        sku: String,
        reply: Responder<serde_json::Value>,
    },

    /// Run the demand-forecast flow across current inventory.
    Forecast(Responder<serde_json::Value>),

    /// Recent analyses, decisions, and forecasts with a summary.
    Insights(Responder<serde_json::Value>),

    /// Persisted row plus in-memory snapshot, for diagnostics.
    DebugSnapshot(Responder<serde_json::Value>),

    /// Attach a subscription; the agent replies after registering and
    /// sending the on-open frames through `sender`.
    Subscribe {
        id: SubscriptionId,
        sender: mpsc::Sender<ServerFrame>,
        reply: Responder<()>,
    },

    /// Detach a subscription. Fire-and-forget.
    Unsubscribe { id: SubscriptionId },

    /// A protocol frame submitted over one subscription. Replies and errors
    /// flow back over that subscription, never through a oneshot.
    Frame {
        frame: ClientFrame,
        from: SubscriptionId,
    },
}
