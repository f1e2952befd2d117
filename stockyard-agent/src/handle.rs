//! Typed handle to one agent's mailbox.
//!
//! Handles are cheap to clone and safe to hold across awaits; they carry no
//! reference to the actor itself, only its owner key and mailbox sender. A
//! send to a terminated agent surfaces as `FabricError::AgentUnreachable`,
//! at which point the registry will lazily resurrect the agent on the next
//! lookup.

use tokio::sync::{mpsc, oneshot};

use stockyard_core::{
    ClientFrame, FabricError, FleetError, FleetResult, InventoryAlert, InventoryItem,
    InventoryUpdate, MessagePage, MessageType, OwnerKey, ServerFrame,
};

use crate::request::{
    AgentRequest, ChatOutcome, DeleteChildOutcome, InventorySnapshot, Responder, StateView,
    SyncReport,
};
use crate::subscriptions::SubscriptionId;

/// Client side of one agent mailbox.
#[derive(Clone)]
pub struct AgentHandle {
    key: OwnerKey,
    tx: mpsc::Sender<AgentRequest>,
}

impl AgentHandle {
    pub(crate) fn new(key: OwnerKey, tx: mpsc::Sender<AgentRequest>) -> Self {
        Self { key, tx }
    }

    pub fn key(&self) -> &OwnerKey {
        &self.key
    }

    /// Whether the actor side of the mailbox is still alive.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    fn unreachable(&self) -> FleetError {
        FleetError::Fabric(FabricError::AgentUnreachable {
            owner_key: self.key.canonical(),
        })
    }

    /// Send a request and await its oneshot reply.
    async fn ask<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> AgentRequest,
    ) -> FleetResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| self.unreachable())?;
        reply_rx.await.map_err(|_| self.unreachable())?
    }

    // ========================================================================
    // STATE
    // ========================================================================

    pub async fn get_state(&self) -> FleetResult<StateView> {
        self.ask(AgentRequest::GetState).await
    }

    pub async fn increment(&self) -> FleetResult<StateView> {
        self.ask(AgentRequest::Increment).await
    }

    // ========================================================================
    // HIERARCHY
    // ========================================================================

    pub async fn create_child(&self, name: &str) -> FleetResult<StateView> {
        let name = name.to_string();
        self.ask(|reply| AgentRequest::CreateChild { name, reply }).await
    }

    pub async fn delete_child(&self, name: &str) -> FleetResult<DeleteChildOutcome> {
        let name = name.to_string();
        self.ask(|reply| AgentRequest::DeleteChild { name, reply }).await
    }

    pub async fn delete_subtree(&self) -> FleetResult<()> {
        self.ask(AgentRequest::DeleteSubtree).await
    }

    pub async fn direct_message(&self, to: &str, message: &str) -> FleetResult<()> {
        let to = to.to_string();
        let message = message.to_string();
        self.ask(|reply| AgentRequest::DirectMessage { to, message, reply })
            .await
    }

    pub async fn broadcast(&self, message: &str) -> FleetResult<usize> {
        let message = message.to_string();
        self.ask(|reply| AgentRequest::Broadcast { message, reply }).await
    }

    pub async fn inbound_message(
        &self,
        from: &str,
        content: &str,
        message_type: MessageType,
    ) -> FleetResult<()> {
        let from = from.to_string();
        let content = content.to_string();
        self.ask(|reply| AgentRequest::InboundMessage {
            from,
            content,
            message_type,
            reply,
        })
        .await
    }

    // ========================================================================
    // INVENTORY
    // ========================================================================

    pub async fn stock_update(&self, update: InventoryUpdate) -> FleetResult<InventoryItem> {
        self.ask(|reply| AgentRequest::StockUpdate { update, reply }).await
    }

    pub async fn stock_query(&self, sku: &str) -> FleetResult<Option<InventoryItem>> {
        let sku = sku.to_string();
        self.ask(|reply| AgentRequest::StockQuery { sku, reply }).await
    }

    pub async fn inventory_sync(&self, updates: Vec<InventoryUpdate>) -> FleetResult<SyncReport> {
        self.ask(|reply| AgentRequest::InventorySync { updates, reply })
            .await
    }

    pub async fn alerts(&self) -> FleetResult<Vec<InventoryAlert>> {
        self.ask(AgentRequest::GetAlerts).await
    }

    pub async fn inventory(&self) -> FleetResult<InventorySnapshot> {
        self.ask(AgentRequest::GetInventory).await
    }

    // ========================================================================
    // MESSAGES & CHAT
    // ========================================================================

    pub async fn messages(&self, limit: i64, offset: i64) -> FleetResult<MessagePage> {
        self.ask(|reply| AgentRequest::GetMessages { limit, offset, reply })
            .await
    }

    pub async fn chat(&self, content: &str, user_id: Option<String>) -> FleetResult<ChatOutcome> {
        let content = content.to_string();
        self.ask(|reply| AgentRequest::Chat {
            content,
            user_id,
            reply,
        })
        .await
    }

    // ========================================================================
    // AI FLOWS
    // ========================================================================

    pub async fn analyze(&self, sku: &str) -> FleetResult<serde_json::Value> {
        let sku = sku.to_string();
        self.ask(|reply| AgentRequest::Analyze { sku, reply }).await
    }

    pub async fn forecast(&self) -> FleetResult<serde_json::Value> {
        self.ask(AgentRequest::Forecast).await
    }

    pub async fn insights(&self) -> FleetResult<serde_json::Value> {
        self.ask(AgentRequest::Insights).await
    }

    pub async fn debug_snapshot(&self) -> FleetResult<serde_json::Value> {
        self.ask(AgentRequest::DebugSnapshot).await
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Attach a subscription. The agent sends the on-open frames (state,
    /// chat history, chat stats) through `sender` before replying.
    pub async fn subscribe(
        &self,
        id: SubscriptionId,
        sender: mpsc::Sender<ServerFrame>,
    ) -> FleetResult<()> {
        self.ask(|reply| AgentRequest::Subscribe { id, sender, reply })
            .await
    }

    /// Detach a subscription. Best-effort.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        let _ = self.tx.send(AgentRequest::Unsubscribe { id }).await;
    }

    /// Submit one protocol frame on behalf of a subscription. Replies flow
    /// back over the subscription channel.
    pub async fn submit_frame(&self, frame: ClientFrame, from: SubscriptionId) -> FleetResult<()> {
        self.tx
            .send(AgentRequest::Frame { frame, from })
            .await
            .map_err(|_| self.unreachable())
    }
}
