//! The agent actor.
//!
//! One tokio task per owner key. The task loads persisted state before it
//! polls its mailbox (the initialization barrier), then processes one
//! request at a time until it terminates or the fleet shuts down.

use std::collections::{BTreeMap, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use stockyard_core::{
    ChatStats, ClientFrame, FabricError, FleetConfig, FleetError, FleetResult, FleetState,
    InventoryItem, InventoryUpdate, MessagePage, OwnerKey, ServerFrame, StoredMessage,
    MAX_MESSAGE_PAGE_LIMIT,
};
use stockyard_store::Store;

use crate::lifecycle::AgentLifecycle;
use crate::registry::{AgentRegistry, Bindings};
use crate::request::{AgentRequest, Responder, StateView};
use crate::subscriptions::{SubscriptionId, SubscriptionSet};

/// Roughly one request in a hundred triggers the retention purge.
const PURGE_PROBABILITY: f64 = 0.01;

/// How many chat transcript entries are replayed on subscription open.
const CHAT_REPLAY_LIMIT: i64 = 50;

pub(crate) struct AgentActor {
    pub(crate) key: OwnerKey,
    /// Canonical owner-key string; every storage row is keyed by this.
    pub(crate) location: String,
    pub(crate) lifecycle: AgentLifecycle,
    pub(crate) state: FleetState,
    pub(crate) inventory: BTreeMap<String, InventoryItem>,
    /// Bounded in-memory message ring; oldest drops on overflow.
    pub(crate) messages: VecDeque<StoredMessage>,
    pub(crate) subscriptions: SubscriptionSet,
    pub(crate) chat_stats: ChatStats,
    /// UTC day (`YYYY-MM-DD`) the counters belong to.
    pub(crate) stats_date: String,
    pub(crate) store: Store,
    pub(crate) config: FleetConfig,
    pub(crate) bindings: Bindings,
    pub(crate) registry: Arc<AgentRegistry>,
    rx: mpsc::Receiver<AgentRequest>,
    shutdown: CancellationToken,
}

impl AgentActor {
    /// Spawn the actor task for `key`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        key: OwnerKey,
        store: Store,
        config: FleetConfig,
        bindings: Bindings,
        registry: Arc<AgentRegistry>,
        rx: mpsc::Receiver<AgentRequest>,
        shutdown: CancellationToken,
    ) {
        let location = key.canonical();
        let actor = Self {
            key,
            location,
            lifecycle: AgentLifecycle::Created,
            state: FleetState::default(),
            inventory: BTreeMap::new(),
            messages: VecDeque::new(),
            subscriptions: SubscriptionSet::default(),
            chat_stats: ChatStats::default(),
            stats_date: today(),
            store,
            config,
            bindings,
            registry,
            rx,
            shutdown,
        };
        tokio::spawn(actor.run());
    }

    async fn run(mut self) {
        self.lifecycle = AgentLifecycle::Initializing;
        self.init().await;
        self.lifecycle = AgentLifecycle::Ready;
        debug!(owner_key = %self.location, "agent ready");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!(owner_key = %self.location, "agent draining on shutdown");
                    self.lifecycle = AgentLifecycle::Draining;
                    self.rx.close();
                    self.subscriptions.close_all();
                    break;
                }

                request = self.rx.recv() => {
                    match request {
                        Some(request) => {
                            self.maybe_purge().await;
                            if let ControlFlow::Break(()) = self.handle_request(request).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // The mailbox is closed by now, so the registry can tell this dead
        // handle apart from a successor spawned for the same key.
        self.registry.remove_if_dead(&self.key).await;
        debug!(owner_key = %self.location, state = self.lifecycle.as_str(), "agent exited");
    }

    /// Initialization barrier: load persisted state, inventory, the message
    /// ring, and today's chat counters. Load failures are logged and the
    /// agent starts from defaults rather than wedging the owner key.
    async fn init(&mut self) {
        match self.store.load_fleet_state(&self.location).await {
            Ok(Some(state)) => self.state = state,
            Ok(None) => {
                self.state = FleetState {
                    agent_type: self.config.default_agent_type,
                    ..FleetState::default()
                };
            }
            Err(e) => error!(owner_key = %self.location, error = %e, "failed to load fleet state"),
        }

        match self.store.load_inventory(&self.location).await {
            Ok(items) => {
                self.inventory = items
                    .into_iter()
                    .map(|item| (item.sku.clone(), item))
                    .collect();
            }
            Err(e) => error!(owner_key = %self.location, error = %e, "failed to load inventory"),
        }

        match self
            .store
            .recent_messages(&self.location, self.config.msg_mem_ring as i64)
            .await
        {
            Ok(messages) => self.messages = messages.into(),
            Err(e) => error!(owner_key = %self.location, error = %e, "failed to load message ring"),
        }

        match self.store.load_chat_stats(&self.location, &self.stats_date).await {
            Ok(Some(stats)) => self.chat_stats = stats,
            Ok(None) => {}
            Err(e) => error!(owner_key = %self.location, error = %e, "failed to load chat stats"),
        }
    }

    // ========================================================================
    // SHARED HELPERS
    // ========================================================================

    /// Path shown to humans (message prefixes, locations in responses).
    pub(crate) fn path_label(&self) -> String {
        self.key.path.canonical()
    }

    pub(crate) fn state_view(&self) -> StateView {
        StateView {
            counter: self.state.counter,
            agents: self.state.children.iter().cloned().collect(),
        }
    }

    pub(crate) async fn persist_state(&self) -> FleetResult<()> {
        self.store
            .save_fleet_state(&self.location, &self.state)
            .await?;
        Ok(())
    }

    /// Invalidate cached reads for this owner key. Always precedes event
    /// publication for a mutation.
    pub(crate) fn invalidate_caches(&self) {
        self.registry.invalidate_caches(&self.location);
    }

    /// Persist one message and append it to the bounded ring.
    pub(crate) async fn store_message(&mut self, message: &StoredMessage) -> FleetResult<()> {
        self.store.append_message(&self.location, message).await?;
        self.messages.push_back(message.clone());
        while self.messages.len() > self.config.msg_mem_ring {
            self.messages.pop_front();
        }
        Ok(())
    }

    /// Roll chat counters over to a new UTC day when needed.
    pub(crate) fn roll_stats_day(&mut self) {
        let today = today();
        if self.stats_date != today {
            self.stats_date = today;
            self.chat_stats = ChatStats::default();
        }
    }

    /// Opportunistic retention purge, triggered on ~1% of requests. One
    /// bounded DELETE inside the writer.
    async fn maybe_purge(&mut self) {
        if rand::thread_rng().gen::<f64>() >= PURGE_PROBABILITY {
            return;
        }
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.msg_retention)
                .unwrap_or_else(|_| chrono::Duration::days(30));
        match self.store.purge_messages_older_than(cutoff).await {
            Ok(0) => {}
            Ok(removed) => debug!(owner_key = %self.location, removed, "purged expired messages"),
            Err(e) => warn!(owner_key = %self.location, error = %e, "message purge failed"),
        }
    }

    fn reject_write<T>(&self, reply: Responder<T>) {
        let _ = reply.send(Err(FleetError::Fabric(FabricError::NotAccepting {
            owner_key: self.location.clone(),
            state: self.lifecycle.as_str().to_string(),
        })));
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    async fn handle_request(&mut self, request: AgentRequest) -> ControlFlow<()> {
        match request {
            AgentRequest::GetState(reply) => {
                let _ = reply.send(Ok(self.state_view()));
            }

            AgentRequest::Increment(reply) => {
                if !self.lifecycle.accepts_writes() {
                    self.reject_write(reply);
                    return ControlFlow::Continue(());
                }
                let _ = reply.send(self.op_increment().await);
            }

            AgentRequest::CreateChild { name, reply } => {
                if !self.lifecycle.accepts_writes() {
                    self.reject_write(reply);
                    return ControlFlow::Continue(());
                }
                let _ = reply.send(self.op_create_child(&name).await);
            }

            AgentRequest::DeleteChild { name, reply } => {
                if !self.lifecycle.accepts_writes() {
                    self.reject_write(reply);
                    return ControlFlow::Continue(());
                }
                let _ = reply.send(self.op_delete_child(&name).await);
            }

            AgentRequest::DeleteSubtree(reply) => {
                // Stop accepting new work before the cascade starts; queued
                // senders observe a closed mailbox and the registry spawns a
                // fresh agent for the next request.
                self.rx.close();
                let result = self.op_delete_subtree().await;
                let terminated = result.is_ok();
                let _ = reply.send(result);
                if terminated {
                    return ControlFlow::Break(());
                }
            }

            AgentRequest::DirectMessage { to, message, reply } => {
                let _ = reply.send(self.op_direct_message(&to, &message).await);
            }

            AgentRequest::Broadcast { message, reply } => {
                let _ = reply.send(self.op_broadcast(&message).await);
            }

            AgentRequest::InboundMessage {
                from,
                content,
                message_type,
                reply,
            } => {
                let _ = reply.send(self.op_inbound_message(&from, &content, message_type).await);
            }

            AgentRequest::StockUpdate { update, reply } => {
                if !self.lifecycle.accepts_writes() {
                    self.reject_write(reply);
                    return ControlFlow::Continue(());
                }
                let _ = reply.send(self.op_stock_update(update).await);
            }

            AgentRequest::StockQuery { sku, reply } => {
                let _ = reply.send(Ok(self.inventory.get(sku.trim()).cloned()));
            }

            AgentRequest::InventorySync { updates, reply } => {
                if !self.lifecycle.accepts_writes() {
                    self.reject_write(reply);
                    return ControlFlow::Continue(());
                }
                let _ = reply.send(self.op_inventory_sync(updates).await);
            }

            AgentRequest::GetAlerts(reply) => {
                let _ = reply.send(Ok(self.current_alerts()));
            }

            AgentRequest::GetInventory(reply) => {
                let _ = reply.send(Ok(crate::request::InventorySnapshot {
                    agent_type: self.state.agent_type,
                    items: self.inventory.values().cloned().collect(),
                }));
            }

            AgentRequest::GetMessages { limit, offset, reply } => {
                let _ = reply.send(self.op_get_messages(limit, offset).await);
            }

            AgentRequest::Chat {
                content,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.op_chat(&content, user_id.as_deref()).await);
            }

            AgentRequest::Analyze { sku, reply } => {
                let _ = reply.send(self.op_analyze(&sku).await);
            }

            AgentRequest::Forecast(reply) => {
                let _ = reply.send(self.op_forecast().await);
            }

            AgentRequest::Insights(reply) => {
                let _ = reply.send(self.op_insights().await);
            }

            AgentRequest::DebugSnapshot(reply) => {
                let _ = reply.send(self.op_debug_snapshot().await);
            }

            AgentRequest::Subscribe { id, sender, reply } => {
                self.op_subscribe(id, sender).await;
                let _ = reply.send(Ok(()));
            }

            AgentRequest::Unsubscribe { id } => {
                self.subscriptions.remove(id);
            }

            AgentRequest::Frame { frame, from } => {
                self.handle_frame(frame, from).await;
            }
        }
        ControlFlow::Continue(())
    }

    // ========================================================================
    // SIMPLE OPERATIONS
    // ========================================================================

    async fn op_increment(&mut self) -> FleetResult<StateView> {
        self.state.counter += 1;
        self.persist_state().await?;
        self.invalidate_caches();
        self.subscriptions.broadcast(ServerFrame::State {
            counter: self.state.counter,
            agents: self.state_view().agents,
        });
        Ok(self.state_view())
    }

    async fn op_get_messages(&self, limit: i64, offset: i64) -> FleetResult<MessagePage> {
        let limit = limit.clamp(1, MAX_MESSAGE_PAGE_LIMIT);
        let offset = offset.max(0);
        let page = self.store.message_page(&self.location, limit, offset).await?;
        Ok(page)
    }

    /// Register the subscription and send the on-open frames: state,
    /// chat-history replay, chat stats.
    async fn op_subscribe(&mut self, id: SubscriptionId, sender: mpsc::Sender<ServerFrame>) {
        self.subscriptions.add(id, sender);
        let view = self.state_view();
        self.subscriptions.send_to(
            id,
            ServerFrame::State {
                counter: view.counter,
                agents: view.agents,
            },
        );

        match self.store.chat_history(&self.location, CHAT_REPLAY_LIMIT).await {
            Ok(history) => {
                for entry in history {
                    let role = match entry.from_agent.as_str() {
                        "assistant" => stockyard_core::ChatRole::Assistant,
                        _ => stockyard_core::ChatRole::User,
                    };
                    self.subscriptions.replay_to(
                        id,
                        entry.id,
                        ServerFrame::ChatResponse {
                            role,
                            content: entry.content,
                            timestamp: entry.timestamp,
                            metadata: None,
                        },
                    );
                }
            }
            Err(e) => warn!(owner_key = %self.location, error = %e, "chat history replay failed"),
        }

        self.roll_stats_day();
        self.subscriptions.send_to(
            id,
            ServerFrame::ChatStats {
                messages_today: self.chat_stats.messages_today,
                actions_executed: self.chat_stats.actions_executed,
                success_rate: self.chat_stats.success_rate,
            },
        );
    }

    async fn op_debug_snapshot(&self) -> FleetResult<serde_json::Value> {
        let persisted = self.store.location_snapshot(&self.location).await?;
        Ok(serde_json::json!({
            "ownerKey": &self.location,
            "persisted": persisted,
            "memory": {
                "lifecycle": self.lifecycle.as_str(),
                "counter": self.state.counter,
                "children": &self.state.children,
                "agentType": self.state.agent_type,
                "inventory": self.inventory.values().collect::<Vec<_>>(),
                "messageRing": self.messages.len(),
                "subscriptions": self.subscriptions.len(),
                "chatStats": &self.chat_stats,
            },
        }))
    }

    // ========================================================================
    // FRAME DISPATCH
    // ========================================================================

    /// Handle one protocol frame from a subscription. Failures become
    /// non-fatal `error` frames on the same subscription.
    async fn handle_frame(&mut self, frame: ClientFrame, from: SubscriptionId) {
        let result: FleetResult<()> = match frame {
            ClientFrame::Increment => self.op_increment().await.map(|_| ()),

            ClientFrame::CreateAgent { name } => self.op_create_child(&name).await.map(|_| ()),

            ClientFrame::DeleteAgent { name } => self.op_delete_child(&name).await.map(|_| ()),

            ClientFrame::DirectMessage { agent_name, message } => {
                self.op_direct_message(&agent_name, &message).await
            }

            ClientFrame::Broadcast { message } => self.op_broadcast(&message).await.map(|_| ()),

            ClientFrame::Ping => {
                self.subscriptions.send_to(from, ServerFrame::Pong);
                let view = self.state_view();
                self.subscriptions.send_to(
                    from,
                    ServerFrame::State {
                        counter: view.counter,
                        agents: view.agents,
                    },
                );
                Ok(())
            }

            // Liveness reply to a server ping; the session layer tracks
            // traffic, nothing to do here.
            ClientFrame::Pong => Ok(()),

            ClientFrame::StockUpdate {
                sku,
                quantity,
                operation,
            } => {
                let update = InventoryUpdate {
                    sku,
                    quantity,
                    operation,
                    timestamp: Utc::now(),
                    location: self.path_label(),
                    name: None,
                    low_stock_threshold: None,
                };
                self.op_stock_update(update).await.map(|_| ())
            }

            ClientFrame::StockQuery { sku } => {
                match self.inventory.get(sku.trim()) {
                    Some(item) => {
                        let frame = ServerFrame::StockResponse {
                            sku: item.sku.clone(),
                            quantity: item.current_stock,
                            location: self.path_label(),
                        };
                        self.subscriptions.send_to(from, frame);
                        Ok(())
                    }
                    None => Err(FleetError::NotFound {
                        what: "SKU".to_string(),
                        name: sku,
                    }),
                }
            }

            ClientFrame::InventorySync { updates } => {
                match self.op_inventory_sync(updates).await {
                    Ok(report) => {
                        if report.failed > 0 {
                            self.subscriptions.send_to(
                                from,
                                ServerFrame::Error {
                                    message: format!(
                                        "inventory sync: {} applied, {} failed",
                                        report.successful, report.failed
                                    ),
                                },
                            );
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }

            ClientFrame::ChatMessage { content, user_id } => {
                self.op_chat(&content, user_id.as_deref()).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            self.subscriptions.send_to(
                from,
                ServerFrame::Error {
                    message: e.to_string(),
                },
            );
        }
    }
}

/// Current UTC calendar day, `YYYY-MM-DD`.
pub(crate) fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
