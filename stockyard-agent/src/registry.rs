//! Agent registry - the sole process-wide mutable state.
//!
//! Maps canonical owner-key strings to live agent handles. Entries are
//! created lazily on first lookup, removed when an agent terminates, and
//! otherwise live until process shutdown. `get_or_spawn` holds the registry
//! lock across the spawn, which is what guarantees at most one live agent
//! per owner key.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stockyard_core::{
    ApprovalHook, FleetConfig, FleetResult, InventoryItem, InventoryUpdate, MessageBus,
    MessageType, ModelClient, NoopMessageBus, NoopVectorStore, NoopWorkflowDispatcher, OwnerKey,
    VectorStore, WorkflowDispatcher, MAILBOX_BUFFER,
};
use stockyard_llm::FallbackModel;
use stockyard_store::Store;

use crate::agent::AgentActor;
use crate::approval::AutoApproveHook;
use crate::cache::TtlCache;
use crate::handle::AgentHandle;
use crate::request::{InventorySnapshot, StateView};

// ============================================================================
// BINDINGS
// ============================================================================

/// The four external collaborator bindings plus the approval hook.
///
/// Every field may be a fallback; the fleet functions offline.
#[derive(Clone)]
pub struct Bindings {
    pub model: Arc<dyn ModelClient>,
    pub vector: Arc<dyn VectorStore>,
    pub workflow: Arc<dyn WorkflowDispatcher>,
    pub bus: Arc<dyn MessageBus>,
    pub approval: Arc<dyn ApprovalHook>,
}

impl Bindings {
    /// Fully offline bindings: deterministic model fallback, no-op
    /// collaborators, auto-approval after `config.approval_wait`.
    pub fn offline(config: &FleetConfig) -> Self {
        Self {
            model: Arc::new(FallbackModel),
            vector: Arc::new(NoopVectorStore),
            workflow: Arc::new(NoopWorkflowDispatcher),
            bus: Arc::new(NoopMessageBus),
            approval: Arc::new(AutoApproveHook::new(config.approval_wait)),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Process-wide agent registry with read-through TTL caches.
pub struct AgentRegistry {
    agents: Mutex<HashMap<String, AgentHandle>>,
    store: Store,
    config: FleetConfig,
    bindings: Bindings,
    shutdown: CancellationToken,
    state_cache: TtlCache<StateView>,
    inventory_cache: TtlCache<InventorySnapshot>,
    /// Weak back-reference to the owning `Arc`, handed to spawned actors
    /// so they can reach the fabric. Upgrading cannot fail while the
    /// registry itself is alive.
    self_ref: Weak<AgentRegistry>,
}

impl AgentRegistry {
    pub fn new(store: Store, config: FleetConfig, bindings: Bindings) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            agents: Mutex::new(HashMap::new()),
            state_cache: TtlCache::new(config.cache_ttl_state),
            inventory_cache: TtlCache::new(config.cache_ttl_inventory),
            store,
            config,
            bindings,
            shutdown: CancellationToken::new(),
            self_ref: self_ref.clone(),
        })
    }

    fn strong_self(&self) -> Arc<AgentRegistry> {
        self.self_ref
            .upgrade()
            .expect("registry outlives every borrow of itself")
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Number of live agents. Diagnostic surface.
    pub async fn agent_count(&self) -> usize {
        self.agents.lock().await.len()
    }

    /// The handle for `key`, spawning the actor if it is not live.
    ///
    /// The registry lock is held across the spawn, so two concurrent
    /// lookups for the same key observe exactly one actor.
    pub async fn handle(&self, key: &OwnerKey) -> AgentHandle {
        let canonical = key.canonical();
        let mut agents = self.agents.lock().await;

        if let Some(existing) = agents.get(&canonical) {
            if existing.is_alive() {
                return existing.clone();
            }
            // Terminated actor left a stale entry; replace it.
            agents.remove(&canonical);
        }

        debug!(owner_key = %canonical, "spawning agent");
        let (tx, rx) = mpsc::channel(MAILBOX_BUFFER);
        let handle = AgentHandle::new(key.clone(), tx);
        agents.insert(canonical, handle.clone());

        AgentActor::spawn(
            key.clone(),
            self.store.clone(),
            self.config.clone(),
            self.bindings.clone(),
            self.strong_self(),
            rx,
            self.shutdown.child_token(),
        );

        handle
    }

    /// Drop the registry entry for `key` if its mailbox is closed. Called
    /// by an actor as it terminates; the liveness check keeps a dying actor
    /// from evicting a successor already spawned for the same key.
    pub(crate) async fn remove_if_dead(&self, key: &OwnerKey) {
        let canonical = key.canonical();
        let mut agents = self.agents.lock().await;
        if let Some(handle) = agents.get(&canonical) {
            if handle.is_alive() {
                return;
            }
            agents.remove(&canonical);
        }
        drop(agents);
        self.state_cache.invalidate(&canonical);
        self.inventory_cache.invalidate(&canonical);
        debug!(owner_key = %canonical, "removed agent from registry");
    }

    /// Begin process shutdown: every actor drains and exits.
    pub fn shutdown(&self) {
        info!("shutting down agent registry");
        self.shutdown.cancel();
    }

    // ========================================================================
    // CACHED READS
    // ========================================================================

    /// State snapshot for `key`, served from the TTL cache when fresh.
    pub async fn state_cached(&self, key: &OwnerKey) -> FleetResult<StateView> {
        let canonical = key.canonical();
        if let Some(hit) = self.state_cache.get(&canonical) {
            return Ok(hit);
        }
        let state = self.handle(key).await.get_state().await?;
        self.state_cache.put(&canonical, state.clone());
        Ok(state)
    }

    /// Inventory snapshot for `key`, served from the TTL cache when fresh.
    pub async fn inventory_cached(&self, key: &OwnerKey) -> FleetResult<InventorySnapshot> {
        let canonical = key.canonical();
        if let Some(hit) = self.inventory_cache.get(&canonical) {
            return Ok(hit);
        }
        let snapshot = self.handle(key).await.inventory().await?;
        self.inventory_cache.put(&canonical, snapshot.clone());
        Ok(snapshot)
    }

    /// Invalidate cached reads for `key`. Actors call this before
    /// publishing any event for a mutation.
    pub(crate) fn invalidate_caches(&self, canonical: &str) {
        self.state_cache.invalidate(canonical);
        self.inventory_cache.invalidate(canonical);
    }

    // ========================================================================
    // PEER CALLS (hierarchy fabric)
    // ========================================================================

    /// Deliver a message to the agent at `key`, deadline-bounded.
    pub async fn send_message(
        &self,
        key: &OwnerKey,
        from: &str,
        content: &str,
        message_type: MessageType,
    ) -> FleetResult<()> {
        let handle = self.handle(key).await;
        with_deadline(
            self.config.rpc_timeout,
            key,
            handle.inbound_message(from, content, message_type),
        )
        .await
    }

    /// Recursively delete the subtree rooted at `key`, deadline-bounded.
    pub async fn delete_subtree(&self, key: &OwnerKey) -> FleetResult<()> {
        let handle = self.handle(key).await;
        with_deadline(self.config.rpc_timeout, key, handle.delete_subtree()).await
    }

    /// Apply `update` at `key` (parent propagation), deadline-bounded.
    pub async fn propagate_stock_update(
        &self,
        key: &OwnerKey,
        update: InventoryUpdate,
    ) -> FleetResult<InventoryItem> {
        let handle = self.handle(key).await;
        with_deadline(self.config.rpc_timeout, key, handle.stock_update(update)).await
    }
}

/// Bound a peer call by the fabric deadline.
async fn with_deadline<T>(
    timeout: std::time::Duration,
    key: &OwnerKey,
    call: impl std::future::Future<Output = FleetResult<T>>,
) -> FleetResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| {
            stockyard_core::FleetError::Fabric(stockyard_core::FabricError::CallTimedOut {
                owner_key: key.canonical(),
            })
        })?
}
