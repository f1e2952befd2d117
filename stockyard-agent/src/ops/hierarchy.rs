//! Hierarchy operations: children, messaging fabric, subtree deletion.

use futures_util::future::join_all;
use tracing::{info, warn};

use stockyard_core::{
    validate_segment, FleetError, FleetResult, MessageType, ServerFrame, StoredMessage,
};

use crate::agent::AgentActor;
use crate::lifecycle::AgentLifecycle;
use crate::request::{DeleteChildOutcome, StateView};

impl AgentActor {
    /// Register a new direct child. The child agent itself is created
    /// lazily by the registry on its first request.
    pub(crate) async fn op_create_child(&mut self, name: &str) -> FleetResult<StateView> {
        let name = validate_segment(name)?;
        if self.state.children.contains(&name) {
            return Err(FleetError::AgentExists { name });
        }

        self.state.children.insert(name.clone());
        self.persist_state().await?;
        self.invalidate_caches();

        self.subscriptions
            .broadcast(ServerFrame::AgentCreated { name: name.clone() });
        let view = self.state_view();
        self.subscriptions.broadcast(ServerFrame::State {
            counter: view.counter,
            agents: view.agents.clone(),
        });

        info!(owner_key = %self.location, child = %name, "child created");
        Ok(view)
    }

    /// Remove a direct child, cascading deletion through its subtree.
    ///
    /// A failed cascade downgrades to a system notice; the local entry is
    /// removed regardless.
    pub(crate) async fn op_delete_child(&mut self, name: &str) -> FleetResult<DeleteChildOutcome> {
        let name = validate_segment(name)?;
        if !self.state.children.contains(&name) {
            return Err(FleetError::NotFound {
                what: "child agent".to_string(),
                name,
            });
        }

        let child_key = self.key.child(&name)?;
        let cascade_complete = match self.registry.delete_subtree(&child_key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(owner_key = %self.location, child = %name, error = %e, "cascade delete failed");
                let notice = StoredMessage::new(
                    self.path_label(),
                    None,
                    format!("Cascade delete of {name} was incomplete: {e}"),
                    MessageType::System,
                );
                if let Err(store_err) = self.store_message(&notice).await {
                    warn!(owner_key = %self.location, error = %store_err, "failed to store cascade notice");
                }
                self.subscriptions.deliver_message(
                    notice.id,
                    ServerFrame::Message {
                        from: self.path_label(),
                        content: notice.content.clone(),
                    },
                );
                false
            }
        };

        self.state.children.remove(&name);
        self.persist_state().await?;
        self.invalidate_caches();

        self.subscriptions
            .broadcast(ServerFrame::AgentDeleted { name: name.clone() });
        let view = self.state_view();
        self.subscriptions.broadcast(ServerFrame::State {
            counter: view.counter,
            agents: view.agents,
        });

        info!(owner_key = %self.location, child = %name, cascade_complete, "child deleted");
        Ok(DeleteChildOutcome { cascade_complete })
    }

    /// Recursively delete this agent: cascade to every child, clear
    /// persisted and in-memory state, close subscriptions, terminate.
    /// Idempotent - an empty agent simply clears and terminates.
    pub(crate) async fn op_delete_subtree(&mut self) -> FleetResult<()> {
        self.lifecycle = AgentLifecycle::Draining;

        let children: Vec<String> = self.state.children.iter().cloned().collect();
        for name in children {
            match self.key.child(&name) {
                Ok(child_key) => {
                    if let Err(e) = self.registry.delete_subtree(&child_key).await {
                        warn!(owner_key = %self.location, child = %name, error = %e, "subtree cascade failed for child");
                    }
                }
                Err(e) => {
                    warn!(owner_key = %self.location, child = %name, error = %e, "invalid child segment during cascade");
                }
            }
        }

        self.store.purge_location(&self.location).await?;

        self.state = Default::default();
        self.inventory.clear();
        self.messages.clear();
        self.subscriptions.close_all();
        self.invalidate_caches();
        self.lifecycle = AgentLifecycle::Terminated;

        info!(owner_key = %self.location, "subtree deleted, agent terminated");
        Ok(())
    }

    /// Forward a message to one direct child and confirm locally.
    pub(crate) async fn op_direct_message(&mut self, to: &str, message: &str) -> FleetResult<()> {
        let to = validate_segment(to)?;
        if !self.state.children.contains(&to) {
            return Err(FleetError::NotFound {
                what: "child agent".to_string(),
                name: to,
            });
        }

        let child_key = self.key.child(&to)?;
        self.registry
            .send_message(&child_key, &self.path_label(), message, MessageType::Direct)
            .await?;

        let record = StoredMessage::new(
            self.path_label(),
            Some(to.clone()),
            message,
            MessageType::Direct,
        );
        self.store_message(&record).await?;
        self.subscriptions.deliver_message(
            record.id,
            ServerFrame::Message {
                from: format!("📨 {} → {}", self.path_label(), to),
                content: message.to_string(),
            },
        );
        Ok(())
    }

    /// Fan a message out to every direct child in parallel and echo it on
    /// this agent's own subscribers. Partial failures are logged.
    pub(crate) async fn op_broadcast(&mut self, message: &str) -> FleetResult<usize> {
        let record = StoredMessage::new(self.path_label(), None, message, MessageType::Broadcast);
        self.store_message(&record).await?;

        let from = self.path_label();
        let children: Vec<String> = self.state.children.iter().cloned().collect();
        let calls = children.iter().filter_map(|name| {
            let child_key = self.key.child(name).ok()?;
            let registry = self.registry.clone();
            let from = from.clone();
            let content = message.to_string();
            Some(async move {
                let result = registry
                    .send_message(&child_key, &from, &content, MessageType::Broadcast)
                    .await;
                (child_key, result)
            })
        });

        let mut reached = 0usize;
        for (child_key, result) in join_all(calls).await {
            match result {
                Ok(()) => reached += 1,
                Err(e) => {
                    warn!(owner_key = %self.location, child = %child_key, error = %e, "broadcast delivery failed");
                }
            }
        }

        self.subscriptions.deliver_message(
            record.id,
            ServerFrame::Message {
                from: format!("📢 {}", self.path_label()),
                content: message.to_string(),
            },
        );
        Ok(reached)
    }

    /// A message arriving from a peer agent or the HTTP surface: store it
    /// and surface it to subscribers with the sender prefix.
    pub(crate) async fn op_inbound_message(
        &mut self,
        from: &str,
        content: &str,
        message_type: MessageType,
    ) -> FleetResult<()> {
        let to_agent = match message_type {
            MessageType::Broadcast => None,
            _ => Some(self.path_label()),
        };
        let record = StoredMessage::new(from, to_agent, content, message_type);
        self.store_message(&record).await?;

        let display_from = match message_type {
            MessageType::Direct => format!("📨 {from}"),
            MessageType::Broadcast => format!("📢 {from}"),
            MessageType::System => from.to_string(),
        };
        self.subscriptions.deliver_message(
            record.id,
            ServerFrame::Message {
                from: display_from,
                content: content.to_string(),
            },
        );
        Ok(())
    }
}
