//! Per-agent subscription fan-out.
//!
//! Each live client session is one bounded `mpsc` sender. Sends never block
//! the agent: a full or closed buffer drops that subscription. A bounded
//! window of delivered message ids per subscription keeps any stored message
//! from reaching the same session twice (history replay can overlap a live
//! broadcast).

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use stockyard_core::ServerFrame;

/// How many delivered message ids each subscription remembers.
const DEDUP_WINDOW: usize = 256;

/// Identifier of one client subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    tx: mpsc::Sender<ServerFrame>,
    delivered: HashSet<Uuid>,
    delivered_order: VecDeque<Uuid>,
}

impl Subscription {
    fn remember(&mut self, id: Uuid) {
        if self.delivered.insert(id) {
            self.delivered_order.push_back(id);
            if self.delivered_order.len() > DEDUP_WINDOW {
                if let Some(evicted) = self.delivered_order.pop_front() {
                    self.delivered.remove(&evicted);
                }
            }
        }
    }
}

/// The set of live subscriptions owned by one agent.
#[derive(Default)]
pub struct SubscriptionSet {
    subs: HashMap<SubscriptionId, Subscription>,
}

impl SubscriptionSet {
    pub fn add(&mut self, id: SubscriptionId, tx: mpsc::Sender<ServerFrame>) {
        self.subs.insert(
            id,
            Subscription {
                tx,
                delivered: HashSet::new(),
                delivered_order: VecDeque::new(),
            },
        );
    }

    pub fn remove(&mut self, id: SubscriptionId) {
        self.subs.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Drop every subscription (their sessions observe channel closure).
    pub fn close_all(&mut self) {
        self.subs.clear();
    }

    /// Send one frame to one subscription. Drops the subscription on
    /// overflow or closure.
    pub fn send_to(&mut self, id: SubscriptionId, frame: ServerFrame) {
        let dead = match self.subs.get(&id) {
            Some(sub) => sub.tx.try_send(frame).is_err(),
            None => false,
        };
        if dead {
            warn!(subscription = %id, "subscription buffer full or closed, dropping");
            self.subs.remove(&id);
        }
    }

    /// Send one frame to every subscription, in a consistent order.
    pub fn broadcast(&mut self, frame: ServerFrame) {
        self.fan_out(frame, None);
    }

    /// Deliver a frame backed by stored message `message_id` to every
    /// subscription that has not seen that message in this session.
    pub fn deliver_message(&mut self, message_id: Uuid, frame: ServerFrame) {
        self.fan_out(frame, Some(message_id));
    }

    /// Deliver a stored-message frame to one subscription, recording the id.
    /// Used during history replay.
    pub fn replay_to(&mut self, id: SubscriptionId, message_id: Uuid, frame: ServerFrame) {
        if let Some(sub) = self.subs.get_mut(&id) {
            if sub.delivered.contains(&message_id) {
                return;
            }
            sub.remember(message_id);
        }
        self.send_to(id, frame);
    }

    fn fan_out(&mut self, frame: ServerFrame, message_id: Option<Uuid>) {
        let mut dead = Vec::new();
        for (id, sub) in self.subs.iter_mut() {
            if let Some(message_id) = message_id {
                if sub.delivered.contains(&message_id) {
                    continue;
                }
                sub.remember(message_id);
            }
            if sub.tx.try_send(frame.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            warn!(subscription = %id, frame = frame.frame_type(), "dropping stalled subscription");
            self.subs.remove(&id);
        }
        debug!(frame = frame.frame_type(), receivers = self.subs.len(), "fanned out frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ServerFrame {
        ServerFrame::Pong
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all() {
        let mut set = SubscriptionSet::default();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        set.add(SubscriptionId::generate(), tx_a);
        set.add(SubscriptionId::generate(), tx_b);

        set.broadcast(frame());
        assert_eq!(rx_a.recv().await.unwrap(), ServerFrame::Pong);
        assert_eq!(rx_b.recv().await.unwrap(), ServerFrame::Pong);
    }

    #[tokio::test]
    async fn test_overflow_drops_subscription() {
        let mut set = SubscriptionSet::default();
        let (tx, _rx) = mpsc::channel(1);
        let id = SubscriptionId::generate();
        set.add(id, tx);

        set.broadcast(frame());
        assert_eq!(set.len(), 1);
        // Second send finds the buffer full; the subscription goes away and
        // the agent is never blocked.
        set.broadcast(frame());
        assert_eq!(set.len(), 0);
    }

    #[tokio::test]
    async fn test_stored_message_not_delivered_twice() {
        let mut set = SubscriptionSet::default();
        let (tx, mut rx) = mpsc::channel(8);
        let id = SubscriptionId::generate();
        set.add(id, tx);

        let message_id = Uuid::new_v4();
        set.replay_to(
            id,
            message_id,
            ServerFrame::Message {
                from: "/".to_string(),
                content: "hi".to_string(),
            },
        );
        set.deliver_message(
            message_id,
            ServerFrame::Message {
                from: "/".to_string(),
                content: "hi".to_string(),
            },
        );

        assert!(matches!(rx.recv().await.unwrap(), ServerFrame::Message { .. }));
        assert!(rx.try_recv().is_err(), "duplicate delivery");
    }

    #[tokio::test]
    async fn test_closed_receiver_is_pruned() {
        let mut set = SubscriptionSet::default();
        let (tx, rx) = mpsc::channel(4);
        set.add(SubscriptionId::generate(), tx);
        drop(rx);

        set.broadcast(frame());
        assert!(set.is_empty());
    }
}
