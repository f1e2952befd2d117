//! Agent operations, grouped by concern.
//!
//! Each module extends [`AgentActor`](crate::agent::AgentActor) with the
//! operations of one domain area; the actor's dispatcher in `agent.rs` is
//! the only caller.

mod ai;
mod chat;
mod hierarchy;
mod inventory;
