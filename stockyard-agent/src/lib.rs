//! STOCKYARD Agent - Single-Writer Actor Runtime
//!
//! One tokio task per `(tenant, path)` owner key, serialized through a
//! mailbox. The registry is the only process-wide state: it maps canonical
//! owner-key strings to live handles, spawns actors lazily, and routes the
//! hierarchy fabric (peer messages, subtree deletion, upward stock
//! propagation) between them.

mod agent;
mod approval;
mod cache;
mod handle;
mod lifecycle;
mod ops;
mod registry;
mod request;
mod subscriptions;

pub use approval::AutoApproveHook;
pub use handle::AgentHandle;
pub use lifecycle::AgentLifecycle;
pub use registry::{AgentRegistry, Bindings};
pub use request::{ChatOutcome, DeleteChildOutcome, InventorySnapshot, StateView, SyncReport};
pub use subscriptions::SubscriptionId;
