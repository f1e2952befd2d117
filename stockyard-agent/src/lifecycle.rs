//! Agent lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Observable lifecycle of one agent actor.
///
/// Only `Ready` accepts writes. Requests arriving before initialization
/// completes queue in the mailbox; the actor does not poll it until the
/// barrier is passed. `DeleteSubtree` drives `Ready -> Draining ->
/// Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycle {
    /// Actor exists but has not begun loading state.
    Created,
    /// Loading persisted state; all requests wait.
    Initializing,
    /// Serving requests.
    Ready,
    /// Closing subscriptions and rejecting new work.
    Draining,
    /// Gone; the registry entry is removed.
    Terminated,
}

impl AgentLifecycle {
    /// Stable string representation matching the serde `rename_all`
    /// convention.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }

    /// Whether mutating operations are accepted in this state.
    pub fn accepts_writes(self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ready_accepts_writes() {
        assert!(AgentLifecycle::Ready.accepts_writes());
        for state in [
            AgentLifecycle::Created,
            AgentLifecycle::Initializing,
            AgentLifecycle::Draining,
            AgentLifecycle::Terminated,
        ] {
            assert!(!state.accepts_writes(), "{state:?}");
        }
    }
}
