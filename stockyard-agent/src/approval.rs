//! Default reorder approval hook.

use async_trait::async_trait;
use std::time::Duration;

use stockyard_core::ApprovalHook;

/// Auto-approving stand-in for a human approval flow.
///
/// Waits the configured bound (so an operator-facing integration has a
/// window to intervene through its own hook) and then approves. Real
/// deployments supply their own [`ApprovalHook`].
#[derive(Debug, Clone, Copy)]
pub struct AutoApproveHook {
    wait: Duration,
}

impl AutoApproveHook {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl ApprovalHook for AutoApproveHook {
    async fn approve(&self, sku: &str, location: &str, quantity: i64, urgency: &str) -> bool {
        tracing::info!(sku, location, quantity, urgency, "auto-approving reorder");
        tokio::time::sleep(self.wait).await;
        true
    }
}
