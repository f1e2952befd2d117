//! Request and response envelope types for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{
    AgentType, AlertSeverity, InventoryAlert, InventoryItem, InventoryUpdate, MessageType,
    StoredMessage,
};

// ============================================================================
// REQUEST BODIES
// ============================================================================

/// POST `/message` body.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    pub from: String,
    pub content: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: MessageType,
}

fn default_message_type() -> MessageType {
    MessageType::Direct
}

/// POST `/inventory/sync` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncBody {
    pub updates: Vec<InventoryUpdate>,
}

// ============================================================================
// RESPONSE ENVELOPES
// ============================================================================

/// GET `/state` response.
#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    pub counter: u64,
    pub agents: Vec<String>,
}

/// GET `/increment` response.
#[derive(Debug, Clone, Serialize)]
pub struct CounterResponse {
    pub counter: u64,
}

/// GET `/messages` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub messages: Vec<StoredMessage>,
    pub total_count: i64,
    pub has_more: bool,
}

/// POST `/inventory/stock` response.
#[derive(Debug, Clone, Serialize)]
pub struct StockUpdateResponse {
    pub success: bool,
    pub update: InventoryUpdate,
}

/// GET `/inventory/stock` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub location: String,
    pub agent_type: AgentType,
    pub inventory: Vec<InventoryItem>,
    pub total_items: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// GET `/inventory/query` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQueryResponse {
    pub sku: String,
    pub current_stock: i64,
    pub location: String,
    pub available: bool,
}

/// GET `/inventory/alerts` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsResponse {
    pub alerts: Vec<InventoryAlert>,
    pub total_alerts: usize,
    pub critical_alerts: usize,
}

impl AlertsResponse {
    pub fn from_alerts(alerts: Vec<InventoryAlert>) -> Self {
        let critical_alerts = alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical)
            .count();
        Self {
            total_alerts: alerts.len(),
            critical_alerts,
            alerts,
        }
    }
}

/// Plain acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

/// GET `/healthz` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub live_agents: usize,
}
