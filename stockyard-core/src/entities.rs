//! Entity structs for the Stockyard fleet.
//!
//! All wire-facing types serialize with camelCase field names, matching the
//! subscription protocol and HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::enums::{AgentType, AlertSeverity, MessageType, StockOperation, TrendDirection};

// ============================================================================
// FLEET STATE
// ============================================================================

/// The persisted core of one agent: its counter, children, and role.
///
/// Inventory, messages, subscriptions, and chat stats live in their own
/// tables and runtime structures; this struct is what `fleet_state` rows
/// round-trip through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetState {
    /// Monotonic per-operation counter.
    pub counter: u64,
    /// Direct children by last path segment, kept sorted for stable output.
    pub children: BTreeSet<String>,
    pub agent_type: AgentType,
}

// ============================================================================
// INVENTORY
// ============================================================================

/// One SKU held at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub sku: String,
    pub name: String,
    /// Never negative; decrements clamp at zero.
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub last_updated: DateTime<Utc>,
}

impl InventoryItem {
    /// Whether this item is at or below its low-stock threshold.
    pub fn is_low(&self) -> bool {
        self.current_stock <= self.low_stock_threshold
    }

    /// Alert severity for this item, if it is low.
    pub fn severity(&self) -> Option<AlertSeverity> {
        if !self.is_low() {
            return None;
        }
        if self.current_stock == 0 {
            Some(AlertSeverity::Critical)
        } else {
            Some(AlertSeverity::Warning)
        }
    }
}

/// A single stock mutation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdate {
    pub sku: String,
    /// Always non-negative; the operation decides the sign of the effect.
    pub quantity: i64,
    pub operation: StockOperation,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Canonical path of the location the update applies to.
    #[serde(default)]
    pub location: String,
    /// Display name to set on the item, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Threshold to set on the item, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_stock_threshold: Option<i64>,
}

impl InventoryUpdate {
    /// Apply this update to a current stock level. Decrement clamps at zero.
    pub fn apply_to(&self, current: i64) -> i64 {
        match self.operation {
            StockOperation::Set => self.quantity,
            StockOperation::Increment => current + self.quantity,
            StockOperation::Decrement => (current - self.quantity).max(0),
        }
    }
}

/// A persisted record of one applied stock mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: i64,
    pub sku: String,
    pub operation: StockOperation,
    pub quantity: i64,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// A low-stock alert derived from current inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAlert {
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub severity: AlertSeverity,
    pub location: String,
}

// ============================================================================
// MESSAGES
// ============================================================================

/// A fleet message persisted in `stored_messages` and held in the in-memory
/// ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub from_agent: String,
    /// `None` means broadcast.
    pub to_agent: Option<String>,
    pub content: String,
    pub message_type: MessageType,
}

impl StoredMessage {
    /// Build a new message stamped with the current time.
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: Option<String>,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            from_agent: from_agent.into(),
            to_agent,
            content: content.into(),
            message_type,
        }
    }
}

/// One page of message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<StoredMessage>,
    pub total_count: i64,
    pub has_more: bool,
}

// ============================================================================
// CHAT STATISTICS
// ============================================================================

/// Per-day chat counters for one location.
///
/// Invariant: `success_rate` is `successful_actions / actions_executed * 100`
/// when any action ran, else `0`. The day boundary is calendar UTC.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    pub messages_today: i64,
    pub actions_executed: i64,
    pub successful_actions: i64,
    pub success_rate: f64,
}

impl ChatStats {
    /// Count one user message.
    pub fn record_message(&mut self) {
        self.messages_today += 1;
    }

    /// Count one executed action and whether it succeeded, refreshing the
    /// derived success rate.
    pub fn record_action(&mut self, success: bool) {
        self.actions_executed += 1;
        if success {
            self.successful_actions += 1;
        }
        self.success_rate = if self.actions_executed > 0 {
            self.successful_actions as f64 / self.actions_executed as f64 * 100.0
        } else {
            0.0
        };
    }
}

// ============================================================================
// ANALYSIS, DECISIONS, FORECASTS
// ============================================================================

/// The structured payload a trend analysis is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub should_reorder: bool,
    /// `"critical"`, `"high"`, `"normal"`, or `"low"`.
    pub urgency: String,
    pub reorder_quantity: i64,
    pub trend: TrendDirection,
    pub reasoning: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

/// A persisted inventory analysis row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAnalysis {
    pub id: i64,
    pub sku: String,
    pub location: String,
    /// The raw analysis payload as produced by the model (or fallback).
    pub analysis: serde_json::Value,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// A persisted reorder/hold decision row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDecision {
    pub id: i64,
    pub sku: String,
    pub location: String,
    pub decision_type: String,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted demand forecast row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandForecast {
    pub id: i64,
    pub sku: String,
    pub location: String,
    pub predicted_demand: i64,
    pub confidence: f64,
    pub trend_direction: TrendDirection,
    pub reasoning: String,
    pub forecast_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_clamps_at_zero() {
        let update = InventoryUpdate {
            sku: "SKU-1".to_string(),
            quantity: 150,
            operation: StockOperation::Decrement,
            timestamp: Utc::now(),
            location: "/wh".to_string(),
            name: None,
            low_stock_threshold: None,
        };
        assert_eq!(update.apply_to(100), 0);
        assert_eq!(update.apply_to(151), 1);
    }

    #[test]
    fn test_set_and_increment() {
        let set = InventoryUpdate {
            sku: "SKU-1".to_string(),
            quantity: 7,
            operation: StockOperation::Set,
            timestamp: Utc::now(),
            location: String::new(),
            name: None,
            low_stock_threshold: None,
        };
        assert_eq!(set.apply_to(100), 7);

        let inc = InventoryUpdate {
            operation: StockOperation::Increment,
            ..set
        };
        assert_eq!(inc.apply_to(100), 107);
    }

    #[test]
    fn test_chat_stats_rate_invariant() {
        let mut stats = ChatStats::default();
        assert_eq!(stats.success_rate, 0.0);

        stats.record_action(true);
        assert_eq!(stats.success_rate, 100.0);

        stats.record_action(false);
        assert_eq!(stats.success_rate, 50.0);
        assert_eq!(stats.actions_executed, 2);
        assert_eq!(stats.successful_actions, 1);
    }

    #[test]
    fn test_severity_boundaries() {
        let mut item = InventoryItem {
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            current_stock: 11,
            low_stock_threshold: 10,
            last_updated: Utc::now(),
        };
        assert_eq!(item.severity(), None);

        item.current_stock = 10;
        assert_eq!(item.severity(), Some(AlertSeverity::Warning));

        item.current_stock = 0;
        assert_eq!(item.severity(), Some(AlertSeverity::Critical));
    }

    #[test]
    fn test_stored_message_camel_case_wire_form() {
        let msg = StoredMessage::new("/org", None, "hi", MessageType::Broadcast);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("fromAgent").is_some());
        assert!(json.get("messageType").is_some());
        assert!(json["toAgent"].is_null());
    }
}
