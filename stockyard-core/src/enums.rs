//! Enumerations shared across the Stockyard workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role an agent plays in the fleet hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// Coordinates children; the default for new agents.
    #[default]
    Orchestrator,
    Warehouse,
    Retail,
    Fulfillment,
}

impl AgentType {
    /// Stable string form matching the serde `rename_all` convention.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Warehouse => "warehouse",
            Self::Retail => "retail",
            Self::Fulfillment => "fulfillment",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orchestrator" => Ok(Self::Orchestrator),
            "warehouse" => Ok(Self::Warehouse),
            "retail" => Ok(Self::Retail),
            "fulfillment" => Ok(Self::Fulfillment),
            other => Err(format!("unknown agent type: {other}")),
        }
    }
}

/// How a stock mutation is applied to an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    /// Replace the current stock with the given quantity.
    Set,
    /// Add the quantity to the current stock.
    Increment,
    /// Subtract the quantity, clamping at zero.
    Decrement,
}

impl StockOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        }
    }
}

impl fmt::Display for StockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StockOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Self::Set),
            "increment" => Ok(Self::Increment),
            "decrement" => Ok(Self::Decrement),
            other => Err(format!("unknown stock operation: {other}")),
        }
    }
}

/// Classification of a stored fleet message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Addressed to exactly one agent.
    Direct,
    /// Fanned out to every child of the sender.
    Broadcast,
    /// Generated by the runtime (cascade notices, alerts).
    System,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Broadcast => "broadcast",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "broadcast" => Ok(Self::Broadcast),
            "system" => Ok(Self::System),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// Severity of a low-stock alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Stock has reached zero.
    Critical,
    /// Stock is at or below the configured threshold.
    Warning,
}

/// Direction of a demand trend reported by analysis or forecasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Stable => "stable",
            Self::Decreasing => "decreasing",
        }
    }
}

impl FromStr for TrendDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increasing" => Ok(Self::Increasing),
            "stable" => Ok(Self::Stable),
            "decreasing" => Ok(Self::Decreasing),
            other => Err(format!("unknown trend direction: {other}")),
        }
    }
}

/// Role tag on a chat transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}
