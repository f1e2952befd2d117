//! Fleet Configuration
//!
//! Core runtime knobs recognized at the fleet boundary. Loaded from
//! `STOCKYARD_*` environment variables with development defaults.

use std::time::Duration;

use crate::enums::AgentType;

// ============================================================================
// DEFAULTS
// ============================================================================

/// In-memory message ring size per agent.
pub const DEFAULT_MSG_MEM_RING: usize = 100;

/// Server-side message retention in days.
pub const DEFAULT_MSG_RETENTION_DAYS: i64 = 30;

/// Subscription heartbeat cadence in seconds.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 10;

/// Maximum subscription idle time in seconds before termination.
pub const DEFAULT_IDLE_MAX_SECS: u64 = 120;

/// TTL for cached `/state` reads in seconds.
pub const DEFAULT_CACHE_TTL_STATE_SECS: u64 = 30;

/// TTL for cached inventory reads in seconds.
pub const DEFAULT_CACHE_TTL_INVENTORY_SECS: u64 = 60;

/// Reorder quantity above which human approval is requested.
pub const DEFAULT_APPROVAL_AMOUNT_THRESHOLD: i64 = 1000;

/// Bounded wait for the default auto-approving hook, in seconds.
pub const DEFAULT_APPROVAL_WAIT_SECS: u64 = 2;

/// Deadline for peer agent calls in seconds.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 5;

/// Deadline for model provider calls in seconds.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 10;

/// Maximum page size for message history reads.
pub const MAX_MESSAGE_PAGE_LIMIT: i64 = 100;

/// Per-subscription outbound frame buffer; overflow drops the subscription.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Agent mailbox depth; senders queue beyond this.
pub const MAILBOX_BUFFER: usize = 128;

// ============================================================================
// FLEET CONFIG
// ============================================================================

/// Runtime configuration for the agent fleet.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// In-memory message ring size (oldest dropped on overflow).
    pub msg_mem_ring: usize,

    /// Age beyond which stored messages are purged.
    pub msg_retention: Duration,

    /// Subscription heartbeat cadence.
    pub ping_interval: Duration,

    /// Subscription idle cutoff.
    pub idle_max: Duration,

    /// TTL for cached state reads.
    pub cache_ttl_state: Duration,

    /// TTL for cached inventory reads.
    pub cache_ttl_inventory: Duration,

    /// Reorder quantity above which approval is requested.
    pub approval_amount_threshold: i64,

    /// Bounded wait used by the default auto-approving hook.
    pub approval_wait: Duration,

    /// Type assigned to agents created without an explicit type.
    pub default_agent_type: AgentType,

    /// Deadline on peer agent calls.
    pub rpc_timeout: Duration,

    /// Deadline on model provider calls.
    pub model_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            msg_mem_ring: DEFAULT_MSG_MEM_RING,
            msg_retention: Duration::from_secs(DEFAULT_MSG_RETENTION_DAYS as u64 * 24 * 3600),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            idle_max: Duration::from_secs(DEFAULT_IDLE_MAX_SECS),
            cache_ttl_state: Duration::from_secs(DEFAULT_CACHE_TTL_STATE_SECS),
            cache_ttl_inventory: Duration::from_secs(DEFAULT_CACHE_TTL_INVENTORY_SECS),
            approval_amount_threshold: DEFAULT_APPROVAL_AMOUNT_THRESHOLD,
            approval_wait: Duration::from_secs(DEFAULT_APPROVAL_WAIT_SECS),
            default_agent_type: AgentType::default(),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            model_timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
        }
    }
}

impl FleetConfig {
    /// Create a FleetConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STOCKYARD_MSG_MEM_RING`: in-memory ring size (default: 100)
    /// - `STOCKYARD_MSG_RETENTION_DAYS`: purge age in days (default: 30)
    /// - `STOCKYARD_PING_INTERVAL_SECS`: heartbeat cadence (default: 10)
    /// - `STOCKYARD_IDLE_MAX_SECS`: idle cutoff (default: 120)
    /// - `STOCKYARD_CACHE_TTL_STATE_SECS`: state cache TTL (default: 30)
    /// - `STOCKYARD_CACHE_TTL_INVENTORY_SECS`: inventory cache TTL (default: 60)
    /// - `STOCKYARD_APPROVAL_AMOUNT_THRESHOLD`: approval cutoff (default: 1000)
    /// - `STOCKYARD_APPROVAL_WAIT_SECS`: auto-approve wait (default: 2)
    /// - `STOCKYARD_DEFAULT_AGENT_TYPE`: default role (default: orchestrator)
    /// - `STOCKYARD_RPC_TIMEOUT_SECS`: peer call deadline (default: 5)
    /// - `STOCKYARD_MODEL_TIMEOUT_SECS`: model call deadline (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            msg_mem_ring: env_parse("STOCKYARD_MSG_MEM_RING", defaults.msg_mem_ring),
            msg_retention: Duration::from_secs(
                env_parse("STOCKYARD_MSG_RETENTION_DAYS", DEFAULT_MSG_RETENTION_DAYS as u64)
                    * 24
                    * 3600,
            ),
            ping_interval: env_secs("STOCKYARD_PING_INTERVAL_SECS", defaults.ping_interval),
            idle_max: env_secs("STOCKYARD_IDLE_MAX_SECS", defaults.idle_max),
            cache_ttl_state: env_secs("STOCKYARD_CACHE_TTL_STATE_SECS", defaults.cache_ttl_state),
            cache_ttl_inventory: env_secs(
                "STOCKYARD_CACHE_TTL_INVENTORY_SECS",
                defaults.cache_ttl_inventory,
            ),
            approval_amount_threshold: env_parse(
                "STOCKYARD_APPROVAL_AMOUNT_THRESHOLD",
                defaults.approval_amount_threshold,
            ),
            approval_wait: env_secs("STOCKYARD_APPROVAL_WAIT_SECS", defaults.approval_wait),
            default_agent_type: std::env::var("STOCKYARD_DEFAULT_AGENT_TYPE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_agent_type),
            rpc_timeout: env_secs("STOCKYARD_RPC_TIMEOUT_SECS", defaults.rpc_timeout),
            model_timeout: env_secs("STOCKYARD_MODEL_TIMEOUT_SECS", defaults.model_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
