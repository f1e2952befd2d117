//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use stockyard_agent::AgentRegistry;
use stockyard_core::FleetConfig;
use stockyard_store::Store;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub store: Store,
    pub fleet_config: FleetConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<AgentRegistry>, store: Store, fleet_config: FleetConfig) -> Self {
        Self {
            registry,
            store,
            fleet_config,
            start_time: Instant::now(),
        }
    }
}
