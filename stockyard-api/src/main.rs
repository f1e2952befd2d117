//! Stockyard server entry point.
//!
//! Bootstraps tracing, opens the embedded store, wires the collaborator
//! bindings, and serves the Axum router until interrupted.

use tracing_subscriber::EnvFilter;

use stockyard_agent::{AgentRegistry, Bindings};
use stockyard_api::{create_api_router, ApiConfig, AppState};
use stockyard_core::FleetConfig;
use stockyard_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_config = ApiConfig::from_env();
    let fleet_config = FleetConfig::from_env();

    let store = Store::open(&api_config.db_path)?;
    tracing::info!(db = %api_config.db_path.display(), "store ready");

    // Offline fallbacks everywhere, then bind whatever the environment
    // actually provides.
    let mut bindings = Bindings::offline(&fleet_config);
    bindings.model = stockyard_llm::from_env();

    let registry = AgentRegistry::new(store.clone(), fleet_config.clone(), bindings);
    let state = AppState::new(registry.clone(), store, fleet_config);
    let app = create_api_router(state, &api_config);

    let addr = api_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "stockyard listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    registry.shutdown();
    Ok(())
}
