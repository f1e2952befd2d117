//! STOCKYARD API - HTTP/WebSocket Front Door
//!
//! This crate is the process boundary of the fleet: it derives the tenant
//! and agent path from each request, classifies the endpoint, and forwards
//! to the owning agent through the registry. Subscription upgrades become
//! long-lived WebSocket sessions; everything else is a JSON request/response
//! against the agent's mailbox.

pub mod config;
pub mod constants;
pub mod error;
pub mod routes;
pub mod routing;
pub mod state;
pub mod types;
pub mod validation;
pub mod ws;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use routing::{classify, derive_tenant, resolve, Endpoint, RouteTarget};
pub use state::AppState;
