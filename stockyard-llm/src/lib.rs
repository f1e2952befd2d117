//! STOCKYARD LLM - Model Provider Layer
//!
//! Implementations of the [`ModelClient`] port defined in `stockyard-core`.
//! Providers are explicitly constructed - no auto-discovery. `from_env`
//! picks the Anthropic provider when an API key is configured and the
//! deterministic offline fallback otherwise, so the fleet always has a
//! working model binding.

pub mod providers;

use std::sync::Arc;

use stockyard_core::ModelClient;

pub use providers::anthropic::AnthropicModel;
pub use providers::fallback::FallbackModel;

/// Build the model binding from the environment.
///
/// Environment variables:
/// - `STOCKYARD_ANTHROPIC_API_KEY`: enables the Anthropic provider
/// - `STOCKYARD_ANTHROPIC_BASE_URL`: override the API base URL
/// - `STOCKYARD_MODEL_RPM`: provider rate limit, requests per minute (default: 50)
pub fn from_env() -> Arc<dyn ModelClient> {
    match std::env::var("STOCKYARD_ANTHROPIC_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            let rpm = std::env::var("STOCKYARD_MODEL_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50);
            let mut provider = AnthropicModel::new(key, rpm);
            if let Ok(base) = std::env::var("STOCKYARD_ANTHROPIC_BASE_URL") {
                provider = provider.with_base_url(base);
            }
            tracing::info!("model binding: anthropic");
            Arc::new(provider)
        }
        _ => {
            tracing::info!("model binding: offline fallback");
            Arc::new(FallbackModel::default())
        }
    }
}
