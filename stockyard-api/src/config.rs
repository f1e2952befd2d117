//! API Configuration Module
//!
//! Server-level settings (bind address, database path, CORS), loaded from
//! environment variables with development defaults. Fleet-level knobs live
//! in [`stockyard_core::FleetConfig`].

use std::path::PathBuf;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_DB_PATH, DEFAULT_PORT,
};

/// API configuration for the server binary.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// SQLite database file path.
    pub db_path: PathBuf,

    /// Allowed CORS origins (empty = allow all, dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create an ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STOCKYARD_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT` / `STOCKYARD_PORT`: bind port (default: 3000)
    /// - `STOCKYARD_DB_PATH`: SQLite file (default: stockyard.db)
    /// - `STOCKYARD_CORS_ORIGINS`: comma-separated origins (empty = allow all)
    /// - `STOCKYARD_CORS_MAX_AGE_SECS`: preflight cache age (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("STOCKYARD_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origins = std::env::var("STOCKYARD_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: std::env::var("STOCKYARD_BIND").unwrap_or(defaults.host),
            port,
            db_path: std::env::var("STOCKYARD_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            cors_origins,
            cors_max_age_secs: std::env::var("STOCKYARD_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
        }
    }

    /// The socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert!(config.cors_origins.is_empty());
    }
}
