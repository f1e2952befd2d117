//! Default values for API configuration.

/// Default bind host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default SQLite database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "stockyard.db";

/// Default CORS preflight cache age in seconds.
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86_400;
