//! Schema migrations.
//!
//! On open, the store creates `schema_version` if absent, reads the highest
//! applied version, and applies every later migration in ascending order,
//! recording each. All DDL is CREATE-IF-NOT-EXISTS so a partially applied
//! migration can be re-run safely.

use rusqlite::Connection;

use stockyard_core::StoreError;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

const DDL_V1: &str = "
CREATE TABLE IF NOT EXISTS fleet_state (
    id TEXT PRIMARY KEY,
    counter INTEGER NOT NULL DEFAULT 0,
    children TEXT NOT NULL DEFAULT '[]',
    agent_type TEXT NOT NULL DEFAULT 'orchestrator',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_items (
    sku TEXT NOT NULL,
    name TEXT NOT NULL,
    current_stock INTEGER NOT NULL DEFAULT 0,
    low_stock_threshold INTEGER NOT NULL DEFAULT 0,
    location TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (location, sku)
);

CREATE TABLE IF NOT EXISTS stored_messages (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    from_agent TEXT NOT NULL,
    to_agent TEXT,
    content TEXT NOT NULL,
    message_type TEXT NOT NULL,
    location TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku TEXT NOT NULL,
    operation TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    location TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku TEXT NOT NULL,
    location TEXT NOT NULL,
    analysis TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku TEXT NOT NULL,
    location TEXT NOT NULL,
    decision_type TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS demand_forecasts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku TEXT NOT NULL,
    location TEXT NOT NULL,
    predicted_demand INTEGER NOT NULL,
    confidence REAL NOT NULL DEFAULT 0,
    trend_direction TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    forecast_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_statistics (
    location TEXT NOT NULL,
    date TEXT NOT NULL,
    messages_today INTEGER NOT NULL DEFAULT 0,
    actions_executed INTEGER NOT NULL DEFAULT 0,
    successful_actions INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (location, date)
);

CREATE INDEX IF NOT EXISTS idx_inventory_items_location
    ON inventory_items (location);
CREATE INDEX IF NOT EXISTS idx_stored_messages_location_ts
    ON stored_messages (location, timestamp);
CREATE INDEX IF NOT EXISTS idx_inventory_transactions_sku_ts
    ON inventory_transactions (sku, timestamp);
CREATE INDEX IF NOT EXISTS idx_demand_forecasts_location_date
    ON demand_forecasts (location, forecast_date);
CREATE INDEX IF NOT EXISTS idx_chat_statistics_location_date
    ON chat_statistics (location, date);
";

/// All migrations in ascending version order.
const MIGRATIONS: &[(i64, &str)] = &[(1, DDL_V1)];

/// Apply every migration newer than the recorded version.
pub(crate) fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
    )
    .map_err(|e| StoreError::MigrationFailed {
        version: 0,
        reason: e.to_string(),
    })?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::MigrationFailed {
            version: 0,
            reason: e.to_string(),
        })?;

    for (version, ddl) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        conn.execute_batch(ddl)
            .map_err(|e| StoreError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| StoreError::MigrationFailed {
            version: *version,
            reason: e.to_string(),
        })?;
        tracing::info!(version, "applied store migration");
    }

    Ok(())
}
