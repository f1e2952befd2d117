//! STOCKYARD Store - Embedded SQL Storage
//!
//! Durable, versioned storage for fleet agents, backed by SQLite through
//! `rusqlite`. One database file serves the whole process; every row is
//! keyed by the canonical owner-key string, and the single-writer agent
//! discipline means each key's rows are only ever touched by one task.
//!
//! Blocking SQLite calls are wrapped in `tokio::task::spawn_blocking` so the
//! agent runtime never blocks an executor thread.

mod migrations;
mod store;

pub use migrations::SCHEMA_VERSION;
pub use store::{LocationRow, Store};
