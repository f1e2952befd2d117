//! Typed store accessors.
//!
//! Every public method clones the shared connection handle and runs its SQL
//! on the blocking pool. Multi-statement writes that belong to one logical
//! operation run inside a single transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;

use stockyard_core::{
    AgentType, ChatStats, DemandForecast, FleetState, InventoryAnalysis, InventoryDecision,
    InventoryItem, InventoryTransaction, InventoryUpdate, MessagePage, MessageType, StoreError,
    StoredMessage, TrendDirection,
};

use crate::migrations::apply_migrations;

/// One persisted `fleet_state` row, as dumped by the debug endpoints.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRow {
    pub location: String,
    pub counter: u64,
    pub children: Vec<String>,
    pub agent_type: AgentType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Handle to the embedded SQL store.
///
/// Cheap to clone; all clones share one SQLite connection guarded by a
/// mutex. Contention is negligible because each owner key's rows are only
/// touched by that agent's single writer.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and bring the schema up to
    /// date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database. Used by tests and offline tooling.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: ":memory:".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(query_err)?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(query_err)?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::QueryFailed {
                reason: "store mutex poisoned".to_string(),
            })?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::WorkerGone {
            reason: e.to_string(),
        })?
    }

    // ========================================================================
    // FLEET STATE
    // ========================================================================

    /// Load the persisted state for one owner key, if any.
    pub async fn load_fleet_state(&self, location: &str) -> Result<Option<FleetState>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT counter, children, agent_type FROM fleet_state WHERE id = ?1",
                params![location],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(query_err)?
            .map(|(counter, children_json, agent_type)| {
                Ok(FleetState {
                    counter: counter.max(0) as u64,
                    children: serde_json::from_str(&children_json).map_err(|e| {
                        StoreError::DecodeFailed {
                            key: location.clone(),
                            reason: format!("children: {e}"),
                        }
                    })?,
                    agent_type: agent_type.parse().map_err(|e: String| {
                        StoreError::DecodeFailed {
                            key: location.clone(),
                            reason: e,
                        }
                    })?,
                })
            })
            .transpose()
        })
        .await
    }

    /// Insert or update the persisted state for one owner key.
    pub async fn save_fleet_state(
        &self,
        location: &str,
        state: &FleetState,
    ) -> Result<(), StoreError> {
        let location = location.to_string();
        let counter = state.counter as i64;
        let children = serde_json::to_string(&state.children).unwrap_or_else(|_| "[]".to_string());
        let agent_type = state.agent_type.as_str();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO fleet_state (id, counter, children, agent_type, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                     counter = excluded.counter,
                     children = excluded.children,
                     agent_type = excluded.agent_type,
                     updated_at = excluded.updated_at",
                params![location, counter, children, agent_type, now],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    /// Remove every row belonging to one owner key, in one transaction.
    /// Used by subtree deletion.
    pub async fn purge_location(&self, location: &str) -> Result<(), StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(tx_err)?;
            for sql in [
                "DELETE FROM fleet_state WHERE id = ?1",
                "DELETE FROM inventory_items WHERE location = ?1",
                "DELETE FROM stored_messages WHERE location = ?1",
                "DELETE FROM inventory_transactions WHERE location = ?1",
                "DELETE FROM inventory_analysis WHERE location = ?1",
                "DELETE FROM inventory_decisions WHERE location = ?1",
                "DELETE FROM demand_forecasts WHERE location = ?1",
                "DELETE FROM chat_statistics WHERE location = ?1",
            ] {
                tx.execute(sql, params![location]).map_err(query_err)?;
            }
            tx.commit().map_err(tx_err)
        })
        .await
    }

    /// Dump every persisted `fleet_state` row. Diagnostic surface only.
    pub async fn list_locations(&self) -> Result<Vec<LocationRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, counter, children, agent_type, created_at, updated_at
                     FROM fleet_state ORDER BY id",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(query_err)?;

            let mut out = Vec::new();
            for row in rows {
                let (location, counter, children_json, agent_type, created_at, updated_at) =
                    row.map_err(query_err)?;
                out.push(LocationRow {
                    counter: counter.max(0) as u64,
                    children: serde_json::from_str(&children_json).unwrap_or_default(),
                    agent_type: agent_type.parse().unwrap_or_default(),
                    created_at: parse_ts(&created_at, &location)?,
                    updated_at: parse_ts(&updated_at, &location)?,
                    location,
                });
            }
            Ok(out)
        })
        .await
    }

    /// The persisted row for one owner key, if any. Diagnostic surface only.
    pub async fn location_snapshot(&self, location: &str) -> Result<Option<LocationRow>, StoreError> {
        let target = location.to_string();
        let rows = self.list_locations().await?;
        Ok(rows.into_iter().find(|row| row.location == target))
    }

    // ========================================================================
    // INVENTORY
    // ========================================================================

    /// All inventory items at one owner key, ordered by SKU.
    pub async fn load_inventory(&self, location: &str) -> Result<Vec<InventoryItem>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT sku, name, current_stock, low_stock_threshold, updated_at
                     FROM inventory_items WHERE location = ?1 ORDER BY sku",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![location], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(query_err)?;

            let mut items = Vec::new();
            for row in rows {
                let (sku, name, current_stock, low_stock_threshold, updated_at) =
                    row.map_err(query_err)?;
                items.push(InventoryItem {
                    last_updated: parse_ts(&updated_at, &sku)?,
                    sku,
                    name,
                    current_stock,
                    low_stock_threshold,
                });
            }
            Ok(items)
        })
        .await
    }

    /// Persist one applied stock mutation: the new item row and its
    /// transaction record, atomically.
    pub async fn persist_stock_mutation(
        &self,
        location: &str,
        item: &InventoryItem,
        update: &InventoryUpdate,
    ) -> Result<(), StoreError> {
        let location = location.to_string();
        let item = item.clone();
        let update = update.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(tx_err)?;
            let now = Utc::now().to_rfc3339();
            tx.execute(
                "INSERT INTO inventory_items
                     (sku, name, current_stock, low_stock_threshold, location, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT (location, sku) DO UPDATE SET
                     name = excluded.name,
                     current_stock = excluded.current_stock,
                     low_stock_threshold = excluded.low_stock_threshold,
                     updated_at = excluded.updated_at",
                params![
                    item.sku,
                    item.name,
                    item.current_stock,
                    item.low_stock_threshold,
                    location,
                    now
                ],
            )
            .map_err(query_err)?;
            tx.execute(
                "INSERT INTO inventory_transactions (sku, operation, quantity, location, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    update.sku,
                    update.operation.as_str(),
                    update.quantity,
                    location,
                    update.timestamp.to_rfc3339()
                ],
            )
            .map_err(query_err)?;
            tx.commit().map_err(tx_err)
        })
        .await
    }

    /// Recent transactions for one SKU at one owner key, newest first.
    pub async fn recent_transactions(
        &self,
        location: &str,
        sku: &str,
        limit: i64,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        let location = location.to_string();
        let sku = sku.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, sku, operation, quantity, location, timestamp
                     FROM inventory_transactions
                     WHERE location = ?1 AND sku = ?2
                     ORDER BY timestamp DESC LIMIT ?3",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![location, sku, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(query_err)?;

            let mut out = Vec::new();
            for row in rows {
                let (id, sku, operation, quantity, location, timestamp) = row.map_err(query_err)?;
                out.push(InventoryTransaction {
                    id,
                    operation: operation
                        .parse()
                        .map_err(|e: String| StoreError::DecodeFailed {
                            key: sku.clone(),
                            reason: e,
                        })?,
                    timestamp: parse_ts(&timestamp, &sku)?,
                    sku,
                    quantity,
                    location,
                });
            }
            Ok(out)
        })
        .await
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Append one message for an owner key.
    pub async fn append_message(
        &self,
        location: &str,
        message: &StoredMessage,
    ) -> Result<(), StoreError> {
        let location = location.to_string();
        let message = message.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO stored_messages
                     (id, timestamp, from_agent, to_agent, content, message_type, location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id.to_string(),
                    message.timestamp.to_rfc3339(),
                    message.from_agent,
                    message.to_agent,
                    message.content,
                    message.message_type.as_str(),
                    location
                ],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    /// One page of history in chronological order.
    pub async fn message_page(
        &self,
        location: &str,
        limit: i64,
        offset: i64,
    ) -> Result<MessagePage, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let total_count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM stored_messages WHERE location = ?1",
                    params![location],
                    |row| row.get(0),
                )
                .map_err(query_err)?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, timestamp, from_agent, to_agent, content, message_type
                     FROM stored_messages WHERE location = ?1
                     ORDER BY timestamp ASC LIMIT ?2 OFFSET ?3",
                )
                .map_err(query_err)?;
            let messages = collect_messages(&mut stmt, params![location, limit, offset])?;

            let has_more = offset + (messages.len() as i64) < total_count;
            Ok(MessagePage {
                messages,
                total_count,
                has_more,
            })
        })
        .await
    }

    /// The most recent `limit` messages, returned in chronological order.
    /// Used to warm the in-memory ring at startup.
    pub async fn recent_messages(
        &self,
        location: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, timestamp, from_agent, to_agent, content, message_type
                     FROM stored_messages WHERE location = ?1
                     ORDER BY timestamp DESC LIMIT ?2",
                )
                .map_err(query_err)?;
            let mut messages = collect_messages(&mut stmt, params![location, limit])?;
            messages.reverse();
            Ok(messages)
        })
        .await
    }

    /// Chat transcript entries (user and assistant messages) in
    /// chronological order, for history replay on subscription open.
    pub async fn chat_history(
        &self,
        location: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, timestamp, from_agent, to_agent, content, message_type
                     FROM stored_messages
                     WHERE location = ?1 AND from_agent IN ('user', 'assistant')
                     ORDER BY timestamp DESC LIMIT ?2",
                )
                .map_err(query_err)?;
            let mut messages = collect_messages(&mut stmt, params![location, limit])?;
            messages.reverse();
            Ok(messages)
        })
        .await
    }

    /// Delete every stored message older than `cutoff`, across all owner
    /// keys. One bounded DELETE; returns the number of rows removed.
    pub async fn purge_messages_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM stored_messages WHERE timestamp < ?1",
                params![cutoff.to_rfc3339()],
            )
            .map_err(query_err)
        })
        .await
    }

    // ========================================================================
    // ANALYSIS, DECISIONS, FORECASTS
    // ========================================================================

    /// Record one trend analysis; returns the row id.
    pub async fn insert_analysis(
        &self,
        location: &str,
        sku: &str,
        analysis: &JsonValue,
        confidence: f64,
    ) -> Result<i64, StoreError> {
        let location = location.to_string();
        let sku = sku.to_string();
        let analysis = analysis.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO inventory_analysis (sku, location, analysis, confidence, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![sku, location, analysis, confidence, Utc::now().to_rfc3339()],
            )
            .map_err(query_err)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Recent analyses at one owner key, newest first.
    pub async fn recent_analyses(
        &self,
        location: &str,
        limit: i64,
    ) -> Result<Vec<InventoryAnalysis>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, sku, location, analysis, confidence, timestamp
                     FROM inventory_analysis WHERE location = ?1
                     ORDER BY timestamp DESC LIMIT ?2",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![location, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(query_err)?;

            let mut out = Vec::new();
            for row in rows {
                let (id, sku, location, analysis, confidence, timestamp) =
                    row.map_err(query_err)?;
                out.push(InventoryAnalysis {
                    id,
                    analysis: serde_json::from_str(&analysis).unwrap_or(JsonValue::Null),
                    confidence,
                    timestamp: parse_ts(&timestamp, &sku)?,
                    sku,
                    location,
                });
            }
            Ok(out)
        })
        .await
    }

    /// Record one reorder/hold decision; returns the row id.
    pub async fn insert_decision(
        &self,
        location: &str,
        sku: &str,
        decision_type: &str,
        reasoning: &str,
    ) -> Result<i64, StoreError> {
        let location = location.to_string();
        let sku = sku.to_string();
        let decision_type = decision_type.to_string();
        let reasoning = reasoning.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO inventory_decisions (sku, location, decision_type, reasoning, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![sku, location, decision_type, reasoning, Utc::now().to_rfc3339()],
            )
            .map_err(query_err)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Recent decisions at one owner key, newest first.
    pub async fn recent_decisions(
        &self,
        location: &str,
        limit: i64,
    ) -> Result<Vec<InventoryDecision>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, sku, location, decision_type, reasoning, timestamp
                     FROM inventory_decisions WHERE location = ?1
                     ORDER BY timestamp DESC LIMIT ?2",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![location, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(query_err)?;

            let mut out = Vec::new();
            for row in rows {
                let (id, sku, location, decision_type, reasoning, timestamp) =
                    row.map_err(query_err)?;
                out.push(InventoryDecision {
                    id,
                    timestamp: parse_ts(&timestamp, &sku)?,
                    sku,
                    location,
                    decision_type,
                    reasoning,
                });
            }
            Ok(out)
        })
        .await
    }

    /// Record one demand forecast; returns the row id.
    pub async fn insert_forecast(
        &self,
        location: &str,
        sku: &str,
        predicted_demand: i64,
        confidence: f64,
        trend_direction: TrendDirection,
        reasoning: &str,
    ) -> Result<i64, StoreError> {
        let location = location.to_string();
        let sku = sku.to_string();
        let reasoning = reasoning.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO demand_forecasts
                     (sku, location, predicted_demand, confidence, trend_direction, reasoning, forecast_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sku,
                    location,
                    predicted_demand,
                    confidence,
                    trend_direction.as_str(),
                    reasoning,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(query_err)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Recent forecasts at one owner key, newest first.
    pub async fn recent_forecasts(
        &self,
        location: &str,
        limit: i64,
    ) -> Result<Vec<DemandForecast>, StoreError> {
        let location = location.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, sku, location, predicted_demand, confidence, trend_direction,
                            reasoning, forecast_date
                     FROM demand_forecasts WHERE location = ?1
                     ORDER BY forecast_date DESC LIMIT ?2",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![location, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                })
                .map_err(query_err)?;

            let mut out = Vec::new();
            for row in rows {
                let (id, sku, location, predicted_demand, confidence, trend, reasoning, date) =
                    row.map_err(query_err)?;
                out.push(DemandForecast {
                    id,
                    predicted_demand,
                    confidence,
                    trend_direction: trend.parse().map_err(|e: String| {
                        StoreError::DecodeFailed {
                            key: sku.clone(),
                            reason: e,
                        }
                    })?,
                    forecast_date: parse_ts(&date, &sku)?,
                    sku,
                    location,
                    reasoning,
                });
            }
            Ok(out)
        })
        .await
    }

    // ========================================================================
    // CHAT STATISTICS
    // ========================================================================

    /// Load the chat counters for `(location, date)`, if recorded.
    /// `date` is a calendar day in UTC, formatted `YYYY-MM-DD`.
    pub async fn load_chat_stats(
        &self,
        location: &str,
        date: &str,
    ) -> Result<Option<ChatStats>, StoreError> {
        let location = location.to_string();
        let date = date.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT messages_today, actions_executed, successful_actions, success_rate
                 FROM chat_statistics WHERE location = ?1 AND date = ?2",
                params![location, date],
                |row| {
                    Ok(ChatStats {
                        messages_today: row.get(0)?,
                        actions_executed: row.get(1)?,
                        successful_actions: row.get(2)?,
                        success_rate: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(query_err)
        })
        .await
    }

    /// Insert or update the chat counters for `(location, date)`.
    pub async fn save_chat_stats(
        &self,
        location: &str,
        date: &str,
        stats: &ChatStats,
    ) -> Result<(), StoreError> {
        let location = location.to_string();
        let date = date.to_string();
        let stats = stats.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO chat_statistics
                     (location, date, messages_today, actions_executed, successful_actions,
                      success_rate, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (location, date) DO UPDATE SET
                     messages_today = excluded.messages_today,
                     actions_executed = excluded.actions_executed,
                     successful_actions = excluded.successful_actions,
                     success_rate = excluded.success_rate,
                     updated_at = excluded.updated_at",
                params![
                    location,
                    date,
                    stats.messages_today,
                    stats.actions_executed,
                    stats.successful_actions,
                    stats.success_rate,
                    now
                ],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn collect_messages(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Vec<StoredMessage>, StoreError> {
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(query_err)?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, timestamp, from_agent, to_agent, content, message_type) =
            row.map_err(query_err)?;
        messages.push(StoredMessage {
            id: id.parse().map_err(|e: uuid::Error| StoreError::DecodeFailed {
                key: id.clone(),
                reason: e.to_string(),
            })?,
            timestamp: parse_ts(&timestamp, &id)?,
            message_type: message_type
                .parse::<MessageType>()
                .map_err(|e| StoreError::DecodeFailed {
                    key: id.clone(),
                    reason: e,
                })?,
            from_agent,
            to_agent,
            content,
        });
    }
    Ok(messages)
}

fn parse_ts(raw: &str, key: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::DecodeFailed {
            key: key.to_string(),
            reason: format!("timestamp {raw:?}: {e}"),
        })
}

fn query_err(e: rusqlite::Error) -> StoreError {
    StoreError::QueryFailed {
        reason: e.to_string(),
    }
}

fn tx_err(e: rusqlite::Error) -> StoreError {
    StoreError::TransactionFailed {
        reason: e.to_string(),
    }
}
