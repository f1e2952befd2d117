//! Location assistant: chat handling, local intent shortcuts, stats.
//!
//! Cheap deterministic intents (stock lookups, alert listings, stock sets)
//! are answered locally; everything else goes to the model binding with a
//! deterministic fallback reply on failure. Every exchange updates the
//! per-day chat counters and streams `chatResponse` / `chatStats` frames.

use chrono::Utc;
use tokio::time::timeout;
use tracing::warn;

use stockyard_core::{
    ChatRole, FleetResult, InventoryUpdate, MessageType, ModelMessage, ServerFrame,
    StockOperation, StoredMessage,
};

use crate::agent::AgentActor;
use crate::request::ChatOutcome;

/// Dimensions of the deterministic local embedding.
const EMBED_DIM: usize = 64;

/// How many similar past messages are folded into the model context.
const SIMILAR_CONTEXT: usize = 3;

/// Model used for assistant replies.
const CHAT_MODEL: &str = "claude-3-5-haiku-latest";

/// A locally recognizable user intent.
enum Intent {
    CheckStock(String),
    SetStock(String, i64),
    ListAlerts,
    FreeForm,
}

impl AgentActor {
    /// One chat exchange: echo the user, run the intent or the model,
    /// stream the reply, count stats, persist everything.
    pub(crate) async fn op_chat(
        &mut self,
        content: &str,
        user_id: Option<&str>,
    ) -> FleetResult<ChatOutcome> {
        self.roll_stats_day();
        self.chat_stats.record_message();

        let user_message = StoredMessage::new("user", None, content, MessageType::Direct);
        self.store_message(&user_message).await?;
        self.subscriptions.deliver_message(
            user_message.id,
            ServerFrame::ChatResponse {
                role: ChatRole::User,
                content: content.to_string(),
                timestamp: user_message.timestamp,
                metadata: user_id.map(|id| serde_json::json!({ "userId": id })),
            },
        );
        self.index_for_similarity(&user_message).await;

        let (reply, action_ran, action_ok) = match parse_intent(content) {
            Intent::CheckStock(sku) => {
                let reply = match self.inventory.get(&sku) {
                    Some(item) => format!(
                        "{}: {} units on hand (threshold {}) at {}",
                        item.sku,
                        item.current_stock,
                        item.low_stock_threshold,
                        self.path_label()
                    ),
                    None => format!("I don't see {} at {}.", sku, self.path_label()),
                };
                (reply, true, true)
            }

            Intent::SetStock(sku, quantity) => {
                let update = InventoryUpdate {
                    sku: sku.clone(),
                    quantity,
                    operation: StockOperation::Set,
                    timestamp: Utc::now(),
                    location: self.path_label(),
                    name: None,
                    low_stock_threshold: None,
                };
                match self.op_stock_update(update).await {
                    Ok(item) => (
                        format!("Done - {} is now at {} units.", item.sku, item.current_stock),
                        true,
                        true,
                    ),
                    Err(e) => (format!("I couldn't set {sku}: {e}"), true, false),
                }
            }

            Intent::ListAlerts => {
                let alerts = self.current_alerts();
                let reply = if alerts.is_empty() {
                    format!("No low-stock alerts at {}.", self.path_label())
                } else {
                    let lines: Vec<String> = alerts
                        .iter()
                        .map(|a| {
                            format!(
                                "- {}: {} left (threshold {})",
                                a.sku, a.current_stock, a.low_stock_threshold
                            )
                        })
                        .collect();
                    format!("Current alerts:\n{}", lines.join("\n"))
                };
                (reply, true, true)
            }

            Intent::FreeForm => self.model_reply(content).await,
        };

        if action_ran {
            self.chat_stats.record_action(action_ok);
        }

        let assistant_message = StoredMessage::new("assistant", None, &reply, MessageType::Direct);
        self.store_message(&assistant_message).await?;
        self.subscriptions.deliver_message(
            assistant_message.id,
            ServerFrame::ChatResponse {
                role: ChatRole::Assistant,
                content: reply.clone(),
                timestamp: assistant_message.timestamp,
                metadata: None,
            },
        );
        self.index_for_similarity(&assistant_message).await;

        self.subscriptions.broadcast(ServerFrame::ChatStats {
            messages_today: self.chat_stats.messages_today,
            actions_executed: self.chat_stats.actions_executed,
            success_rate: self.chat_stats.success_rate,
        });

        let stats = self.chat_stats.clone();
        if let Err(e) = self
            .store
            .save_chat_stats(&self.location, &self.stats_date, &stats)
            .await
        {
            warn!(owner_key = %self.location, error = %e, "failed to persist chat stats");
        }

        Ok(ChatOutcome { reply, stats })
    }

    /// Model-backed reply with similarity context. Returns the reply text,
    /// whether an action ran, and whether it succeeded (model failures
    /// produce a fallback reply and a failed-action tally).
    async fn model_reply(&mut self, content: &str) -> (String, bool, bool) {
        let mut messages = vec![ModelMessage::system(format!(
            "You are the inventory assistant for {}. Current inventory: {}. \
             Answer briefly and concretely.",
            self.path_label(),
            self.inventory_summary()
        ))];

        let similar = self
            .bindings
            .vector
            .query(&embed(content), SIMILAR_CONTEXT, true)
            .await;
        if !similar.is_empty() {
            let snippets: Vec<String> = similar
                .iter()
                .filter_map(|m| m.metadata.as_ref())
                .filter_map(|meta| meta.get("content").and_then(|c| c.as_str()))
                .map(String::from)
                .collect();
            if !snippets.is_empty() {
                messages.push(ModelMessage::system(format!(
                    "Related earlier messages:\n{}",
                    snippets.join("\n")
                )));
            }
        }
        messages.push(ModelMessage::user(content));

        let call = self.bindings.model.run(CHAT_MODEL, &messages, None);
        match timeout(self.config.model_timeout, call).await {
            Ok(Ok(output)) if !output.text.trim().is_empty() => (output.text, true, true),
            Ok(Ok(_)) => (
                format!(
                    "I couldn't produce an answer for that. Try \"check stock of <sku>\" \
                     or \"show alerts\" at {}.",
                    self.path_label()
                ),
                true,
                true,
            ),
            Ok(Err(e)) => {
                warn!(owner_key = %self.location, error = %e, "model call failed");
                (fallback_reply(&self.path_label()), true, false)
            }
            Err(_) => {
                warn!(owner_key = %self.location, "model call timed out");
                (fallback_reply(&self.path_label()), true, false)
            }
        }
    }

    /// Best-effort similarity indexing of a chat message.
    async fn index_for_similarity(&self, message: &StoredMessage) {
        self.bindings
            .vector
            .insert(
                &message.id.to_string(),
                &embed(&message.content),
                Some(serde_json::json!({
                    "content": &message.content,
                    "role": &message.from_agent,
                    "location": &self.location,
                })),
            )
            .await;
    }

    fn inventory_summary(&self) -> String {
        if self.inventory.is_empty() {
            return "empty".to_string();
        }
        self.inventory
            .values()
            .map(|item| format!("{}={}", item.sku, item.current_stock))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Deterministic bag-of-bytes embedding: a normalized byte histogram folded
/// into a fixed dimension. Good enough to make similarity lookups stable
/// and testable without a real embedder.
fn embed(text: &str) -> Vec<f32> {
    let mut data = vec![0.0f32; EMBED_DIM];
    for (i, byte) in text.bytes().enumerate() {
        data[i % EMBED_DIM] += (byte as f32) / 255.0;
    }
    let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut data {
            *x /= norm;
        }
    }
    data
}

fn fallback_reply(location: &str) -> String {
    format!(
        "The assistant is temporarily unavailable. I can still run local \
         lookups at {location}: try \"check stock of <sku>\" or \"show alerts\"."
    )
}

/// Recognize cheap local intents before involving the model.
fn parse_intent(content: &str) -> Intent {
    let lower = content.to_lowercase();

    if lower.contains("alert") || lower.contains("low stock") {
        return Intent::ListAlerts;
    }

    if let Some(rest) = lower
        .find("set stock of ")
        .map(|idx| &lower[idx + "set stock of ".len()..])
    {
        // "set stock of <sku> to <n>"
        if let Some((sku_part, qty_part)) = rest.split_once(" to ") {
            let sku = sku_part.trim().to_uppercase();
            if let Ok(quantity) = qty_part.trim().parse::<i64>() {
                if !sku.is_empty() && quantity >= 0 {
                    return Intent::SetStock(sku, quantity);
                }
            }
        }
    }

    if let Some(rest) = lower.find("stock of ").map(|idx| &lower[idx + "stock of ".len()..]) {
        let sku = rest
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches(['?', '.', '!'])
            .to_uppercase();
        if !sku.is_empty() {
            return Intent::CheckStock(sku);
        }
    }

    Intent::FreeForm
}
