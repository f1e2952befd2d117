//! Analysis, forecasting, and insight flows.
//!
//! Each flow asks the model binding for a structured payload and falls back
//! to a deterministic estimate derived from recent transactions when the
//! model is absent, slow, or off-schema. The system never hard-fails on
//! model unavailability.

use tokio::time::timeout;
use tracing::warn;

use stockyard_core::{
    FleetError, FleetResult, InventoryItem, InventoryTransaction, ModelMessage, StockOperation,
    TrendAnalysis, TrendDirection,
};

use crate::agent::AgentActor;

/// Model used for structured analysis calls.
const ANALYSIS_MODEL: &str = "claude-3-5-haiku-latest";

/// Transactions considered when analyzing or forecasting one SKU.
const TX_WINDOW: i64 = 20;

/// Inventory breadth cap for one forecast run.
const FORECAST_MAX_SKUS: usize = 10;

/// Rows returned per section by the insights endpoint.
const INSIGHTS_LIMIT: i64 = 10;

impl AgentActor {
    /// Trend analysis for one SKU: model-backed with a deterministic
    /// fallback.
    pub(crate) async fn run_trend_analysis(&self, item: &InventoryItem) -> TrendAnalysis {
        let transactions = self
            .store
            .recent_transactions(&self.location, &item.sku, TX_WINDOW)
            .await
            .unwrap_or_default();

        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "shouldReorder": { "type": "boolean" },
                "urgency": { "type": "string", "enum": ["critical", "high", "normal", "low"] },
                "reorderQuantity": { "type": "integer" },
                "trend": { "type": "string", "enum": ["increasing", "stable", "decreasing"] },
                "reasoning": { "type": "string" },
                "confidence": { "type": "number" }
            },
            "required": ["shouldReorder", "urgency", "reorderQuantity", "trend", "reasoning", "confidence"]
        });

        let tx_lines: Vec<String> = transactions
            .iter()
            .map(|tx| format!("{} {} {}", tx.timestamp.to_rfc3339(), tx.operation, tx.quantity))
            .collect();
        let messages = [
            ModelMessage::system(
                "You are an inventory analyst. Given stock state and recent \
                 transactions, decide whether to reorder.",
            ),
            ModelMessage::user(format!(
                "SKU {} at {}: current stock {}, threshold {}.\nRecent transactions \
                 (newest first):\n{}",
                item.sku,
                self.path_label(),
                item.current_stock,
                item.low_stock_threshold,
                tx_lines.join("\n")
            )),
        ];

        let call = self
            .bindings
            .model
            .run(ANALYSIS_MODEL, &messages, Some(&schema));
        match timeout(self.config.model_timeout, call).await {
            Ok(Ok(output)) => {
                if let Some(parsed) = output.parsed {
                    match serde_json::from_value::<TrendAnalysis>(parsed) {
                        Ok(analysis) => return analysis,
                        Err(e) => {
                            warn!(owner_key = %self.location, error = %e, "analysis payload off-schema");
                        }
                    }
                }
            }
            Ok(Err(e)) => warn!(owner_key = %self.location, error = %e, "analysis model call failed"),
            Err(_) => warn!(owner_key = %self.location, "analysis model call timed out"),
        }

        deterministic_analysis(item, &transactions)
    }

    /// GET `/ai/analyze?sku`: run the analysis flow and persist the result.
    pub(crate) async fn op_analyze(&mut self, sku: &str) -> FleetResult<serde_json::Value> {
        let sku = sku.trim();
        let item = self
            .inventory
            .get(sku)
            .cloned()
            .ok_or_else(|| FleetError::NotFound {
                what: "SKU".to_string(),
                name: sku.to_string(),
            })?;

        let analysis = self.run_trend_analysis(&item).await;
        let analysis_json = serde_json::to_value(&analysis).unwrap_or_default();
        self.store
            .insert_analysis(&self.location, &item.sku, &analysis_json, analysis.confidence)
            .await?;

        Ok(serde_json::json!({
            "sku": item.sku,
            "location": self.path_label(),
            "insights": analysis_json,
        }))
    }

    /// POST `/ai/forecast`: forecast demand per SKU, persist, and return the
    /// recent forecast rows.
    pub(crate) async fn op_forecast(&mut self) -> FleetResult<serde_json::Value> {
        let items: Vec<InventoryItem> = self
            .inventory
            .values()
            .take(FORECAST_MAX_SKUS)
            .cloned()
            .collect();

        for item in &items {
            let transactions = self
                .store
                .recent_transactions(&self.location, &item.sku, TX_WINDOW)
                .await
                .unwrap_or_default();
            let forecast = self.run_demand_forecast(item, &transactions).await;
            self.store
                .insert_forecast(
                    &self.location,
                    &item.sku,
                    forecast.predicted_demand,
                    forecast.confidence,
                    forecast.trend,
                    &forecast.reasoning,
                )
                .await?;
        }

        let forecasts = self
            .store
            .recent_forecasts(&self.location, INSIGHTS_LIMIT.max(items.len() as i64))
            .await?;
        Ok(serde_json::json!({
            "location": self.path_label(),
            "forecasts": forecasts,
        }))
    }

    async fn run_demand_forecast(
        &self,
        item: &InventoryItem,
        transactions: &[InventoryTransaction],
    ) -> ForecastEstimate {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "predictedDemand": { "type": "integer" },
                "confidence": { "type": "number" },
                "trendDirection": { "type": "string", "enum": ["increasing", "stable", "decreasing"] },
                "reasoning": { "type": "string" }
            },
            "required": ["predictedDemand", "confidence", "trendDirection", "reasoning"]
        });

        let messages = [
            ModelMessage::system(
                "You are a demand forecaster. Predict demand for the next period \
                 from the transaction history.",
            ),
            ModelMessage::user(format!(
                "SKU {} at {}: current stock {}. {} recent transactions.",
                item.sku,
                self.path_label(),
                item.current_stock,
                transactions.len()
            )),
        ];

        let call = self
            .bindings
            .model
            .run(ANALYSIS_MODEL, &messages, Some(&schema));
        if let Ok(Ok(output)) = timeout(self.config.model_timeout, call).await {
            if let Some(parsed) = output.parsed {
                let demand = parsed.get("predictedDemand").and_then(|v| v.as_i64());
                let confidence = parsed.get("confidence").and_then(|v| v.as_f64());
                let trend = parsed
                    .get("trendDirection")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<TrendDirection>().ok());
                let reasoning = parsed.get("reasoning").and_then(|v| v.as_str());
                if let (Some(demand), Some(confidence), Some(trend), Some(reasoning)) =
                    (demand, confidence, trend, reasoning)
                {
                    return ForecastEstimate {
                        predicted_demand: demand.max(0),
                        confidence: confidence.clamp(0.0, 1.0),
                        trend,
                        reasoning: reasoning.to_string(),
                    };
                }
            }
        }

        deterministic_forecast(item, transactions)
    }

    /// GET `/ai/insights`: recent analyses, decisions, and forecasts plus a
    /// summary block.
    pub(crate) async fn op_insights(&self) -> FleetResult<serde_json::Value> {
        let analyses = self.store.recent_analyses(&self.location, INSIGHTS_LIMIT).await?;
        let decisions = self.store.recent_decisions(&self.location, INSIGHTS_LIMIT).await?;
        let forecasts = self.store.recent_forecasts(&self.location, INSIGHTS_LIMIT).await?;
        let summary = serde_json::json!({
            "totalAnalyses": analyses.len(),
            "totalDecisions": decisions.len(),
            "totalForecasts": forecasts.len(),
            "openAlerts": self.current_alerts().len(),
        });

        Ok(serde_json::json!({
            "location": self.path_label(),
            "analyses": analyses,
            "decisions": decisions,
            "forecasts": forecasts,
            "summary": summary,
        }))
    }
}

struct ForecastEstimate {
    predicted_demand: i64,
    confidence: f64,
    trend: TrendDirection,
    reasoning: String,
}

/// Offline analysis: reorder when at or below threshold, critical when
/// exhausted, quantity sized to restock to twice the threshold.
fn deterministic_analysis(
    item: &InventoryItem,
    transactions: &[InventoryTransaction],
) -> TrendAnalysis {
    let trend = infer_trend(transactions);
    let should_reorder = item.is_low();
    let urgency = if item.current_stock == 0 {
        "critical"
    } else if should_reorder {
        "high"
    } else {
        "normal"
    };
    let reorder_quantity = ((item.low_stock_threshold * 2) - item.current_stock).max(10);

    TrendAnalysis {
        should_reorder,
        urgency: urgency.to_string(),
        reorder_quantity,
        trend,
        reasoning: format!(
            "offline estimate: stock {} against threshold {}, trend {}",
            item.current_stock,
            item.low_stock_threshold,
            trend.as_str()
        ),
        confidence: 0.4,
    }
}

/// Offline forecast: demand approximated by recent decrement volume.
fn deterministic_forecast(
    item: &InventoryItem,
    transactions: &[InventoryTransaction],
) -> ForecastEstimate {
    let recent_outflow: i64 = transactions
        .iter()
        .filter(|tx| tx.operation == StockOperation::Decrement)
        .map(|tx| tx.quantity)
        .sum();
    let trend = infer_trend(transactions);

    ForecastEstimate {
        predicted_demand: recent_outflow.max(item.low_stock_threshold),
        confidence: 0.3,
        trend,
        reasoning: format!(
            "offline estimate from {} recent transactions ({} units out)",
            transactions.len(),
            recent_outflow
        ),
    }
}

fn infer_trend(transactions: &[InventoryTransaction]) -> TrendDirection {
    let decrements = transactions
        .iter()
        .filter(|tx| tx.operation == StockOperation::Decrement)
        .count();
    let increments = transactions
        .iter()
        .filter(|tx| {
            matches!(tx.operation, StockOperation::Increment | StockOperation::Set)
        })
        .count();

    if decrements > increments {
        TrendDirection::Decreasing
    } else if increments > decrements {
        TrendDirection::Increasing
    } else {
        TrendDirection::Stable
    }
}
