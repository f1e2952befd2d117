//! Inventory operations and the low-stock threshold cascade.

use chrono::Utc;
use tracing::{info, warn};

use stockyard_core::{
    validate_sku, FleetResult, InventoryAlert, InventoryItem, InventoryUpdate, MessageType,
    ServerFrame, TrendAnalysis, ValidationError,
};

use crate::agent::AgentActor;
use crate::request::SyncReport;

/// How many sync failures are echoed back to the caller.
const MAX_REPORTED_ERRORS: usize = 10;

impl AgentActor {
    /// Apply one stock mutation: clamp, persist, publish, and - when the
    /// low-stock threshold is crossed - run the full alert cascade. The
    /// update also propagates to the parent agent, best-effort.
    pub(crate) async fn op_stock_update(
        &mut self,
        mut update: InventoryUpdate,
    ) -> FleetResult<InventoryItem> {
        update.sku = validate_sku(&update.sku)?;
        if update.quantity < 0 {
            return Err(ValidationError::InvalidValue {
                field: "quantity".to_string(),
                reason: "must be non-negative".to_string(),
            }
            .into());
        }
        if update.low_stock_threshold.is_some_and(|t| t < 0) {
            return Err(ValidationError::InvalidValue {
                field: "lowStockThreshold".to_string(),
                reason: "must be non-negative".to_string(),
            }
            .into());
        }
        if update.location.is_empty() {
            update.location = self.path_label();
        }

        let was_low = self
            .inventory
            .get(&update.sku)
            .map(InventoryItem::is_low)
            .unwrap_or(false);

        let item = self
            .inventory
            .entry(update.sku.clone())
            .or_insert_with(|| InventoryItem {
                sku: update.sku.clone(),
                name: update.sku.clone(),
                current_stock: 0,
                low_stock_threshold: 0,
                last_updated: Utc::now(),
            });
        if let Some(name) = &update.name {
            item.name = name.clone();
        }
        if let Some(threshold) = update.low_stock_threshold {
            item.low_stock_threshold = threshold;
        }
        item.current_stock = update.apply_to(item.current_stock);
        item.last_updated = Utc::now();
        let item = item.clone();

        self.store
            .persist_stock_mutation(&self.location, &item, &update)
            .await?;
        self.invalidate_caches();

        self.subscriptions.broadcast(ServerFrame::StockUpdate {
            sku: update.sku.clone(),
            quantity: update.quantity,
            operation: update.operation,
        });

        let now_low = item.is_low();
        if now_low && !was_low {
            self.threshold_cascade(&item).await;
        }

        self.propagate_to_parent(update);
        Ok(item)
    }

    /// Apply a batch of mutations sequentially. Partial failures never
    /// abort the batch; at most the first ten errors are reported.
    pub(crate) async fn op_inventory_sync(
        &mut self,
        updates: Vec<InventoryUpdate>,
    ) -> FleetResult<SyncReport> {
        let mut report = SyncReport {
            successful: 0,
            failed: 0,
            errors: Vec::new(),
        };

        for update in updates {
            let sku = update.sku.clone();
            match self.op_stock_update(update).await {
                Ok(_) => report.successful += 1,
                Err(e) => {
                    report.failed += 1;
                    if report.errors.len() < MAX_REPORTED_ERRORS {
                        report.errors.push(format!("{sku}: {e}"));
                    }
                }
            }
        }
        Ok(report)
    }

    /// Items at or below threshold, critical when stock is exhausted.
    pub(crate) fn current_alerts(&self) -> Vec<InventoryAlert> {
        let location = self.path_label();
        self.inventory
            .values()
            .filter_map(|item| {
                item.severity().map(|severity| InventoryAlert {
                    sku: item.sku.clone(),
                    name: item.name.clone(),
                    current_stock: item.current_stock,
                    low_stock_threshold: item.low_stock_threshold,
                    severity,
                    location: location.clone(),
                })
            })
            .collect()
    }

    // ========================================================================
    // THRESHOLD CASCADE
    // ========================================================================

    /// The chain of effects when stock crosses its threshold: alert frame,
    /// system message, audit publish, trend analysis, approval, reorder
    /// dispatch, decision record, and a notice to the parent agent.
    ///
    /// Collaborator failures never fail the stock operation itself.
    async fn threshold_cascade(&mut self, item: &InventoryItem) {
        info!(
            owner_key = %self.location,
            sku = %item.sku,
            stock = item.current_stock,
            threshold = item.low_stock_threshold,
            "low-stock threshold crossed"
        );

        self.subscriptions.broadcast(ServerFrame::LowStockAlert {
            sku: item.sku.clone(),
            current_stock: item.current_stock,
            threshold: item.low_stock_threshold,
            location: self.path_label(),
        });

        let alert_notice = stockyard_core::StoredMessage::new(
            self.path_label(),
            None,
            format!(
                "Low stock alert: {} down to {} (threshold {})",
                item.sku, item.current_stock, item.low_stock_threshold
            ),
            MessageType::System,
        );
        if let Err(e) = self.store_message(&alert_notice).await {
            warn!(owner_key = %self.location, error = %e, "failed to store alert notice");
        }

        self.bindings
            .bus
            .send(
                "inventory-alerts",
                serde_json::json!({
                    "sku": &item.sku,
                    "location": self.path_label(),
                    "currentStock": item.current_stock,
                    "threshold": item.low_stock_threshold,
                }),
            )
            .await;

        let analysis = self.run_trend_analysis(item).await;
        let analysis_json = serde_json::to_value(&analysis).unwrap_or_default();
        if let Err(e) = self
            .store
            .insert_analysis(&self.location, &item.sku, &analysis_json, analysis.confidence)
            .await
        {
            warn!(owner_key = %self.location, error = %e, "failed to persist analysis");
        }

        if analysis.should_reorder {
            self.dispatch_reorder(item, &analysis).await;
        }

        self.notify_parent_of_alert(item);
    }

    /// Approval gate plus workflow dispatch plus the decision record.
    async fn dispatch_reorder(&mut self, item: &InventoryItem, analysis: &TrendAnalysis) {
        let needs_approval = analysis.urgency == "critical"
            || analysis.reorder_quantity > self.config.approval_amount_threshold;

        let approved = if needs_approval {
            self.bindings
                .approval
                .approve(
                    &item.sku,
                    &self.path_label(),
                    analysis.reorder_quantity,
                    &analysis.urgency,
                )
                .await
        } else {
            true
        };

        if !approved {
            if let Err(e) = self
                .store
                .insert_decision(
                    &self.location,
                    &item.sku,
                    "reorder_rejected",
                    &format!("approval denied: {}", analysis.reasoning),
                )
                .await
            {
                warn!(owner_key = %self.location, error = %e, "failed to persist decision");
            }
            return;
        }

        let workflow_id = self
            .bindings
            .workflow
            .create(
                "reorder-workflow",
                serde_json::json!({
                    "sku": &item.sku,
                    "location": self.path_label(),
                    "quantity": analysis.reorder_quantity,
                    "urgency": &analysis.urgency,
                }),
            )
            .await;

        let reasoning = match &workflow_id {
            Some(id) => format!("{} (workflow {id})", analysis.reasoning),
            None => format!("{} (workflow backend absent)", analysis.reasoning),
        };
        if let Err(e) = self
            .store
            .insert_decision(&self.location, &item.sku, "reorder", &reasoning)
            .await
        {
            warn!(owner_key = %self.location, error = %e, "failed to persist decision");
        }
    }

    /// Fire-and-forget alert notice to the parent agent; the parent stores
    /// and broadcasts it like any inbound message.
    fn notify_parent_of_alert(&self, item: &InventoryItem) {
        let Some(parent_key) = self.key.parent() else {
            return;
        };
        let registry = self.registry.clone();
        let from = self.path_label();
        let content = format!(
            "⚠️ Low stock at {}: {} down to {} (threshold {})",
            from, item.sku, item.current_stock, item.low_stock_threshold
        );
        tokio::spawn(async move {
            if let Err(e) = registry
                .send_message(&parent_key, &from, &content, MessageType::System)
                .await
            {
                warn!(parent = %parent_key, error = %e, "parent alert notice failed");
            }
        });
    }

    /// Fire-and-forget upward propagation: the parent applies the same
    /// update at its level, where its own threshold logic may fire. Cycles
    /// are impossible because the path strictly shortens.
    fn propagate_to_parent(&self, update: InventoryUpdate) {
        let Some(parent_key) = self.key.parent() else {
            return;
        };
        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Err(e) = registry.propagate_stock_update(&parent_key, update).await {
                warn!(parent = %parent_key, error = %e, "parent stock propagation failed");
            }
        });
    }
}
