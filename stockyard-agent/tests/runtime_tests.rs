//! End-to-end tests of the agent runtime against an in-memory store and
//! recording collaborator mocks.

mod test_support;

use chrono::Utc;

use stockyard_agent::SubscriptionId;
use stockyard_core::{
    ClientFrame, FleetError, InventoryUpdate, ServerFrame, StockOperation,
};
use stockyard_test_utils::InstantApprovalHook;
use test_support::{key, next_frame, next_matching, subscription_channel, wait_until, Fixture};

fn update(sku: &str, quantity: i64, operation: StockOperation) -> InventoryUpdate {
    InventoryUpdate {
        sku: sku.to_string(),
        quantity,
        operation,
        timestamp: Utc::now(),
        location: String::new(),
        name: None,
        low_stock_threshold: None,
    }
}

fn update_with_threshold(
    sku: &str,
    quantity: i64,
    operation: StockOperation,
    threshold: i64,
) -> InventoryUpdate {
    InventoryUpdate {
        low_stock_threshold: Some(threshold),
        ..update(sku, quantity, operation)
    }
}

// ============================================================================
// HIERARCHY
// ============================================================================

#[tokio::test]
async fn create_list_delete_child_survives_restart() {
    let fixture = Fixture::new();
    let root = fixture.registry.handle(&key("/")).await;

    let view = root.create_child("warehouse-ny").await.unwrap();
    assert_eq!(view.counter, 0);
    assert_eq!(view.agents, vec!["warehouse-ny".to_string()]);

    // Restart the process: a fresh registry over the same store.
    fixture.registry.shutdown();
    let restarted = fixture.restart();
    let root = restarted.registry.handle(&key("/")).await;

    let view = root.get_state().await.unwrap();
    assert_eq!(view.counter, 0);
    assert_eq!(view.agents, vec!["warehouse-ny".to_string()]);

    let outcome = root.delete_child("warehouse-ny").await.unwrap();
    assert!(outcome.cascade_complete);
    let view = root.get_state().await.unwrap();
    assert!(view.agents.is_empty());

    // Create-delete-create restores the original children set exactly.
    root.create_child("warehouse-ny").await.unwrap();
    root.delete_child("warehouse-ny").await.unwrap();
    let view = root.get_state().await.unwrap();
    assert!(view.agents.is_empty());
}

#[tokio::test]
async fn create_child_collision_and_validation() {
    let fixture = Fixture::new();
    let root = fixture.registry.handle(&key("/")).await;

    root.create_child("store-a").await.unwrap();
    match root.create_child("store-a").await {
        Err(FleetError::AgentExists { name }) => assert_eq!(name, "store-a"),
        other => panic!("expected AgentExists, got {other:?}"),
    }

    // Boundary: 32 accepted, 33 rejected.
    assert!(root.create_child(&"a".repeat(32)).await.is_ok());
    assert!(matches!(
        root.create_child(&"a".repeat(33)).await,
        Err(FleetError::Validation(_))
    ));
    assert!(matches!(
        root.create_child("bad.segment").await,
        Err(FleetError::Validation(_))
    ));
    assert!(matches!(
        root.delete_child("never-created").await,
        Err(FleetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn delete_subtree_cascades_and_is_idempotent() {
    let fixture = Fixture::new();
    let root = fixture.registry.handle(&key("/")).await;
    root.create_child("a").await.unwrap();
    let a = fixture.registry.handle(&key("/a")).await;
    a.create_child("b").await.unwrap();
    let b = fixture.registry.handle(&key("/a/b")).await;
    b.create_child("c").await.unwrap();
    let c = fixture.registry.handle(&key("/a/b/c")).await;
    c.stock_update(update("SKU-1", 5, StockOperation::Set))
        .await
        .unwrap();

    // A live subscription on the deepest node observes the closure.
    let (tx, mut rx) = subscription_channel();
    let sub = SubscriptionId::generate();
    c.subscribe(sub, tx).await.unwrap();
    next_frame(&mut rx).await; // initial state

    root.delete_child("a").await.unwrap();

    wait_until(|| async {
        fixture
            .store
            .load_fleet_state("demo:/a/b/c")
            .await
            .unwrap()
            .is_none()
    })
    .await;
    assert!(fixture.store.load_fleet_state("demo:/a").await.unwrap().is_none());
    assert!(fixture.store.load_fleet_state("demo:/a/b").await.unwrap().is_none());
    assert!(fixture
        .store
        .load_inventory("demo:/a/b/c")
        .await
        .unwrap()
        .is_empty());

    // Subscription channel drains to closure.
    let mut closed = false;
    for _ in 0..100 {
        loop {
            match rx.try_recv() {
                Ok(_) => continue,
                Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => break,
            }
        }
        if closed {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(closed, "condition not reached within deadline");

    // A fresh session at /a finds an empty agent.
    let a = fixture.registry.handle(&key("/a")).await;
    let view = a.get_state().await.unwrap();
    assert_eq!(view.counter, 0);
    assert!(view.agents.is_empty());

    // Idempotent: deleting an already-empty subtree succeeds.
    a.delete_subtree().await.unwrap();
}

// ============================================================================
// MESSAGING
// ============================================================================

#[tokio::test]
async fn broadcast_fans_out_to_children_and_echoes_once() {
    let fixture = Fixture::new();
    let org = fixture.registry.handle(&key("/org")).await;
    org.create_child("a").await.unwrap();
    org.create_child("b").await.unwrap();

    let child_a = fixture.registry.handle(&key("/org/a")).await;
    let child_b = fixture.registry.handle(&key("/org/b")).await;

    let (tx_org, mut rx_org) = subscription_channel();
    let (tx_a, mut rx_a) = subscription_channel();
    let (tx_b, mut rx_b) = subscription_channel();
    org.subscribe(SubscriptionId::generate(), tx_org).await.unwrap();
    child_a.subscribe(SubscriptionId::generate(), tx_a).await.unwrap();
    child_b.subscribe(SubscriptionId::generate(), tx_b).await.unwrap();

    let reached = org.broadcast("hi").await.unwrap();
    assert_eq!(reached, 2);

    for rx in [&mut rx_a, &mut rx_b] {
        let frame = next_matching(rx, |f| matches!(f, ServerFrame::Message { .. })).await;
        match frame {
            ServerFrame::Message { from, content } => {
                assert_eq!(from, "📢 /org");
                assert_eq!(content, "hi");
            }
            _ => unreachable!(),
        }
    }

    // The sender's own session sees the echo exactly once.
    let frame = next_matching(&mut rx_org, |f| matches!(f, ServerFrame::Message { .. })).await;
    match frame {
        ServerFrame::Message { from, content } => {
            assert_eq!(from, "📢 /org");
            assert_eq!(content, "hi");
        }
        _ => unreachable!(),
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    while let Ok(frame) = rx_org.try_recv() {
        assert!(
            !matches!(frame, ServerFrame::Message { .. }),
            "broadcast echoed twice"
        );
    }
}

#[tokio::test]
async fn direct_message_requires_known_child() {
    let fixture = Fixture::new();
    let org = fixture.registry.handle(&key("/org")).await;
    org.create_child("a").await.unwrap();

    let child = fixture.registry.handle(&key("/org/a")).await;
    let (tx, mut rx) = subscription_channel();
    child.subscribe(SubscriptionId::generate(), tx).await.unwrap();

    org.direct_message("a", "restock please").await.unwrap();
    let frame = next_matching(&mut rx, |f| matches!(f, ServerFrame::Message { .. })).await;
    match frame {
        ServerFrame::Message { from, content } => {
            assert_eq!(from, "📨 /org");
            assert_eq!(content, "restock please");
        }
        _ => unreachable!(),
    }

    assert!(matches!(
        org.direct_message("ghost", "hello?").await,
        Err(FleetError::NotFound { .. })
    ));

    // The child's stored history includes the delivery.
    let page = child.messages(50, 0).await.unwrap();
    assert!(page.messages.iter().any(|m| m.content == "restock please"));
}

#[tokio::test]
async fn ping_frame_answers_pong_then_state() {
    let fixture = Fixture::new();
    let root = fixture.registry.handle(&key("/")).await;

    let (tx, mut rx) = subscription_channel();
    let sub = SubscriptionId::generate();
    root.subscribe(sub, tx).await.unwrap();
    assert!(matches!(next_frame(&mut rx).await, ServerFrame::State { .. }));
    // chat stats frame completes the on-open sequence
    next_matching(&mut rx, |f| matches!(f, ServerFrame::ChatStats { .. })).await;

    root.submit_frame(ClientFrame::Ping, sub).await.unwrap();
    assert!(matches!(next_frame(&mut rx).await, ServerFrame::Pong));
    assert!(matches!(next_frame(&mut rx).await, ServerFrame::State { .. }));
}

// ============================================================================
// INVENTORY
// ============================================================================

#[tokio::test]
async fn decrement_clamps_at_zero_with_two_transactions() {
    let fixture = Fixture::new();
    let wh = fixture.registry.handle(&key("/wh")).await;

    wh.stock_update(update("SKU-1", 100, StockOperation::Set))
        .await
        .unwrap();
    let item = wh
        .stock_update(update("SKU-1", 150, StockOperation::Decrement))
        .await
        .unwrap();
    assert_eq!(item.current_stock, 0);

    let fetched = wh.stock_query("SKU-1").await.unwrap().unwrap();
    assert_eq!(fetched.current_stock, 0);

    let txs = fixture
        .store
        .recent_transactions("demo:/wh", "SKU-1", 10)
        .await
        .unwrap();
    assert_eq!(txs.len(), 2);
}

#[tokio::test]
async fn set_is_idempotent_but_both_transactions_persist() {
    let fixture = Fixture::new();
    let wh = fixture.registry.handle(&key("/wh")).await;

    wh.stock_update(update("SKU-2", 50, StockOperation::Set)).await.unwrap();
    let item = wh
        .stock_update(update("SKU-2", 50, StockOperation::Set))
        .await
        .unwrap();
    assert_eq!(item.current_stock, 50);

    let txs = fixture
        .store
        .recent_transactions("demo:/wh", "SKU-2", 10)
        .await
        .unwrap();
    assert_eq!(txs.len(), 2);
}

#[tokio::test]
async fn inventory_sync_reports_partial_failures() {
    let fixture = Fixture::new();
    let wh = fixture.registry.handle(&key("/wh")).await;

    let report = wh
        .inventory_sync(vec![
            update("SKU-1", 10, StockOperation::Set),
            update("bad/sku", 5, StockOperation::Set),
            update("SKU-2", 7, StockOperation::Set),
        ])
        .await
        .unwrap();
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);

    let snapshot = wh.inventory().await.unwrap();
    assert_eq!(snapshot.items.len(), 2);
}

#[tokio::test]
async fn low_stock_cascade_runs_full_chain_and_notifies_parent() {
    let fixture = Fixture::new();
    fixture.model.push_parsed(serde_json::json!({
        "shouldReorder": true,
        "urgency": "high",
        "reorderQuantity": 50,
        "trend": "decreasing",
        "reasoning": "holiday demand drawdown",
        "confidence": 0.8,
    }));

    let org = fixture.registry.handle(&key("/org")).await;
    org.create_child("store").await.unwrap();
    let store_agent = fixture.registry.handle(&key("/org/store")).await;

    store_agent
        .stock_update(update_with_threshold("SKU-1", 12, StockOperation::Set, 10))
        .await
        .unwrap();

    let (tx, mut rx) = subscription_channel();
    store_agent
        .subscribe(SubscriptionId::generate(), tx)
        .await
        .unwrap();

    let item = store_agent
        .stock_update(update("SKU-1", 5, StockOperation::Decrement))
        .await
        .unwrap();
    assert_eq!(item.current_stock, 7);

    // Alert frame reaches subscribers.
    let frame = next_matching(&mut rx, |f| matches!(f, ServerFrame::LowStockAlert { .. })).await;
    match frame {
        ServerFrame::LowStockAlert {
            sku,
            current_stock,
            threshold,
            location,
        } => {
            assert_eq!(sku, "SKU-1");
            assert_eq!(current_stock, 7);
            assert_eq!(threshold, 10);
            assert_eq!(location, "/org/store");
        }
        _ => unreachable!(),
    }

    // One analysis row and one reorder decision at this location.
    let analyses = fixture
        .store
        .recent_analyses("demo:/org/store", 10)
        .await
        .unwrap();
    assert_eq!(analyses.len(), 1);
    assert_eq!(analyses[0].analysis["urgency"], "high");

    let decisions = fixture
        .store
        .recent_decisions("demo:/org/store", 10)
        .await
        .unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type, "reorder");

    // One reorder workflow for this location.
    assert!(fixture
        .workflow
        .dispatches()
        .iter()
        .any(|d| d.name == "reorder-workflow" && d.payload["location"] == "/org/store"));

    // Audit publish on the bus.
    assert!(fixture
        .bus
        .published()
        .iter()
        .any(|(topic, _)| topic == "inventory-alerts"));

    // The parent stores and broadcasts the inbound alert notice.
    let store = fixture.store.clone();
    wait_until(|| {
        let store = store.clone();
        async move {
            store
                .message_page("demo:/org", 50, 0)
                .await
                .unwrap()
                .messages
                .iter()
                .any(|m| m.content.contains("Low stock at /org/store"))
        }
    })
    .await;

    // The stock update itself propagated upward and clamped at zero.
    let org_item_store = fixture.store.clone();
    wait_until(|| {
        let store = org_item_store.clone();
        async move {
            store
                .load_inventory("demo:/org")
                .await
                .unwrap()
                .iter()
                .any(|i| i.sku == "SKU-1")
        }
    })
    .await;
}

#[tokio::test]
async fn critical_reorders_go_through_the_approval_hook() {
    let fixture = Fixture::with_approval(InstantApprovalHook::denying());
    fixture.model.push_parsed(serde_json::json!({
        "shouldReorder": true,
        "urgency": "critical",
        "reorderQuantity": 2000,
        "trend": "decreasing",
        "reasoning": "stockout imminent",
        "confidence": 0.9,
    }));

    let wh = fixture.registry.handle(&key("/wh")).await;
    wh.stock_update(update_with_threshold("SKU-9", 20, StockOperation::Set, 10))
        .await
        .unwrap();
    wh.stock_update(update("SKU-9", 15, StockOperation::Decrement))
        .await
        .unwrap();

    let requests = fixture.approval.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "SKU-9");
    assert_eq!(requests[0].2, "critical");

    // Denied: a rejection decision, no workflow dispatch at this location.
    let decisions = fixture.store.recent_decisions("demo:/wh", 10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type, "reorder_rejected");
    assert!(fixture
        .workflow
        .dispatches()
        .iter()
        .all(|d| d.payload["location"] != "/wh"));
}

#[tokio::test]
async fn alerts_classify_severity() {
    let fixture = Fixture::new();
    let wh = fixture.registry.handle(&key("/wh")).await;

    wh.stock_update(update_with_threshold("SKU-A", 0, StockOperation::Set, 5))
        .await
        .unwrap();
    wh.stock_update(update_with_threshold("SKU-B", 3, StockOperation::Set, 5))
        .await
        .unwrap();
    wh.stock_update(update_with_threshold("SKU-C", 50, StockOperation::Set, 5))
        .await
        .unwrap();

    let alerts = wh.alerts().await.unwrap();
    assert_eq!(alerts.len(), 2);
    let critical: Vec<_> = alerts
        .iter()
        .filter(|a| a.severity == stockyard_core::AlertSeverity::Critical)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].sku, "SKU-A");
}

// ============================================================================
// CHAT
// ============================================================================

#[tokio::test]
async fn chat_stats_count_and_survive_restart() {
    let fixture = Fixture::new();
    let root = fixture.registry.handle(&key("/")).await;
    root.stock_update(update("SKU-1", 42, StockOperation::Set))
        .await
        .unwrap();

    let outcome = root.chat("check stock of SKU-1", None).await.unwrap();
    assert!(outcome.reply.contains("42"));
    assert_eq!(outcome.stats.messages_today, 1);
    assert_eq!(outcome.stats.actions_executed, 1);
    assert_eq!(outcome.stats.success_rate, 100.0);

    // Restart and re-open: the first frames replay history and stats.
    fixture.registry.shutdown();
    let restarted = fixture.restart();
    let root = restarted.registry.handle(&key("/")).await;

    let (tx, mut rx) = subscription_channel();
    root.subscribe(SubscriptionId::generate(), tx).await.unwrap();

    assert!(matches!(next_frame(&mut rx).await, ServerFrame::State { .. }));
    let mut chat_frames = 0;
    let stats_frame = loop {
        match next_frame(&mut rx).await {
            ServerFrame::ChatResponse { .. } => chat_frames += 1,
            ServerFrame::ChatStats {
                messages_today,
                actions_executed,
                success_rate,
            } => break (messages_today, actions_executed, success_rate),
            other => panic!("unexpected on-open frame {other:?}"),
        }
    };
    assert_eq!(chat_frames, 2, "user echo and assistant reply replayed");
    assert_eq!(stats_frame, (1, 1, 100.0));
}

#[tokio::test]
async fn model_failure_produces_fallback_and_failed_action() {
    let fixture = Fixture::new();
    // No scripted output: every model call errors.
    let root = fixture.registry.handle(&key("/")).await;

    let outcome = root
        .chat("what does next week look like?", None)
        .await
        .unwrap();
    assert!(outcome.reply.contains("unavailable"));
    assert_eq!(outcome.stats.actions_executed, 1);
    assert_eq!(outcome.stats.successful_actions, 0);
    assert_eq!(outcome.stats.success_rate, 0.0);
    assert_eq!(fixture.model.call_count(), 1);
}

#[tokio::test]
async fn chat_messages_are_indexed_for_similarity() {
    let fixture = Fixture::new();
    fixture.model.push_text("noted.");
    let root = fixture.registry.handle(&key("/")).await;

    root.chat("remember the dock door is broken", None).await.unwrap();
    // User echo and assistant reply are both indexed.
    assert_eq!(fixture.vector.len(), 2);
}

// ============================================================================
// AI FLOWS
// ============================================================================

#[tokio::test]
async fn analyze_persists_and_returns_insights() {
    let fixture = Fixture::new();
    let wh = fixture.registry.handle(&key("/wh")).await;
    wh.stock_update(update_with_threshold("SKU-1", 4, StockOperation::Set, 10))
        .await
        .unwrap();

    // Model unavailable: the deterministic analysis still answers.
    let insights = wh.analyze("SKU-1").await.unwrap();
    assert_eq!(insights["sku"], "SKU-1");
    assert_eq!(insights["insights"]["shouldReorder"], true);

    assert!(matches!(
        wh.analyze("SKU-404").await,
        Err(FleetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn forecast_writes_rows_and_insights_summarize() {
    let fixture = Fixture::new();
    let wh = fixture.registry.handle(&key("/wh")).await;
    wh.stock_update(update("SKU-1", 30, StockOperation::Set)).await.unwrap();
    wh.stock_update(update("SKU-1", 5, StockOperation::Decrement))
        .await
        .unwrap();

    let forecasts = wh.forecast().await.unwrap();
    assert_eq!(forecasts["forecasts"].as_array().unwrap().len(), 1);

    let insights = wh.insights().await.unwrap();
    assert_eq!(insights["summary"]["totalForecasts"], 1);
}
