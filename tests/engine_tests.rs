//! Forecast engine behavior over a live store: smoothing, fusion,
//! policy, and the run lifecycle.

mod helpers;

use std::sync::Arc;
use uuid::Uuid;

use inventory_ops::config::EngineConfig;
use inventory_ops::domain::{
    ApprovalStatus, OrderReason, RunStatus, WeightVector,
};
use inventory_ops::engine::{ForecastEngine, RunRequest};
use inventory_ops::metrics::NoopMetrics;
use inventory_ops::storage::{MemoryStore, Store};

use helpers::{item, seed_flat_history, usd_price};

fn engine_over(store: Arc<MemoryStore>) -> ForecastEngine {
    ForecastEngine::new(store, Arc::new(NoopMetrics), EngineConfig::default())
}

fn request(actor: &str) -> RunRequest {
    RunRequest {
        run_id: None,
        horizon_days: 7,
        tenant: "org-1".to_string(),
        location: "main".to_string(),
        actor: actor.to_string(),
    }
}

#[tokio::test]
async fn test_flat_history_week_forecast() {
    let store = Arc::new(MemoryStore::new());

    // Seven flat days at 10, stock 5, no par, vendor lead time of a week
    let mut tomatoes = item("TOM-01");
    tomatoes.current_stock = 5.0;
    tomatoes.lead_time_days = Some(7);
    store.seed_item(tomatoes).await;
    seed_flat_history(&store, "TOM-01", 10.0, 7).await;

    let engine = engine_over(store.clone());
    let report = engine.generate(request("alice@co")).await.unwrap();

    assert_eq!(report.items_forecasted, 1);
    assert!(report.shadow_mode);

    let lines = store.list_lines(report.run_id).await.unwrap();
    let line = &lines[0];

    assert!((line.predicted_usage - 10.0).abs() < 1e-9);
    assert_eq!(line.confidence, 1.0);
    assert!((line.safety_stock - 2.0).abs() < 1e-9);
    assert!((line.reorder_point - 12.0).abs() < 1e-9);
    assert_eq!(line.recommended_order_qty, 17);
    assert_eq!(line.order_reason, OrderReason::BelowReorderPoint);
    assert_eq!(line.weights, WeightVector::default());
}

#[tokio::test]
async fn test_empty_history_forecasts_nothing_to_order() {
    let store = Arc::new(MemoryStore::new());
    store.seed_item(item("NEW-01")).await;

    let engine = engine_over(store.clone());
    let report = engine.generate(request("alice@co")).await.unwrap();

    let lines = store.list_lines(report.run_id).await.unwrap();
    let line = &lines[0];

    assert_eq!(line.predicted_usage, 0.0);
    assert_eq!(line.confidence, 0.5);
    assert_eq!(line.recommended_order_qty, 0);
    assert_eq!(line.order_reason, OrderReason::SufficientStock);
}

#[tokio::test]
async fn test_run_completes_with_aggregates() {
    let store = Arc::new(MemoryStore::new());
    for code in ["A-1", "B-2", "C-3"] {
        store.seed_item(item(code)).await;
        seed_flat_history(&store, code, 5.0, 7).await;
    }
    store.seed_price(usd_price("org-1", "A-1", "2.00")).await;

    let engine = engine_over(store.clone());
    let report = engine.generate(request("alice@co")).await.unwrap();

    let run = store.get_run(report.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.approval_status, ApprovalStatus::Pending);
    assert_eq!(run.stats.items_forecasted, 3);
    assert!(run.stats.avg_confidence > 0.9);
    // Only A-1 has a price: value = 5 x 2.00
    assert_eq!(run.stats.total_predicted_value, "10.00".parse().unwrap());
}

#[tokio::test]
async fn test_inactive_items_are_not_forecast() {
    let store = Arc::new(MemoryStore::new());
    store.seed_item(item("LIVE-1")).await;
    let mut dead = item("DEAD-1");
    dead.active = false;
    store.seed_item(dead).await;

    let engine = engine_over(store.clone());
    let report = engine.generate(request("alice@co")).await.unwrap();

    assert_eq!(report.items_forecasted, 1);
    let lines = store.list_lines(report.run_id).await.unwrap();
    assert_eq!(lines[0].item_code, "LIVE-1");
}

#[tokio::test]
async fn test_run_is_idempotent_by_id() {
    let store = Arc::new(MemoryStore::new());
    store.seed_item(item("TOM-01")).await;
    seed_flat_history(&store, "TOM-01", 10.0, 7).await;

    let engine = engine_over(store.clone());
    let run_id = Uuid::new_v4();
    let mut first_request = request("alice@co");
    first_request.run_id = Some(run_id);

    let first = engine.generate(first_request.clone()).await.unwrap();
    let second = engine.generate(first_request).await.unwrap();

    assert_eq!(first.run_id, second.run_id);
    assert_eq!(first.items_forecasted, second.items_forecasted);
    // No duplicate lines were written
    assert_eq!(store.list_lines(run_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_learned_weights_feed_the_forecast() {
    let store = Arc::new(MemoryStore::new());
    store.seed_item(item("TOM-01")).await;
    seed_flat_history(&store, "TOM-01", 10.0, 7).await;

    let learned = WeightVector::default().apply_deltas(&[
        (inventory_ops::SignalKind::MenuRotation, 0.05),
        (inventory_ops::SignalKind::UsageHistory, -0.05),
    ]);
    store.save_weights("TOM-01", &learned).await.unwrap();

    let engine = engine_over(store.clone());
    let report = engine.generate(request("alice@co")).await.unwrap();

    let lines = store.list_lines(report.run_id).await.unwrap();
    assert_eq!(lines[0].weights, learned);
}

#[tokio::test]
async fn test_every_line_respects_bounds() {
    let store = Arc::new(MemoryStore::new());
    // A mix of histories: flat, noisy, trending, missing
    store.seed_item(item("FLAT")).await;
    seed_flat_history(&store, "FLAT", 10.0, 7).await;

    store.seed_item(item("NOISY")).await;
    let today = chrono::Utc::now().date_naive();
    store
        .seed_history(
            "NOISY",
            (0..14)
                .map(|i| {
                    inventory_ops::UsagePoint::new(
                        today - chrono::Duration::days(i),
                        if i % 2 == 0 { 2.0 } else { 30.0 },
                    )
                })
                .collect(),
        )
        .await;

    store.seed_item(item("EMPTY")).await;

    let engine = engine_over(store.clone());
    let report = engine.generate(request("alice@co")).await.unwrap();

    for line in store.list_lines(report.run_id).await.unwrap() {
        assert!(line.predicted_usage >= 0.0);
        assert!((0.1..=1.0).contains(&line.confidence));
        if line.recommended_order_qty > 0 {
            assert!(
                line.current_stock < line.reorder_point
                    || line.current_stock < 0.8 * line.par_level
            );
        }
    }
}
