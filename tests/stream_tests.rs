//! Feedback stream end-to-end: ordering, drift triggers, cool-down, and
//! restart reconstruction.

mod helpers;

use chrono::{Duration, Utc};
use std::sync::Arc;

use inventory_ops::config::{GovernorConfig, StreamConfig};
use inventory_ops::domain::{FeedbackType, NewFeedback};
use inventory_ops::events::{BroadcastBus, Topic};
use inventory_ops::metrics::NoopMetrics;
use inventory_ops::retrain::RetrainGovernor;
use inventory_ops::storage::{MemoryStore, Store};
use inventory_ops::stream::FeedbackStream;

fn wired_stream(
    store: Arc<MemoryStore>,
    bus: Arc<BroadcastBus>,
) -> (FeedbackStream, Arc<RetrainGovernor>) {
    let metrics = Arc::new(NoopMetrics);
    let governor = Arc::new(RetrainGovernor::new(
        store.clone(),
        metrics.clone(),
        GovernorConfig::default(),
    ));
    let stream = FeedbackStream::new(
        store,
        bus,
        metrics,
        governor.clone(),
        StreamConfig::default(),
    );
    (stream, governor)
}

async fn push_mape(store: &MemoryStore, item: &str, mape_pct: f64) {
    store
        .insert_feedback(NewFeedback {
            forecast_line_id: None,
            item_code: item.to_string(),
            feedback_type: FeedbackType::Adjustment,
            original_prediction: 100.0,
            adjustment: Some(100.0 + mape_pct),
            reason: "reconciliation".to_string(),
            submitted_by: "ops@co".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_drift_trigger_and_hour_cooldown() {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(BroadcastBus::default());
    let (stream, governor) = wired_stream(store.clone(), bus.clone());
    stream.prime().await.unwrap();

    let mut events = bus.subscribe();
    let t0 = Utc::now();

    // Eleven entries at 20% error against a 15% threshold
    for _ in 0..11 {
        push_mape(&store, "X", 20.0).await;
    }
    stream.poll_once_at(t0).await.unwrap();

    let stats = stream.stats().await;
    assert_eq!(stats.drift_triggers, 1);
    assert_eq!(stats.retrain_requests, 1);
    assert_eq!(governor.queued(), 1);

    // Thirty minutes later drift persists but the item is cooling down
    push_mape(&store, "X", 20.0).await;
    stream.poll_once_at(t0 + Duration::minutes(30)).await.unwrap();
    assert_eq!(stream.stats().await.drift_triggers, 1);

    // Past the hour a new trigger is allowed
    push_mape(&store, "X", 20.0).await;
    stream.poll_once_at(t0 + Duration::minutes(61)).await.unwrap();
    assert_eq!(stream.stats().await.drift_triggers, 2);

    // Both the ingestion and drift events went over the bus
    let mut saw_ingested = false;
    let mut saw_drift = false;
    while let Ok(event) = events.try_recv() {
        match event.topic {
            Topic::FeedbackIngested => saw_ingested = true,
            Topic::DriftDetected => saw_drift = true,
            _ => {}
        }
    }
    assert!(saw_ingested && saw_drift);
}

#[tokio::test]
async fn test_last_processed_id_never_decreases() {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(BroadcastBus::default());
    let (stream, _) = wired_stream(store.clone(), bus);
    stream.prime().await.unwrap();

    let mut watermark = 0;
    for round in 0..5 {
        for _ in 0..3 {
            push_mape(&store, "X", 5.0).await;
        }
        stream.poll_once().await.unwrap();
        let stats = stream.stats().await;
        assert!(
            stats.last_processed_id > watermark,
            "watermark regressed in round {}",
            round
        );
        watermark = stats.last_processed_id;
    }
    assert_eq!(watermark, 15);
}

#[tokio::test]
async fn test_restart_rebuilds_windows_without_retriggering() {
    let store = Arc::new(MemoryStore::new());

    // First process life: high-error history accumulates
    for _ in 0..15 {
        push_mape(&store, "X", 25.0).await;
    }

    // Second process life primes from persisted feedback
    let bus = Arc::new(BroadcastBus::default());
    let (stream, _) = wired_stream(store.clone(), bus);
    stream.prime().await.unwrap();

    let stats = stream.stats().await;
    assert_eq!(stats.tracked_items, 1);
    assert_eq!(stats.drift_triggers, 0);
    assert_eq!(stats.last_processed_id, 15);

    // The rebuilt window is hot: a single fresh entry can trigger
    push_mape(&store, "X", 25.0).await;
    stream.poll_once().await.unwrap();
    assert_eq!(stream.stats().await.drift_triggers, 1);
}

#[tokio::test]
async fn test_items_drift_independently() {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(BroadcastBus::default());
    let (stream, _) = wired_stream(store.clone(), bus);
    stream.prime().await.unwrap();

    for _ in 0..11 {
        push_mape(&store, "BAD", 30.0).await;
        push_mape(&store, "GOOD", 2.0).await;
    }
    stream.poll_once().await.unwrap();

    let stats = stream.stats().await;
    assert_eq!(stats.drift_triggers, 1);
    assert_eq!(stats.tracked_items, 2);
}
