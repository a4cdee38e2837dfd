//! Feedback & drift stream: a long-lived poller that tails the feedback
//! log in ascending id order, maintains per-item rolling MAPE windows,
//! and asks the governor for incremental retrains when drift persists.

mod drift;

pub use drift::{DriftCache, DriftCacheEntry, DriftDecision};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::domain::{Result, RetrainRequest, RetrainSource};
use crate::events::{SharedBus, Topic};
use crate::metrics::SharedMetrics;
use crate::retrain::RetrainGovernor;
use crate::storage::SharedStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub running: bool,
    pub last_processed_id: i64,
    pub entries_processed: u64,
    pub drift_triggers: u64,
    pub retrain_requests: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub tracked_items: usize,
}

struct StreamState {
    last_processed_id: i64,
    drift: DriftCache,
    entries_processed: u64,
    drift_triggers: u64,
    retrain_requests: u64,
    polls: u64,
    poll_errors: u64,
}

struct StreamInner {
    store: SharedStore,
    bus: SharedBus,
    metrics: SharedMetrics,
    governor: Arc<RetrainGovernor>,
    config: StreamConfig,
    state: Mutex<StreamState>,
    running: AtomicBool,
}

pub struct FeedbackStream {
    inner: Arc<StreamInner>,
    shutdown: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FeedbackStream {
    pub fn new(
        store: SharedStore,
        bus: SharedBus,
        metrics: SharedMetrics,
        governor: Arc<RetrainGovernor>,
        config: StreamConfig,
    ) -> Self {
        let drift = DriftCache::new(
            config.window_size,
            config.min_window_samples,
            config.drift_threshold_pct(),
            config.drift_cooldown_secs,
        );
        let (shutdown, _) = broadcast::channel(1);

        Self {
            inner: Arc::new(StreamInner {
                store,
                bus,
                metrics,
                governor,
                config,
                state: Mutex::new(StreamState {
                    last_processed_id: 0,
                    drift,
                    entries_processed: 0,
                    drift_triggers: 0,
                    retrain_requests: 0,
                    polls: 0,
                    poll_errors: 0,
                }),
                running: AtomicBool::new(false),
            }),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Start the poller. Re-starting a running stream is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("feedback stream already running");
            return Ok(());
        }

        self.inner.initialize().await?;

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.shutdown.subscribe();
        let poll_interval = self.inner.config.poll_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = inner.poll_once(Utc::now()).await {
                            error!(error = %e, "feedback poll failed");
                            inner.state.lock().await.poll_errors += 1;
                            inner.metrics.counter(
                                "inventory_ops_stream_poll_errors_total", &[], 1,
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("feedback stream shutting down");
                        break;
                    }
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        info!(
            interval_ms = self.inner.config.poll_interval_ms,
            batch_size = self.inner.config.batch_size,
            "feedback stream started"
        );
        Ok(())
    }

    /// Stop the poller and wait for the in-flight poll to finish.
    /// Stopping a stopped stream is a no-op.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "feedback stream task ended abnormally");
            }
        }
        info!("feedback stream stopped");
    }

    pub async fn stats(&self) -> StreamStats {
        let state = self.inner.state.lock().await;
        StreamStats {
            running: self.inner.running.load(Ordering::SeqCst),
            last_processed_id: state.last_processed_id,
            entries_processed: state.entries_processed,
            drift_triggers: state.drift_triggers,
            retrain_requests: state.retrain_requests,
            polls: state.polls,
            poll_errors: state.poll_errors,
            tracked_items: state.drift.tracked_items(),
        }
    }

    /// Drop every rolling window and counter.
    pub async fn clear_cache(&self) {
        self.inner.state.lock().await.drift.clear();
        info!("drift cache cleared");
    }

    /// One synchronous poll; the scheduler and tests drive this
    /// directly instead of waiting for the interval.
    pub async fn poll_once(&self) -> Result<u64> {
        self.inner.poll_once(Utc::now()).await
    }

    /// Poll with an explicit clock, for cool-down tests.
    pub async fn poll_once_at(&self, now: DateTime<Utc>) -> Result<u64> {
        self.inner.poll_once(now).await
    }

    /// Initialize watermark and windows without starting the poller.
    pub async fn prime(&self) -> Result<()> {
        self.inner.initialize().await
    }
}

impl StreamInner {
    /// Set the watermark to the current max id (older entries belong to
    /// the previous process life) and rebuild drift windows from the
    /// most recent persisted feedback.
    async fn initialize(&self) -> Result<()> {
        let max_id = self.store.max_feedback_id().await?;
        let recent = self
            .store
            .recent_feedback_by_item(self.config.window_size)
            .await?;

        let mut state = self.state.lock().await;
        state.last_processed_id = state.last_processed_id.max(max_id);

        state.drift.clear();
        for (item_code, entries) in recent {
            let mapes: Vec<f64> = entries.iter().filter_map(|e| e.mape_pct()).collect();
            if !mapes.is_empty() {
                state.drift.preload(&item_code, &mapes);
            }
        }

        info!(
            last_processed_id = state.last_processed_id,
            items = state.drift.tracked_items(),
            "feedback stream primed"
        );
        Ok(())
    }

    async fn poll_once(&self, now: DateTime<Utc>) -> Result<u64> {
        let after_id = self.state.lock().await.last_processed_id;
        let batch = self
            .store
            .list_feedback_after(after_id, self.config.batch_size)
            .await?;

        let mut state = self.state.lock().await;
        state.polls += 1;

        for entry in &batch {
            debug_assert!(entry.id > state.last_processed_id);

            self.bus.emit(
                Topic::FeedbackIngested,
                serde_json::json!({
                    "feedbackId": entry.id,
                    "item": entry.item_code,
                    "type": entry.feedback_type.as_str(),
                    "deltaPct": entry.delta_pct,
                }),
            );
            self.metrics
                .counter("inventory_ops_feedback_ingested_total", &[], 1);

            if let Some(mape_pct) = entry.mape_pct() {
                match state.drift.observe(&entry.item_code, mape_pct, now) {
                    DriftDecision::Triggered { mean_mape_pct } => {
                        state.drift_triggers += 1;
                        self.metrics.counter(
                            "inventory_ops_drift_detected_total",
                            &[("item", entry.item_code.clone())],
                            1,
                        );
                        self.bus.emit(
                            Topic::DriftDetected,
                            serde_json::json!({
                                "item": entry.item_code,
                                "meanMapePct": mean_mape_pct,
                            }),
                        );
                        warn!(
                            item = %entry.item_code,
                            mean_mape_pct,
                            "drift detected"
                        );

                        if self.config.incremental_retrain_enabled {
                            self.governor.enqueue(RetrainRequest {
                                item_code: entry.item_code.clone(),
                                mean_mape_pct,
                                requested_at: now,
                                source: RetrainSource::DriftDetector,
                            });
                            state.retrain_requests += 1;
                        }
                    }
                    DriftDecision::CoolingDown => {
                        debug!(item = %entry.item_code, "drift persists, in cooldown");
                    }
                    DriftDecision::None => {}
                }
            }

            state.last_processed_id = entry.id;
            state.entries_processed += 1;
        }

        self.metrics.gauge(
            "inventory_ops_stream_last_processed_id",
            state.last_processed_id as f64,
        );

        Ok(batch.len() as u64)
    }
}
