//! Auto-retrain governor: turns human feedback into bounded weight
//! adjustments, under per-item and auto-remediation cool-downs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::config::GovernorConfig;
use crate::domain::{
    FeedbackEntry, FeedbackType, Result, RetrainRequest, SignalKind, WeightVector,
};
use crate::metrics::SharedMetrics;
use crate::storage::SharedStore;

/// Outcome of an apply-pending-feedback pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub applied_count: u64,
    pub updated_items: Vec<String>,
}

pub struct RetrainGovernor {
    store: SharedStore,
    metrics: SharedMetrics,
    config: GovernorConfig,
    queue: Mutex<VecDeque<RetrainRequest>>,
    last_item_retrain: Mutex<HashMap<String, DateTime<Utc>>>,
    last_auto_remediation: Mutex<Option<DateTime<Utc>>>,
}

impl RetrainGovernor {
    pub fn new(store: SharedStore, metrics: SharedMetrics, config: GovernorConfig) -> Self {
        Self {
            store,
            metrics,
            config,
            queue: Mutex::new(VecDeque::new()),
            last_item_retrain: Mutex::new(HashMap::new()),
            last_auto_remediation: Mutex::new(None),
        }
    }

    /// Queue an incremental retrain request (from the drift detector or
    /// a run rejection). Drained by [`process_queue`].
    ///
    /// [`process_queue`]: Self::process_queue
    pub fn enqueue(&self, request: RetrainRequest) {
        self.metrics
            .counter("inventory_ops_retrain_requests_total", &[], 1);
        self.queue
            .lock()
            .expect("retrain queue lock poisoned")
            .push_back(request);
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().expect("retrain queue lock poisoned").len()
    }

    /// Propose weight deltas for a feedback entry without applying them.
    ///
    /// Only sizeable adjustments with a parseable reason move weights:
    /// "menu" shifts weight toward menu rotation, "population" toward
    /// population, both at the expense of usage history.
    pub fn propose(&self, entry: &FeedbackEntry) -> Vec<(SignalKind, f64)> {
        if entry.feedback_type != FeedbackType::Adjustment {
            return Vec::new();
        }
        if entry.delta_pct.abs() <= self.config.min_delta_pct {
            return Vec::new();
        }

        let reason = entry.reason.to_lowercase();
        if reason.contains("menu") {
            vec![
                (SignalKind::MenuRotation, 0.05),
                (SignalKind::UsageHistory, -0.05),
            ]
        } else if reason.contains("population") {
            vec![
                (SignalKind::Population, 0.05),
                (SignalKind::UsageHistory, -0.05),
            ]
        } else {
            Vec::new()
        }
    }

    /// Apply one feedback entry. Idempotent: an already-applied entry is
    /// a no-op. Returns the updated weight vector when weights moved.
    pub async fn apply_entry(
        &self,
        entry: &FeedbackEntry,
        now: DateTime<Utc>,
    ) -> Result<Option<WeightVector>> {
        if entry.applied {
            return Ok(None);
        }

        let deltas = self.propose(entry);
        let updated = if deltas.is_empty() {
            None
        } else {
            let current = self
                .store
                .load_weights(&entry.item_code)
                .await?
                .unwrap_or_default();
            let updated = current.apply_deltas(&deltas);
            self.store.save_weights(&entry.item_code, &updated).await?;

            debug!(
                item = %entry.item_code,
                feedback_id = entry.id,
                "weights adjusted from feedback"
            );
            self.metrics
                .counter("inventory_ops_weight_adjustments_total", &[], 1);
            Some(updated)
        };

        self.store.mark_feedback_applied(entry.id, now).await?;
        Ok(updated)
    }

    /// Backfill pass over every unapplied feedback entry.
    pub async fn apply_pending(&self, now: DateTime<Utc>) -> Result<ApplyOutcome> {
        let pending = self.store.list_unapplied_feedback(None).await?;
        let mut outcome = ApplyOutcome::default();

        for entry in &pending {
            let updated = self.apply_entry(entry, now).await?;
            outcome.applied_count += 1;
            if updated.is_some() && !outcome.updated_items.contains(&entry.item_code) {
                outcome.updated_items.push(entry.item_code.clone());
            }
        }

        if outcome.applied_count > 0 {
            info!(
                applied = outcome.applied_count,
                items = outcome.updated_items.len(),
                "applied pending feedback"
            );
        }
        Ok(outcome)
    }

    /// Drain queued retrain requests, honoring the per-item cool-down.
    /// Returns how many items actually retrained.
    pub async fn process_queue(&self, now: DateTime<Utc>) -> Result<u64> {
        let drained: Vec<RetrainRequest> = {
            let mut queue = self.queue.lock().expect("retrain queue lock poisoned");
            queue.drain(..).collect()
        };

        let mut retrained = 0u64;
        for request in drained {
            if !self.item_cooldown_elapsed(&request.item_code, now) {
                debug!(item = %request.item_code, "retrain skipped, item in cooldown");
                continue;
            }

            let pending = self
                .store
                .list_unapplied_feedback(Some(&request.item_code))
                .await?;
            for entry in &pending {
                self.apply_entry(entry, now).await?;
            }

            self.last_item_retrain
                .lock()
                .expect("retrain cooldown lock poisoned")
                .insert(request.item_code.clone(), now);
            retrained += 1;

            info!(
                item = %request.item_code,
                source = ?request.source,
                entries = pending.len(),
                "incremental retrain applied"
            );
        }

        Ok(retrained)
    }

    /// Auditor-triggered remediation path: one weight-application batch,
    /// at most once per `cooldown_hours`.
    pub async fn auto_remediate(
        &self,
        cooldown_hours: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<ApplyOutcome>> {
        {
            let last = self
                .last_auto_remediation
                .lock()
                .expect("auto remediation lock poisoned");
            if let Some(last) = *last {
                if now - last < Duration::hours(cooldown_hours as i64) {
                    info!("auto retrain in cooldown");
                    return Ok(None);
                }
            }
        }

        let outcome = self.apply_pending(now).await?;
        *self
            .last_auto_remediation
            .lock()
            .expect("auto remediation lock poisoned") = Some(now);
        Ok(Some(outcome))
    }

    fn item_cooldown_elapsed(&self, item_code: &str, now: DateTime<Utc>) -> bool {
        let map = self
            .last_item_retrain
            .lock()
            .expect("retrain cooldown lock poisoned");
        map.get(item_code).map_or(true, |last| {
            now - *last >= Duration::seconds(self.config.item_cooldown_secs as i64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewFeedback;
    use crate::metrics::NoopMetrics;
    use crate::storage::{MemoryStore, Store};
    use std::sync::Arc;

    async fn governor_with_store() -> (RetrainGovernor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let governor = RetrainGovernor::new(
            store.clone(),
            Arc::new(NoopMetrics),
            GovernorConfig::default(),
        );
        (governor, store)
    }

    async fn adjustment(
        store: &MemoryStore,
        item: &str,
        original: f64,
        adjusted: f64,
        reason: &str,
    ) -> FeedbackEntry {
        store
            .insert_feedback(NewFeedback {
                forecast_line_id: None,
                item_code: item.into(),
                feedback_type: FeedbackType::Adjustment,
                original_prediction: original,
                adjustment: Some(adjusted),
                reason: reason.into(),
                submitted_by: "ops@co".into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_menu_reason_shifts_weights() {
        let (governor, store) = governor_with_store().await;
        let entry = adjustment(&store, "TOM-01", 100.0, 130.0, "menu change").await;

        let updated = governor
            .apply_entry(&entry, Utc::now())
            .await
            .unwrap()
            .expect("weights should move");

        assert!((updated.usage_history - 0.35).abs() < 1e-9);
        assert!((updated.menu_rotation - 0.20).abs() < 1e-9);
        assert!((updated.population - 0.25).abs() < 1e-9);
        assert!((updated.par_level - 0.10).abs() < 1e-9);
        assert!((updated.seasonality - 0.10).abs() < 1e-9);
        assert!(updated.is_normalized());
    }

    #[tokio::test]
    async fn test_small_delta_leaves_weights_alone() {
        let (governor, store) = governor_with_store().await;
        let entry = adjustment(&store, "TOM-01", 100.0, 105.0, "menu change").await;

        let updated = governor.apply_entry(&entry, Utc::now()).await.unwrap();
        assert!(updated.is_none());

        // Entry is still consumed
        let pending = store.list_unapplied_feedback(None).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_reason_no_change() {
        let (governor, store) = governor_with_store().await;
        let entry = adjustment(&store, "TOM-01", 100.0, 150.0, "gut feeling").await;
        assert!(governor.propose(&entry).is_empty());
    }

    #[tokio::test]
    async fn test_reapplying_entry_is_idempotent() {
        let (governor, store) = governor_with_store().await;
        let entry = adjustment(&store, "TOM-01", 100.0, 130.0, "menu change").await;

        let now = Utc::now();
        governor.apply_entry(&entry, now).await.unwrap();
        let after_first = store.load_weights("TOM-01").await.unwrap().unwrap();

        // Re-read the persisted (now applied) entry and apply again
        let stored = store
            .list_feedback_after(0, 10)
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert!(stored.applied);
        let second = governor.apply_entry(&stored, now).await.unwrap();
        assert!(second.is_none());

        let after_second = store.load_weights("TOM-01").await.unwrap().unwrap();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_queue_respects_item_cooldown() {
        let (governor, store) = governor_with_store().await;
        adjustment(&store, "TOM-01", 100.0, 130.0, "menu change").await;

        let now = Utc::now();
        governor.enqueue(RetrainRequest {
            item_code: "TOM-01".into(),
            mean_mape_pct: 20.0,
            requested_at: now,
            source: crate::domain::RetrainSource::DriftDetector,
        });
        assert_eq!(governor.process_queue(now).await.unwrap(), 1);

        // Thirty minutes later the item is still cooling down
        adjustment(&store, "TOM-01", 100.0, 140.0, "menu again").await;
        governor.enqueue(RetrainRequest {
            item_code: "TOM-01".into(),
            mean_mape_pct: 25.0,
            requested_at: now,
            source: crate::domain::RetrainSource::DriftDetector,
        });
        let later = now + Duration::minutes(30);
        assert_eq!(governor.process_queue(later).await.unwrap(), 0);

        // After the hour it retrains again
        governor.enqueue(RetrainRequest {
            item_code: "TOM-01".into(),
            mean_mape_pct: 25.0,
            requested_at: later,
            source: crate::domain::RetrainSource::DriftDetector,
        });
        let much_later = now + Duration::minutes(61);
        assert_eq!(governor.process_queue(much_later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_auto_remediation_cooldown() {
        let (governor, store) = governor_with_store().await;
        adjustment(&store, "TOM-01", 100.0, 130.0, "menu change").await;

        let now = Utc::now();
        let first = governor.auto_remediate(24, now).await.unwrap();
        assert!(first.is_some());

        let soon = now + Duration::hours(12);
        assert!(governor.auto_remediate(24, soon).await.unwrap().is_none());

        let next_day = now + Duration::hours(25);
        assert!(governor.auto_remediate(24, next_day).await.unwrap().is_some());
    }
}
