//! In-memory store used by tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    ApprovalEvent, ApprovalStatus, FeedbackEntry, ForecastLine, ForecastRun,
    InventoryOpsError, Item, NewFeedback, PriceRecord, Recommendation, Result,
    RunStats, RunStatus, UsagePoint, WeightVector,
};

use super::Store;

#[derive(Default)]
struct Inner {
    items: Vec<Item>,
    history: HashMap<String, Vec<UsagePoint>>,
    population: HashMap<NaiveDate, f64>,
    menu_dates: HashMap<String, Vec<NaiveDate>>,

    runs: HashMap<Uuid, ForecastRun>,
    /// Line ids per run, in insertion order
    run_lines: HashMap<Uuid, Vec<Uuid>>,
    lines: HashMap<Uuid, ForecastLine>,

    approvals: Vec<ApprovalEvent>,

    feedback: Vec<FeedbackEntry>,
    next_feedback_id: i64,

    weights: HashMap<String, WeightVector>,

    prices: Vec<PriceRecord>,
    preferred_vendors: HashMap<String, String>,

    recommendations: Vec<Recommendation>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests and bootstrap.

    pub async fn seed_item(&self, item: Item) {
        self.inner.write().await.items.push(item);
    }

    pub async fn seed_history(&self, item_code: &str, points: Vec<UsagePoint>) {
        let mut inner = self.inner.write().await;
        let series = inner.history.entry(item_code.to_string()).or_default();
        series.extend(points);
        series.sort_by_key(|p| p.date);
    }

    pub async fn seed_population(&self, date: NaiveDate, total: f64) {
        self.inner.write().await.population.insert(date, total);
    }

    pub async fn seed_menu_date(&self, item_code: &str, date: NaiveDate) {
        self.inner
            .write()
            .await
            .menu_dates
            .entry(item_code.to_string())
            .or_default()
            .push(date);
    }

    pub async fn seed_price(&self, record: PriceRecord) {
        self.inner.write().await.prices.push(record);
    }

    pub async fn set_preferred_vendor(&self, org: &str, vendor: &str) {
        self.inner
            .write()
            .await
            .preferred_vendors
            .insert(org.to_string(), vendor.to_string());
    }

    pub async fn recommendations(&self) -> Vec<Recommendation> {
        self.inner.read().await.recommendations.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn query_items(&self) -> Result<Vec<Item>> {
        Ok(self.inner.read().await.items.clone())
    }

    async fn get_item(&self, code: &str) -> Result<Option<Item>> {
        Ok(self
            .inner
            .read()
            .await
            .items
            .iter()
            .find(|i| i.code == code)
            .cloned())
    }

    async fn query_history(
        &self,
        item_code: &str,
        as_of: NaiveDate,
        days: u32,
    ) -> Result<Vec<UsagePoint>> {
        let from = as_of - Duration::days(days as i64);
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .get(item_code)
            .map(|series| {
                series
                    .iter()
                    .filter(|p| p.date > from && p.date <= as_of)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_population(&self, date: NaiveDate) -> Result<Option<f64>> {
        Ok(self.inner.read().await.population.get(&date).copied())
    }

    async fn query_menu_occurrences(
        &self,
        item_code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .menu_dates
            .get(item_code)
            .map(|dates| dates.iter().filter(|d| **d >= from && **d <= to).count() as u64)
            .unwrap_or(0))
    }

    async fn insert_forecast_run(&self, run: &ForecastRun) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.runs.contains_key(&run.run_id) {
            return Err(InventoryOpsError::InvalidArgument(format!(
                "run {} already exists",
                run.run_id
            )));
        }
        inner.runs.insert(run.run_id, run.clone());
        inner.run_lines.insert(run.run_id, Vec::new());
        Ok(())
    }

    async fn insert_forecast_line(&self, line: &ForecastLine) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.runs.contains_key(&line.run_id) {
            return Err(InventoryOpsError::NotFound(format!(
                "run {}",
                line.run_id
            )));
        }
        inner
            .run_lines
            .get_mut(&line.run_id)
            .ok_or_else(|| {
                InventoryOpsError::Internal(format!(
                    "run {} has no line index",
                    line.run_id
                ))
            })?
            .push(line.line_id);
        inner.lines.insert(line.line_id, line.clone());
        Ok(())
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        stats: Option<RunStats>,
        error: Option<String>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| InventoryOpsError::NotFound(format!("run {}", run_id)))?;

        if run.status != RunStatus::Running {
            return Err(InventoryOpsError::InvalidRunState(format!(
                "run {} is not running",
                run_id
            )));
        }

        run.status = status;
        if let Some(stats) = stats {
            run.stats = stats;
        }
        run.error = error;
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ForecastRun>> {
        Ok(self.inner.read().await.runs.get(&run_id).cloned())
    }

    async fn list_lines(&self, run_id: Uuid) -> Result<Vec<ForecastLine>> {
        let inner = self.inner.read().await;
        let ids = inner
            .run_lines
            .get(&run_id)
            .ok_or_else(|| InventoryOpsError::NotFound(format!("run {}", run_id)))?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.lines.get(id))
            .cloned()
            .collect())
    }

    async fn get_line(&self, line_id: Uuid) -> Result<Option<ForecastLine>> {
        Ok(self.inner.read().await.lines.get(&line_id).cloned())
    }

    async fn latest_completed_lines(&self) -> Result<Vec<ForecastLine>> {
        let inner = self.inner.read().await;
        let latest = inner
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Completed)
            .max_by_key(|r| r.created_at);

        let Some(run) = latest else {
            return Ok(Vec::new());
        };

        let ids = inner.run_lines.get(&run.run_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| inner.lines.get(id))
            .cloned()
            .collect())
    }

    async fn record_actual_usage(&self, line_id: Uuid, actual: f64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let line = inner
            .lines
            .get_mut(&line_id)
            .ok_or_else(|| InventoryOpsError::NotFound(format!("line {}", line_id)))?;
        line.record_actual(actual);
        Ok(())
    }

    async fn update_line_adjustment(
        &self,
        line_id: Uuid,
        adjusted_qty: f64,
        reason: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let line = inner
            .lines
            .get_mut(&line_id)
            .ok_or_else(|| InventoryOpsError::NotFound(format!("line {}", line_id)))?;
        line.adjusted_qty = Some(adjusted_qty);
        line.adjustment_reason = Some(reason.to_string());
        line.order_status = crate::domain::OrderStatus::Adjusted;
        Ok(())
    }

    async fn lines_forecast_for(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ForecastLine>> {
        let inner = self.inner.read().await;
        Ok(inner
            .lines
            .values()
            .filter(|l| l.forecast_for_date >= from && l.forecast_for_date <= to)
            .cloned()
            .collect())
    }

    async fn record_decision(&self, event: &ApprovalEvent) -> Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .get_mut(&event.run_id)
            .ok_or_else(|| InventoryOpsError::NotFound(format!("run {}", event.run_id)))?;

        if run.approval_status.is_terminal() {
            return Err(InventoryOpsError::AlreadyDecided(event.run_id.to_string()));
        }

        run.approval_status = match event.action {
            crate::domain::ApprovalAction::Approve => ApprovalStatus::Approved,
            crate::domain::ApprovalAction::Reject => ApprovalStatus::Rejected,
        };
        run.approved_by = Some(event.approver.clone());
        run.approved_at = Some(event.decided_at);

        inner.approvals.push(event.clone());
        Ok(())
    }

    async fn list_approvals(&self, run_id: Uuid) -> Result<Vec<ApprovalEvent>> {
        Ok(self
            .inner
            .read()
            .await
            .approvals
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackEntry> {
        let mut inner = self.inner.write().await;

        if let Some(line_id) = feedback.forecast_line_id {
            let duplicate = inner.feedback.iter().any(|e| {
                e.forecast_line_id == Some(line_id)
                    && e.feedback_type == feedback.feedback_type
            });
            if duplicate {
                return Err(InventoryOpsError::InvalidArgument(format!(
                    "feedback of type {} already exists for line {}",
                    feedback.feedback_type.as_str(),
                    line_id
                )));
            }
        }

        inner.next_feedback_id += 1;
        let entry = FeedbackEntry {
            id: inner.next_feedback_id,
            forecast_line_id: feedback.forecast_line_id,
            item_code: feedback.item_code.clone(),
            feedback_type: feedback.feedback_type,
            original_prediction: feedback.original_prediction,
            adjustment: feedback.adjustment,
            reason: feedback.reason.clone(),
            delta: feedback.delta(),
            delta_pct: feedback.delta_pct(),
            submitted_by: feedback.submitted_by.clone(),
            submitted_at: Utc::now(),
            applied: false,
            applied_at: None,
        };
        inner.feedback.push(entry.clone());
        Ok(entry)
    }

    async fn list_feedback_after(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>> {
        let inner = self.inner.read().await;
        let mut out: Vec<FeedbackEntry> = inner
            .feedback
            .iter()
            .filter(|e| e.id > after_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.id);
        out.truncate(limit);
        Ok(out)
    }

    async fn max_feedback_id(&self) -> Result<i64> {
        Ok(self.inner.read().await.next_feedback_id)
    }

    async fn list_unapplied_feedback(
        &self,
        item_code: Option<&str>,
    ) -> Result<Vec<FeedbackEntry>> {
        let inner = self.inner.read().await;
        let mut out: Vec<FeedbackEntry> = inner
            .feedback
            .iter()
            .filter(|e| !e.applied)
            .filter(|e| item_code.map_or(true, |code| e.item_code == code))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.id);
        Ok(out)
    }

    async fn recent_feedback_by_item(
        &self,
        per_item: usize,
    ) -> Result<HashMap<String, Vec<FeedbackEntry>>> {
        let inner = self.inner.read().await;
        let mut grouped: HashMap<String, Vec<FeedbackEntry>> = HashMap::new();
        for entry in &inner.feedback {
            grouped
                .entry(entry.item_code.clone())
                .or_default()
                .push(entry.clone());
        }
        for series in grouped.values_mut() {
            series.sort_by_key(|e| e.id);
            if series.len() > per_item {
                let excess = series.len() - per_item;
                series.drain(..excess);
            }
        }
        Ok(grouped)
    }

    async fn mark_feedback_applied(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .feedback
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| InventoryOpsError::NotFound(format!("feedback {}", id)))?;
        if !entry.applied {
            entry.applied = true;
            entry.applied_at = Some(at);
        }
        Ok(())
    }

    async fn load_weights(&self, item_code: &str) -> Result<Option<WeightVector>> {
        Ok(self.inner.read().await.weights.get(item_code).copied())
    }

    async fn save_weights(&self, item_code: &str, weights: &WeightVector) -> Result<()> {
        self.inner
            .write()
            .await
            .weights
            .insert(item_code.to_string(), *weights);
        Ok(())
    }

    async fn query_prices(&self, org: &str, sku: &str) -> Result<Vec<PriceRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .prices
            .iter()
            .filter(|p| p.org == org && p.sku == sku)
            .cloned()
            .collect())
    }

    async fn preferred_vendor(&self, org: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.preferred_vendors.get(org).cloned())
    }

    async fn insert_recommendation(&self, rec: &Recommendation) -> Result<()> {
        self.inner.write().await.recommendations.push(rec.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedbackType;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_history_window_excludes_old_days() {
        let store = MemoryStore::new();
        store
            .seed_history(
                "TOM-01",
                vec![
                    UsagePoint::new(date(1), 4.0),
                    UsagePoint::new(date(10), 6.0),
                    UsagePoint::new(date(20), 8.0),
                ],
            )
            .await;

        let history = store.query_history("TOM-01", date(20), 15).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].qty, 6.0);
    }

    #[tokio::test]
    async fn test_feedback_ids_monotonic_and_unique_per_line_type() {
        let store = MemoryStore::new();
        let line_id = Uuid::new_v4();

        let make = |line: Option<Uuid>| NewFeedback {
            forecast_line_id: line,
            item_code: "TOM-01".into(),
            feedback_type: FeedbackType::Adjustment,
            original_prediction: 10.0,
            adjustment: Some(12.0),
            reason: "menu".into(),
            submitted_by: "ops@co".into(),
        };

        let first = store.insert_feedback(make(Some(line_id))).await.unwrap();
        let second = store.insert_feedback(make(None)).await.unwrap();
        assert!(second.id > first.id);

        let duplicate = store.insert_feedback(make(Some(line_id))).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_mark_applied_is_idempotent() {
        let store = MemoryStore::new();
        let entry = store
            .insert_feedback(NewFeedback {
                forecast_line_id: None,
                item_code: "X".into(),
                feedback_type: FeedbackType::Adjustment,
                original_prediction: 10.0,
                adjustment: Some(20.0),
                reason: String::new(),
                submitted_by: "a".into(),
            })
            .await
            .unwrap();

        let first_at = Utc::now();
        store.mark_feedback_applied(entry.id, first_at).await.unwrap();
        store
            .mark_feedback_applied(entry.id, Utc::now())
            .await
            .unwrap();

        let stored = store
            .list_feedback_after(0, 10)
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert!(stored.applied);
        assert_eq!(stored.applied_at, Some(first_at));
    }
}
