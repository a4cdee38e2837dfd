//! Persistence boundary. The core talks to a [`Store`] trait; the
//! transactional relational implementation lives outside this crate.
//! [`MemoryStore`] backs tests and single-process deployments.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    ApprovalEvent, FeedbackEntry, ForecastLine, ForecastRun, Item, NewFeedback,
    PriceRecord, Recommendation, Result, RunStats, RunStatus, UsagePoint,
    WeightVector,
};

/// Storage operations the core depends on.
///
/// Contract notes:
/// - `record_decision` commits the approval event and the run's approval
///   status in one transaction, and is the single enforcement point for
///   the one-terminal-decision rule.
/// - A reader observing a run with status `Completed` must see every
///   line of that run.
/// - `insert_feedback` assigns a monotonically increasing id and rejects
///   a duplicate (line, type) pair.
#[async_trait]
pub trait Store: Send + Sync {
    // Item master and signal sources
    async fn query_items(&self) -> Result<Vec<Item>>;
    async fn get_item(&self, code: &str) -> Result<Option<Item>>;
    async fn query_history(
        &self,
        item_code: &str,
        as_of: NaiveDate,
        days: u32,
    ) -> Result<Vec<UsagePoint>>;
    async fn query_population(&self, date: NaiveDate) -> Result<Option<f64>>;
    async fn query_menu_occurrences(
        &self,
        item_code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64>;

    // Forecast runs and lines
    async fn insert_forecast_run(&self, run: &ForecastRun) -> Result<()>;
    async fn insert_forecast_line(&self, line: &ForecastLine) -> Result<()>;
    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        stats: Option<RunStats>,
        error: Option<String>,
    ) -> Result<()>;
    async fn get_run(&self, run_id: Uuid) -> Result<Option<ForecastRun>>;
    async fn list_lines(&self, run_id: Uuid) -> Result<Vec<ForecastLine>>;
    async fn get_line(&self, line_id: Uuid) -> Result<Option<ForecastLine>>;
    /// Lines of the most recent completed run, for on-demand policy work.
    async fn latest_completed_lines(&self) -> Result<Vec<ForecastLine>>;
    async fn record_actual_usage(&self, line_id: Uuid, actual: f64) -> Result<()>;
    async fn update_line_adjustment(
        &self,
        line_id: Uuid,
        adjusted_qty: f64,
        reason: &str,
    ) -> Result<()>;
    /// Lines whose forecast-for date falls inside the window; accuracy
    /// evaluation filters out those without actuals.
    async fn lines_forecast_for(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ForecastLine>>;

    // Approval ledger
    async fn record_decision(&self, event: &ApprovalEvent) -> Result<()>;
    async fn list_approvals(&self, run_id: Uuid) -> Result<Vec<ApprovalEvent>>;

    // Feedback
    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackEntry>;
    async fn list_feedback_after(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>>;
    async fn max_feedback_id(&self) -> Result<i64>;
    async fn list_unapplied_feedback(
        &self,
        item_code: Option<&str>,
    ) -> Result<Vec<FeedbackEntry>>;
    /// Most recent `per_item` entries per item, newest last; used to
    /// rebuild drift windows after a restart.
    async fn recent_feedback_by_item(
        &self,
        per_item: usize,
    ) -> Result<HashMap<String, Vec<FeedbackEntry>>>;
    async fn mark_feedback_applied(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    // Learned weights
    async fn load_weights(&self, item_code: &str) -> Result<Option<WeightVector>>;
    async fn save_weights(&self, item_code: &str, weights: &WeightVector) -> Result<()>;

    // Vendor prices
    async fn query_prices(&self, org: &str, sku: &str) -> Result<Vec<PriceRecord>>;
    async fn preferred_vendor(&self, org: &str) -> Result<Option<String>>;

    // Policy recommendations
    async fn insert_recommendation(&self, rec: &Recommendation) -> Result<()>;
}

pub type SharedStore = Arc<dyn Store>;
