use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::weights::WeightVector;

/// Execution state of a forecast run. Transitions strictly
/// `Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Decision state of a forecast run. `Pending -> Approved | Rejected`,
/// terminal either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// Aggregate statistics stamped onto a run at completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub items_forecasted: u64,
    pub items_skipped: u64,
    pub avg_confidence: f64,
    pub total_predicted_value: Decimal,
    pub duration_ms: u64,
}

/// A single forecast execution. Owns its lines; immutable once a
/// terminal approval decision lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRun {
    pub run_id: Uuid,
    pub forecast_date: NaiveDate,
    pub horizon_days: u32,
    pub model_version: String,
    pub tenant: String,
    pub location: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,

    /// Shadow runs are recorded and visible but downstream automation
    /// must not act on them until approved.
    pub shadow: bool,

    pub status: RunStatus,
    pub approval_status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: RunStats,
}

impl ForecastRun {
    pub fn new(
        run_id: Uuid,
        forecast_date: NaiveDate,
        horizon_days: u32,
        model_version: impl Into<String>,
        tenant: impl Into<String>,
        location: impl Into<String>,
        created_by: impl Into<String>,
        shadow: bool,
    ) -> Self {
        Self {
            run_id,
            forecast_date,
            horizon_days,
            model_version: model_version.into(),
            tenant: tenant.into(),
            location: location.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            shadow,
            status: RunStatus::Running,
            approval_status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            error: None,
            stats: RunStats::default(),
        }
    }
}

/// Why an order quantity was (or was not) recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderReason {
    BelowReorderPoint,
    BelowParLevel,
    SufficientStock,
}

impl OrderReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderReason::BelowReorderPoint => "below_reorder_point",
            OrderReason::BelowParLevel => "below_par_level",
            OrderReason::SufficientStock => "sufficient_stock",
        }
    }
}

/// Downstream state of a recommended order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Approved,
    Adjusted,
    Rejected,
    Fulfilled,
}

/// Per-signal multiplicative contributions captured at forecast time,
/// kept for explainability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignalContributions {
    pub usage_history: f64,
    pub population: f64,
    pub menu_rotation: f64,
    pub seasonality: f64,
}

/// One forecasted item within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastLine {
    pub line_id: Uuid,
    pub run_id: Uuid,
    pub item_code: String,
    pub category: String,
    pub unit: String,
    pub storage_location: String,

    /// Fused prediction for the horizon; never negative
    pub predicted_usage: f64,
    /// Calibrated confidence in [0.1, 1.0]
    pub confidence: f64,
    pub contributions: SignalContributions,
    pub weights: WeightVector,

    pub recommended_order_qty: u64,
    pub order_reason: OrderReason,
    pub reorder_point: f64,
    pub safety_stock: f64,
    pub lead_time_days: u32,
    pub par_level: f64,
    pub current_stock: f64,

    pub order_status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment_reason: Option<String>,

    pub forecast_for_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
    pub predicted_value: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance_pct: Option<f64>,

    pub created_at: DateTime<Utc>,
}

impl ForecastLine {
    /// Record the post-hoc actual and derive variance figures.
    pub fn record_actual(&mut self, actual: f64) {
        let variance = actual - self.predicted_usage;
        let variance_pct = if self.predicted_usage > 0.0 {
            variance / self.predicted_usage * 100.0
        } else if actual > 0.0 {
            100.0
        } else {
            0.0
        };
        self.actual_usage = Some(actual);
        self.variance = Some(variance);
        self.variance_pct = Some(variance_pct);
    }

    /// A forecast counts as accurate once its actual landed within 10 %.
    pub fn is_accurate(&self) -> Option<bool> {
        self.variance_pct.map(|v| v.abs() <= 10.0)
    }
}
