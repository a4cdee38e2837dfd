use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Adjustment,
    Approval,
    Rejection,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Adjustment => "adjustment",
            FeedbackType::Approval => "approval",
            FeedbackType::Rejection => "rejection",
        }
    }
}

/// Post-hoc human feedback on a forecast line. Created at most once per
/// (line, type); the only mutation ever applied is flipping `applied`
/// false -> true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    /// Monotonically increasing sequence id, assigned by the store.
    /// The stream consumes entries in ascending id order.
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_line_id: Option<Uuid>,
    pub item_code: String,
    pub feedback_type: FeedbackType,
    pub original_prediction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<f64>,
    pub reason: String,
    pub delta: f64,
    pub delta_pct: f64,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

impl FeedbackEntry {
    /// Error magnitude this entry contributes to the item's drift
    /// window. Only adjustments carry one.
    pub fn mape_pct(&self) -> Option<f64> {
        match self.feedback_type {
            FeedbackType::Adjustment => Some(self.delta_pct.abs()),
            _ => None,
        }
    }
}

/// Unpersisted feedback as submitted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub forecast_line_id: Option<Uuid>,
    pub item_code: String,
    pub feedback_type: FeedbackType,
    pub original_prediction: f64,
    pub adjustment: Option<f64>,
    pub reason: String,
    pub submitted_by: String,
}

impl NewFeedback {
    pub fn delta(&self) -> f64 {
        self.adjustment.map_or(0.0, |a| a - self.original_prediction)
    }

    pub fn delta_pct(&self) -> f64 {
        if self.original_prediction.abs() > f64::EPSILON {
            self.delta() / self.original_prediction * 100.0
        } else if self.delta().abs() > f64::EPSILON {
            100.0
        } else {
            0.0
        }
    }
}

/// A request for an incremental retrain of one item, queued by the
/// drift detector (or a run rejection) and drained by the governor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainRequest {
    pub item_code: String,
    pub mean_mape_pct: f64,
    pub requested_at: DateTime<Utc>,
    pub source: RetrainSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainSource {
    DriftDetector,
    RunRejection,
    Manual,
}
