use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

/// Why a run was rejected. Required on every reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Inaccurate,
    TooHigh,
    TooLow,
    Other,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Inaccurate => "inaccurate",
            RejectReason::TooHigh => "too_high",
            RejectReason::TooLow => "too_low",
            RejectReason::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inaccurate" => Some(Self::Inaccurate),
            "too_high" => Some(Self::TooHigh),
            "too_low" => Some(Self::TooLow),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Item-level quantities and confidences frozen at decision time, so
/// later line edits cannot rewrite the historical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub item_code: String,
    pub recommended_order_qty: u64,
    pub confidence: f64,
}

/// Append-only record of a terminal approval decision on a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub action: ApprovalAction,
    pub approver: String,
    pub approver_role: Role,
    pub decided_at: DateTime<Utc>,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<RejectReason>,
    pub items: Vec<LineSnapshot>,
    pub total_items: u64,
    pub total_recommended_qty: u64,
    pub avg_confidence: f64,
}

impl ApprovalEvent {
    pub fn new(
        run_id: Uuid,
        action: ApprovalAction,
        approver: impl Into<String>,
        approver_role: Role,
        note: impl Into<String>,
        reason_code: Option<RejectReason>,
        items: Vec<LineSnapshot>,
    ) -> Self {
        let total_items = items.len() as u64;
        let total_recommended_qty = items.iter().map(|s| s.recommended_order_qty).sum();
        let avg_confidence = if items.is_empty() {
            0.0
        } else {
            items.iter().map(|s| s.confidence).sum::<f64>() / items.len() as f64
        };

        Self {
            event_id: Uuid::new_v4(),
            run_id,
            action,
            approver: approver.into(),
            approver_role,
            decided_at: Utc::now(),
            note: note.into(),
            reason_code,
            items,
            total_items,
            total_recommended_qty,
            avg_confidence,
        }
    }
}
