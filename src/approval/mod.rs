//! Shadow-mode approval ledger. Runs land here in `pending` state and
//! nothing downstream may act on their recommendations until a human
//! other than the creator approves them.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::authz::{Actor, SharedAuthZ, FORECAST_ROLES};
use crate::domain::{
    ApprovalAction, ApprovalEvent, FeedbackType, ForecastLine, ForecastRun,
    InventoryOpsError, LineSnapshot, NewFeedback, RejectReason, Result,
    RunStatus,
};
use crate::events::{SharedBus, Topic};
use crate::metrics::SharedMetrics;
use crate::storage::SharedStore;

/// Full decision state of a run, with the per-category rollup readers
/// want next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run: ForecastRun,
    pub approvals: Vec<ApprovalEvent>,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub items: u64,
    pub total_recommended_qty: u64,
    pub avg_confidence: f64,
}

pub struct ApprovalLedger {
    store: SharedStore,
    bus: SharedBus,
    metrics: SharedMetrics,
    authz: SharedAuthZ,
}

impl ApprovalLedger {
    pub fn new(
        store: SharedStore,
        bus: SharedBus,
        metrics: SharedMetrics,
        authz: SharedAuthZ,
    ) -> Self {
        Self {
            store,
            bus,
            metrics,
            authz,
        }
    }

    pub async fn approve(&self, run_id: Uuid, actor: &Actor, note: &str) -> Result<ApprovalEvent> {
        let (_run, lines) = self.decidable_run(run_id, actor, note).await?;

        let event = ApprovalEvent::new(
            run_id,
            ApprovalAction::Approve,
            actor.id.clone(),
            actor.role,
            note,
            None,
            snapshot(&lines),
        );
        self.store.record_decision(&event).await?;

        self.metrics.counter(
            "inventory_ops_forecast_approved_total",
            &[("items", event.total_items.to_string())],
            1,
        );
        self.bus.emit(
            Topic::ForecastApproved,
            serde_json::json!({
                "runId": run_id.to_string(),
                "approver": actor.id,
                "items": event.total_items,
            }),
        );

        info!(run_id = %run_id, approver = %actor.id, "forecast run approved");
        Ok(event)
    }

    pub async fn reject(
        &self,
        run_id: Uuid,
        actor: &Actor,
        note: &str,
        reason_code: RejectReason,
    ) -> Result<ApprovalEvent> {
        let (_run, lines) = self.decidable_run(run_id, actor, note).await?;

        let event = ApprovalEvent::new(
            run_id,
            ApprovalAction::Reject,
            actor.id.clone(),
            actor.role,
            note,
            Some(reason_code),
            snapshot(&lines),
        );
        self.store.record_decision(&event).await?;

        // A rejection is itself a training signal: every line gets a
        // rejection-type feedback entry for the governor to consume.
        for line in &lines {
            let feedback = NewFeedback {
                forecast_line_id: Some(line.line_id),
                item_code: line.item_code.clone(),
                feedback_type: FeedbackType::Rejection,
                original_prediction: line.predicted_usage,
                adjustment: None,
                reason: format!("rejected: {} ({})", reason_code.as_str(), note),
                submitted_by: actor.id.clone(),
            };
            match self.store.insert_feedback(feedback).await {
                Ok(_) => {}
                // A pre-existing rejection entry for the line is fine
                Err(InventoryOpsError::InvalidArgument(_)) => {}
                Err(other) => return Err(other),
            }
        }

        self.metrics.counter(
            "inventory_ops_forecast_rejected_total",
            &[("reason", reason_code.as_str().to_string())],
            1,
        );
        self.bus.emit(
            Topic::ForecastRejected,
            serde_json::json!({
                "runId": run_id.to_string(),
                "approver": actor.id,
                "reason": reason_code.as_str(),
            }),
        );

        info!(
            run_id = %run_id,
            approver = %actor.id,
            reason = reason_code.as_str(),
            "forecast run rejected"
        );
        Ok(event)
    }

    pub async fn state(&self, run_id: Uuid) -> Result<RunState> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| InventoryOpsError::NotFound(format!("run {}", run_id)))?;
        let lines = self.store.list_lines(run_id).await?;
        let approvals = self.store.list_approvals(run_id).await?;

        Ok(RunState {
            run,
            approvals,
            categories: summarize_categories(&lines),
        })
    }

    /// Shared precondition checks for both terminal actions.
    async fn decidable_run(
        &self,
        run_id: Uuid,
        actor: &Actor,
        note: &str,
    ) -> Result<(ForecastRun, Vec<ForecastLine>)> {
        if note.trim().is_empty() {
            return Err(InventoryOpsError::InvalidArgument(
                "a decision note is required".to_string(),
            ));
        }

        self.authz.require_role(actor, FORECAST_ROLES)?;

        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| InventoryOpsError::NotFound(format!("run {}", run_id)))?;

        if run.status != RunStatus::Completed {
            return Err(InventoryOpsError::InvalidRunState(format!(
                "run {} is {:?}, only completed runs can be decided",
                run_id, run.status
            )));
        }

        if run.approval_status.is_terminal() {
            return Err(InventoryOpsError::AlreadyDecided(run_id.to_string()));
        }

        if run.created_by == actor.id {
            return Err(InventoryOpsError::DualControlViolation {
                run_id: run_id.to_string(),
                approver: actor.id.clone(),
            });
        }

        let lines = self.store.list_lines(run_id).await?;
        Ok((run, lines))
    }
}

fn snapshot(lines: &[ForecastLine]) -> Vec<LineSnapshot> {
    lines
        .iter()
        .map(|line| LineSnapshot {
            item_code: line.item_code.clone(),
            recommended_order_qty: line.recommended_order_qty,
            confidence: line.confidence,
        })
        .collect()
}

fn summarize_categories(lines: &[ForecastLine]) -> Vec<CategorySummary> {
    use std::collections::BTreeMap;

    let mut grouped: BTreeMap<String, (u64, u64, f64)> = BTreeMap::new();
    for line in lines {
        let slot = grouped.entry(line.category.clone()).or_default();
        slot.0 += 1;
        slot.1 += line.recommended_order_qty;
        slot.2 += line.confidence;
    }

    grouped
        .into_iter()
        .map(|(category, (items, qty, conf_sum))| CategorySummary {
            category,
            items,
            total_recommended_qty: qty,
            avg_confidence: conf_sum / items as f64,
        })
        .collect()
}
