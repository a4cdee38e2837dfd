//! Transport-agnostic service facade. Every exposed operation performs
//! its role check here, then delegates to the owning component. The
//! facade also implements the retrain cycle the health auditor
//! triggers, which keeps the auditor decoupled from the engine.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::approval::{ApprovalLedger, RunState};
use crate::authz::{Actor, SharedAuthZ, FEEDBACK_ROLES, FORECAST_ROLES, VIEW_ROLES};
use crate::config::Config;
use crate::domain::{
    AccuracyRecord, ApprovalEvent, FeedbackType, InventoryOpsError, NewFeedback,
    Recommendation, RejectReason, Result, SignalKind,
};
use crate::engine::{ForecastEngine, RunReport, RunRequest};
use crate::events::SharedBus;
use crate::health::{Audit, HealthAuditor, Remediation};
use crate::metrics::SharedMetrics;
use crate::policy::{AbcEngine, ServiceLevels};
use crate::retrain::{ApplyOutcome, RetrainGovernor};
use crate::scheduler::{Job, JobScheduler};
use crate::storage::SharedStore;
use crate::stream::FeedbackStream;

/// Inbound feedback submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_line_id: Option<Uuid>,
    pub item_code: String,
    pub feedback_type: FeedbackType,
    pub original_prediction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<f64>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightProposal {
    pub signal: SignalKind,
    pub delta: f64,
}

/// What the caller gets back for a submitted feedback entry. The weight
/// adjustments are the governor's proposal; application happens later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReceipt {
    pub feedback_id: i64,
    pub delta: f64,
    pub delta_pct: f64,
    pub weight_adjustments: Vec<WeightProposal>,
}

pub struct InventoryOps {
    store: SharedStore,
    authz: SharedAuthZ,
    config: Config,
    engine: Arc<ForecastEngine>,
    ledger: ApprovalLedger,
    governor: Arc<RetrainGovernor>,
    stream: Arc<FeedbackStream>,
    auditor: Arc<HealthAuditor>,
    policy: AbcEngine,
}

impl InventoryOps {
    pub fn new(
        store: SharedStore,
        bus: SharedBus,
        metrics: SharedMetrics,
        authz: SharedAuthZ,
        audit: Arc<dyn Audit>,
        config: Config,
    ) -> Self {
        let engine = Arc::new(ForecastEngine::new(
            store.clone(),
            metrics.clone(),
            config.engine.clone(),
        ));
        let governor = Arc::new(RetrainGovernor::new(
            store.clone(),
            metrics.clone(),
            config.governor.clone(),
        ));

        let remediation: Arc<dyn Remediation> = Arc::new(RetrainCycle {
            engine: engine.clone(),
            governor: governor.clone(),
            horizon_days: config.engine.default_horizon_days,
            tenant: config.scheduler.tenant.clone(),
            location: config.scheduler.location.clone(),
            cooldown_hours: config.health.retrain_cooldown_hours,
        });

        let auditor = Arc::new(HealthAuditor::new(
            audit,
            remediation,
            metrics.clone(),
            config.health.clone(),
        ));
        let stream = Arc::new(FeedbackStream::new(
            store.clone(),
            bus.clone(),
            metrics.clone(),
            governor.clone(),
            config.stream.clone(),
        ));
        let ledger = ApprovalLedger::new(
            store.clone(),
            bus.clone(),
            metrics.clone(),
            authz.clone(),
        );
        let policy = AbcEngine::new(store.clone(), metrics.clone(), config.engine.clone());

        Self {
            store,
            authz,
            config,
            engine,
            ledger,
            governor,
            stream,
            auditor,
            policy,
        }
    }

    /// Start the long-lived workers (feedback stream and health
    /// auditor).
    pub async fn start(&self) -> Result<()> {
        self.stream.start().await?;
        self.auditor.start().await?;
        Ok(())
    }

    /// Stop workers, awaiting in-flight polls and audits.
    pub async fn shutdown(&self) {
        self.stream.stop().await;
        self.auditor.stop().await;
        info!("inventory ops service stopped");
    }

    /// Build the process scheduler: daily forecast run plus the
    /// apply-pending-feedback job. The stream and auditor keep their
    /// own timers.
    pub fn build_scheduler(&self, metrics: SharedMetrics) -> Result<JobScheduler> {
        let cfg = &self.config.scheduler;
        let mut scheduler = JobScheduler::new(
            metrics,
            std::time::Duration::from_secs(cfg.shutdown_grace_secs),
        );

        scheduler.add_cron_job(
            &cfg.forecast_schedule,
            Arc::new(ForecastJob {
                engine: self.engine.clone(),
                horizon_days: self.config.engine.default_horizon_days,
                tenant: cfg.tenant.clone(),
                location: cfg.location.clone(),
            }),
        )?;
        scheduler.add_cron_job(
            &cfg.apply_feedback_schedule,
            Arc::new(ApplyFeedbackJob {
                governor: self.governor.clone(),
            }),
        )?;

        Ok(scheduler)
    }

    // Exposed operations

    pub async fn generate_forecast(
        &self,
        horizon_days: u32,
        tenant: &str,
        location: &str,
        actor: &Actor,
    ) -> Result<RunReport> {
        self.authz.require_role(actor, FORECAST_ROLES)?;
        if horizon_days == 0 {
            return Err(InventoryOpsError::InvalidArgument(
                "horizon must be at least one day".to_string(),
            ));
        }

        self.engine
            .generate(RunRequest {
                run_id: None,
                horizon_days,
                tenant: tenant.to_string(),
                location: location.to_string(),
                actor: actor.id.clone(),
            })
            .await
    }

    pub async fn approve(
        &self,
        run_id: Uuid,
        actor: &Actor,
        note: &str,
    ) -> Result<ApprovalEvent> {
        self.ledger.approve(run_id, actor, note).await
    }

    pub async fn reject(
        &self,
        run_id: Uuid,
        actor: &Actor,
        note: &str,
        reason_code: RejectReason,
    ) -> Result<ApprovalEvent> {
        self.ledger.reject(run_id, actor, note, reason_code).await
    }

    pub async fn run_state(&self, run_id: Uuid, actor: &Actor) -> Result<RunState> {
        self.authz.require_role(actor, VIEW_ROLES)?;
        self.ledger.state(run_id).await
    }

    pub async fn submit_feedback(
        &self,
        request: FeedbackRequest,
        actor: &Actor,
    ) -> Result<FeedbackReceipt> {
        self.authz.require_role(actor, FEEDBACK_ROLES)?;

        if request.item_code.trim().is_empty() {
            return Err(InventoryOpsError::InvalidArgument(
                "item code is required".to_string(),
            ));
        }
        if request.feedback_type == FeedbackType::Adjustment && request.adjustment.is_none() {
            return Err(InventoryOpsError::InvalidArgument(
                "adjustment feedback requires an adjusted quantity".to_string(),
            ));
        }

        if let Some(line_id) = request.forecast_line_id {
            let line = self
                .store
                .get_line(line_id)
                .await?
                .ok_or_else(|| InventoryOpsError::NotFound(format!("line {}", line_id)))?;

            if let (FeedbackType::Adjustment, Some(adjusted)) =
                (request.feedback_type, request.adjustment)
            {
                self.store
                    .update_line_adjustment(line.line_id, adjusted, &request.reason)
                    .await?;
            }
        }

        let entry = self
            .store
            .insert_feedback(NewFeedback {
                forecast_line_id: request.forecast_line_id,
                item_code: request.item_code,
                feedback_type: request.feedback_type,
                original_prediction: request.original_prediction,
                adjustment: request.adjustment,
                reason: request.reason,
                submitted_by: actor.id.clone(),
            })
            .await?;

        let weight_adjustments = self
            .governor
            .propose(&entry)
            .into_iter()
            .map(|(signal, delta)| WeightProposal { signal, delta })
            .collect();

        Ok(FeedbackReceipt {
            feedback_id: entry.id,
            delta: entry.delta,
            delta_pct: entry.delta_pct,
            weight_adjustments,
        })
    }

    pub async fn apply_pending_feedback(&self) -> Result<ApplyOutcome> {
        self.governor.apply_pending(Utc::now()).await
    }

    /// Record a reconciled actual against a forecast line; accuracy
    /// reporting picks it up from there.
    pub async fn record_actual(&self, line_id: Uuid, actual: f64) -> Result<()> {
        if actual < 0.0 {
            return Err(InventoryOpsError::InvalidArgument(
                "actual usage cannot be negative".to_string(),
            ));
        }
        self.store.record_actual_usage(line_id, actual).await
    }

    pub async fn calculate_accuracy(
        &self,
        actor: &Actor,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<AccuracyRecord> {
        self.authz.require_role(actor, VIEW_ROLES)?;

        let (from, to) = period.unwrap_or_else(|| {
            let today = Utc::now().date_naive();
            (today - Duration::days(30), today)
        });
        if from > to {
            return Err(InventoryOpsError::InvalidArgument(
                "accuracy period start is after its end".to_string(),
            ));
        }

        let lines = self.store.lines_forecast_for(from, to).await?;
        Ok(AccuracyRecord::from_lines(from, to, &lines))
    }

    pub async fn generate_recommendations(
        &self,
        levels: ServiceLevels,
        actor: &Actor,
    ) -> Result<Vec<Recommendation>> {
        self.authz.require_role(actor, FORECAST_ROLES)?;
        self.policy.generate_recommendations(&levels).await
    }

    // Worker lifecycle access

    pub fn stream(&self) -> &Arc<FeedbackStream> {
        &self.stream
    }

    pub fn auditor(&self) -> &Arc<HealthAuditor> {
        &self.auditor
    }

    pub fn governor(&self) -> &Arc<RetrainGovernor> {
        &self.governor
    }
}

/// The forecast-plus-weight-application cycle the auditor triggers.
struct RetrainCycle {
    engine: Arc<ForecastEngine>,
    governor: Arc<RetrainGovernor>,
    horizon_days: u32,
    tenant: String,
    location: String,
    cooldown_hours: u64,
}

#[async_trait]
impl Remediation for RetrainCycle {
    async fn run_retrain_cycle(&self) -> Result<()> {
        let now = Utc::now();
        if self
            .governor
            .auto_remediate(self.cooldown_hours, now)
            .await?
            .is_none()
        {
            return Ok(());
        }

        self.engine
            .generate(RunRequest {
                run_id: None,
                horizon_days: self.horizon_days,
                tenant: self.tenant.clone(),
                location: self.location.clone(),
                actor: "system:auto-retrain".to_string(),
            })
            .await?;
        Ok(())
    }
}

struct ForecastJob {
    engine: Arc<ForecastEngine>,
    horizon_days: u32,
    tenant: String,
    location: String,
}

#[async_trait]
impl Job for ForecastJob {
    fn name(&self) -> &str {
        "daily_forecast"
    }

    async fn run(&self) -> Result<()> {
        self.engine
            .generate(RunRequest {
                run_id: None,
                horizon_days: self.horizon_days,
                tenant: self.tenant.clone(),
                location: self.location.clone(),
                actor: "system:scheduler".to_string(),
            })
            .await?;
        Ok(())
    }
}

struct ApplyFeedbackJob {
    governor: Arc<RetrainGovernor>,
}

#[async_trait]
impl Job for ApplyFeedbackJob {
    fn name(&self) -> &str {
        "apply_pending_feedback"
    }

    async fn run(&self) -> Result<()> {
        let now = Utc::now();
        self.governor.process_queue(now).await?;
        self.governor.apply_pending(now).await?;
        Ok(())
    }
}
