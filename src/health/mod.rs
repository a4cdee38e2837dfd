//! Scheduled health & reconciliation auditor. Runs the pluggable audit
//! procedure on a cron cadence, raises alerts on score degradation, and
//! gates the auto-retrain path behind a 24-hour cool-down.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::HealthConfig;
use crate::domain::{InventoryOpsError, Result};
use crate::metrics::SharedMetrics;

/// Pluggable reconciliation audit. The implementation lives outside the
/// core (it walks invoices, counts, and mutations in the store of
/// record); the core only schedules it and reacts to its report.
#[async_trait]
pub trait Audit: Send + Sync {
    async fn run(&self) -> Result<AuditReport>;
}

/// What the audit procedure reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Overall health in [0, 100]
    pub health_score: f64,
    pub status: String,
    pub issues: Vec<String>,
    pub fixed_mutations: u64,
    pub stockout_risk_count: u64,
    /// Count of new invoices since the last audit; non-zero asks for a
    /// retrain cycle
    pub should_retrain: u64,
}

/// The retrain cycle the auditor may trigger. Implemented by the
/// service facade so the auditor never depends on the engine directly.
#[async_trait]
pub trait Remediation: Send + Sync {
    async fn run_retrain_cycle(&self) -> Result<()>;
}

/// No-op remediation for deployments with auto-retrain disabled.
pub struct NoRemediation;

#[async_trait]
impl Remediation for NoRemediation {
    async fn run_retrain_cycle(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

/// One audit execution in the bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub executed_at: DateTime<Utc>,
    pub health_score: f64,
    pub status: String,
    pub issue_count: u64,
    pub fixed_mutations: u64,
    pub stockout_risk_count: u64,
    pub duration_ms: u64,
    pub alerts: Vec<Alert>,
    pub retrain_triggered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditorStatus {
    pub running: bool,
    pub audits_executed: u64,
    pub last_score: Option<f64>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub last_auto_retrain_at: Option<DateTime<Utc>>,
}

struct AuditorState {
    history: VecDeque<AuditRecord>,
    last_score: Option<f64>,
    last_executed_at: Option<DateTime<Utc>>,
    last_auto_retrain_at: Option<DateTime<Utc>>,
    audits_executed: u64,
}

struct AuditorInner {
    audit: Arc<dyn Audit>,
    remediation: Arc<dyn Remediation>,
    metrics: SharedMetrics,
    config: HealthConfig,
    state: Mutex<AuditorState>,
    /// Single-flight guard: only one audit executes at a time
    in_flight: Mutex<()>,
    running: std::sync::atomic::AtomicBool,
}

pub struct HealthAuditor {
    inner: Arc<AuditorInner>,
    shutdown: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HealthAuditor {
    pub fn new(
        audit: Arc<dyn Audit>,
        remediation: Arc<dyn Remediation>,
        metrics: SharedMetrics,
        config: HealthConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(AuditorInner {
                audit,
                remediation,
                metrics,
                config,
                state: Mutex::new(AuditorState {
                    history: VecDeque::new(),
                    last_score: None,
                    last_executed_at: None,
                    last_auto_retrain_at: None,
                    audits_executed: 0,
                }),
                in_flight: Mutex::new(()),
                running: std::sync::atomic::AtomicBool::new(false),
            }),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Start the cron loop. Re-starting is a no-op.
    pub async fn start(&self) -> Result<()> {
        use std::sync::atomic::Ordering;

        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("health auditor already running");
            return Ok(());
        }

        let schedule = Schedule::from_str(&self.inner.config.schedule).map_err(|e| {
            InventoryOpsError::InvalidArgument(format!(
                "bad health check schedule '{}': {}",
                self.inner.config.schedule, e
            ))
        })?;

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    warn!("health schedule yields no future run, stopping");
                    break;
                };
                let wait = (next - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::from_secs(1));

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(e) = inner.execute_once(Utc::now()).await {
                            error!(error = %e, "scheduled audit failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("health auditor shutting down");
                        break;
                    }
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        info!(schedule = %self.inner.config.schedule, "health auditor started");
        Ok(())
    }

    /// Stop the scheduler and await the in-flight audit.
    pub async fn stop(&self) {
        use std::sync::atomic::Ordering;

        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "auditor task ended abnormally");
            }
        }
        // Taking the guard waits for any audit still executing
        let _guard = self.inner.in_flight.lock().await;
        info!("health auditor stopped");
    }

    /// Run one audit outside the schedule.
    pub async fn trigger_manual(&self) -> Result<AuditRecord> {
        self.inner.execute_once(Utc::now()).await
    }

    /// Run one audit with an explicit clock, for cool-down tests.
    pub async fn trigger_at(&self, now: DateTime<Utc>) -> Result<AuditRecord> {
        self.inner.execute_once(now).await
    }

    pub async fn status(&self) -> AuditorStatus {
        let state = self.inner.state.lock().await;
        AuditorStatus {
            running: self
                .inner
                .running
                .load(std::sync::atomic::Ordering::SeqCst),
            audits_executed: state.audits_executed,
            last_score: state.last_score,
            last_executed_at: state.last_executed_at,
            last_auto_retrain_at: state.last_auto_retrain_at,
        }
    }

    pub async fn history(&self) -> Vec<AuditRecord> {
        self.inner.state.lock().await.history.iter().cloned().collect()
    }
}

impl AuditorInner {
    async fn execute_once(&self, now: DateTime<Utc>) -> Result<AuditRecord> {
        let _guard = self.in_flight.lock().await;
        let started = Instant::now();

        let report = tokio::time::timeout(
            Duration::from_secs(self.config.audit_timeout_secs),
            self.audit.run(),
        )
        .await
        .map_err(|_| {
            InventoryOpsError::DependencyUnavailable(format!(
                "audit exceeded {}s timeout",
                self.config.audit_timeout_secs
            ))
        })??;

        let previous_score = self.state.lock().await.last_score;
        let alerts = self.evaluate_alerts(&report, previous_score);

        for alert in &alerts {
            match alert.severity {
                AlertSeverity::Critical => error!(alert = %alert.message, "audit alert"),
                AlertSeverity::Warning => warn!(alert = %alert.message, "audit alert"),
            }
            self.metrics.counter(
                "inventory_ops_audit_alerts_total",
                &[(
                    "severity",
                    match alert.severity {
                        AlertSeverity::Critical => "critical".to_string(),
                        AlertSeverity::Warning => "warning".to_string(),
                    },
                )],
                1,
            );
        }

        let retrain_triggered = self.maybe_auto_retrain(&report, now).await?;

        let record = AuditRecord {
            executed_at: now,
            health_score: report.health_score,
            status: report.status.clone(),
            issue_count: report.issues.len() as u64,
            fixed_mutations: report.fixed_mutations,
            stockout_risk_count: report.stockout_risk_count,
            duration_ms: started.elapsed().as_millis() as u64,
            alerts,
            retrain_triggered,
        };

        let mut state = self.state.lock().await;
        state.last_score = Some(report.health_score);
        state.last_executed_at = Some(now);
        state.audits_executed += 1;
        if retrain_triggered {
            state.last_auto_retrain_at = Some(now);
        }
        state.history.push_back(record.clone());
        while state.history.len() > self.config.history_limit {
            state.history.pop_front();
        }

        self.metrics
            .gauge("inventory_ops_health_score", report.health_score);
        info!(
            score = report.health_score,
            issues = report.issues.len(),
            stockout_risks = report.stockout_risk_count,
            "audit completed"
        );

        Ok(record)
    }

    fn evaluate_alerts(&self, report: &AuditReport, previous: Option<f64>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if report.health_score < self.config.alert_threshold_critical {
            alerts.push(Alert {
                severity: AlertSeverity::Critical,
                message: format!("health score {} is critical", report.health_score),
            });
        } else if report.health_score < self.config.alert_threshold_warning {
            alerts.push(Alert {
                severity: AlertSeverity::Warning,
                message: format!("health score {} below warning threshold", report.health_score),
            });
        }

        if let Some(previous) = previous {
            if previous - report.health_score > self.config.score_drop_warning {
                alerts.push(Alert {
                    severity: AlertSeverity::Warning,
                    message: format!(
                        "health score dropped {:.1} points since last audit",
                        previous - report.health_score
                    ),
                });
            }
        }

        if report.stockout_risk_count > self.config.stockout_risk_warning {
            alerts.push(Alert {
                severity: AlertSeverity::Warning,
                message: format!("{} items at stockout risk", report.stockout_risk_count),
            });
        }

        alerts
    }

    async fn maybe_auto_retrain(&self, report: &AuditReport, now: DateTime<Utc>) -> Result<bool> {
        if report.should_retrain == 0 || !self.config.enable_auto_retrain {
            return Ok(false);
        }

        let last = self.state.lock().await.last_auto_retrain_at;
        if let Some(last) = last {
            let cooldown = chrono::Duration::hours(self.config.retrain_cooldown_hours as i64);
            if now - last < cooldown {
                info!("auto retrain in cooldown");
                return Ok(false);
            }
        }

        info!(
            new_invoices = report.should_retrain,
            "audit triggering retrain cycle"
        );
        self.remediation.run_retrain_cycle().await?;
        Ok(true)
    }
}
