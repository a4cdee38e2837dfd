//! Single-process cooperative scheduler: one timer task per job, a
//! shared shutdown signal, and a bounded grace period on exit.

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::{InventoryOpsError, Result};
use crate::metrics::SharedMetrics;

/// A unit of scheduled work. Errors are logged and metered; the
/// schedule keeps ticking.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> Result<()>;
}

enum Trigger {
    Cron(Box<Schedule>),
    Every(Duration),
}

struct ScheduledJob {
    job: Arc<dyn Job>,
    trigger: Trigger,
}

pub struct JobScheduler {
    jobs: Vec<ScheduledJob>,
    metrics: SharedMetrics,
    shutdown: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    grace: Duration,
}

impl JobScheduler {
    pub fn new(metrics: SharedMetrics, grace: Duration) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            jobs: Vec::new(),
            metrics,
            shutdown,
            handles: Mutex::new(Vec::new()),
            grace,
        }
    }

    /// Register a cron-triggered job (seconds-field cron expression).
    pub fn add_cron_job(&mut self, expression: &str, job: Arc<dyn Job>) -> Result<()> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            InventoryOpsError::InvalidArgument(format!(
                "bad cron expression '{}' for job {}: {}",
                expression,
                job.name(),
                e
            ))
        })?;
        self.jobs.push(ScheduledJob {
            job,
            trigger: Trigger::Cron(Box::new(schedule)),
        });
        Ok(())
    }

    /// Register an interval-triggered job.
    pub fn add_interval_job(&mut self, every: Duration, job: Arc<dyn Job>) {
        self.jobs.push(ScheduledJob {
            job,
            trigger: Trigger::Every(every),
        });
    }

    /// Spawn one timer task per registered job.
    pub async fn start(&mut self) {
        let mut handles = self.handles.lock().await;

        for scheduled in self.jobs.drain(..) {
            let job = Arc::clone(&scheduled.job);
            let metrics = self.metrics.clone();
            let mut shutdown_rx = self.shutdown.subscribe();

            let handle = match scheduled.trigger {
                Trigger::Every(every) => tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(every);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    // Skip the immediate first tick
                    ticker.tick().await;
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => run_job(&job, &metrics).await,
                            _ = shutdown_rx.recv() => break,
                        }
                    }
                }),
                Trigger::Cron(schedule) => tokio::spawn(async move {
                    loop {
                        let Some(next) = schedule.upcoming(Utc).next() else {
                            warn!(job = job.name(), "cron yields no future run");
                            break;
                        };
                        let wait = (next - Utc::now())
                            .to_std()
                            .unwrap_or(Duration::from_secs(1));

                        tokio::select! {
                            _ = tokio::time::sleep(wait) => run_job(&job, &metrics).await,
                            _ = shutdown_rx.recv() => break,
                        }
                    }
                }),
            };
            handles.push(handle);
        }

        info!(jobs = handles.len(), "scheduler started");
    }

    /// Signal every timer and wait up to the grace period for in-flight
    /// work to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(());

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            match tokio::time::timeout(self.grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "job task ended abnormally"),
                Err(_) => warn!("job did not finish within the grace period"),
            }
        }
        info!("scheduler stopped");
    }
}

async fn run_job(job: &Arc<dyn Job>, metrics: &SharedMetrics) {
    let started = std::time::Instant::now();
    match job.run().await {
        Ok(()) => {
            metrics.counter(
                "inventory_ops_scheduled_job_runs_total",
                &[("job", job.name().to_string()), ("status", "ok".to_string())],
                1,
            );
            info!(
                job = job.name(),
                duration_ms = started.elapsed().as_millis() as u64,
                "scheduled job completed"
            );
        }
        Err(e) => {
            metrics.counter(
                "inventory_ops_scheduled_job_runs_total",
                &[("job", job.name().to_string()), ("status", "error".to_string())],
                1,
            );
            error!(job = job.name(), error = %e, "scheduled job failed");
        }
    }
}

/// Block until SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingJob {
        runs: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl Job for FailingJob {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self) -> Result<()> {
            Err(InventoryOpsError::DependencyUnavailable("db down".into()))
        }
    }

    #[tokio::test]
    async fn test_interval_job_ticks_until_shutdown() {
        let runs = Arc::new(AtomicU64::new(0));
        let mut scheduler =
            JobScheduler::new(Arc::new(NoopMetrics), Duration::from_secs(1));
        scheduler.add_interval_job(
            Duration::from_millis(20),
            Arc::new(CountingJob { runs: runs.clone() }),
        );

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(110)).await;
        scheduler.shutdown().await;

        let count = runs.load(Ordering::SeqCst);
        assert!(count >= 2, "expected a few ticks, got {}", count);

        let after = count;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after, "job ran after shutdown");
    }

    #[tokio::test]
    async fn test_failing_job_does_not_stop_schedule() {
        let mut scheduler =
            JobScheduler::new(Arc::new(NoopMetrics), Duration::from_secs(1));
        scheduler.add_interval_job(Duration::from_millis(15), Arc::new(FailingJob));

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_cron_rejected() {
        let mut scheduler =
            JobScheduler::new(Arc::new(NoopMetrics), Duration::from_secs(1));
        let result = scheduler.add_cron_job(
            "not a cron",
            Arc::new(CountingJob {
                runs: Arc::new(AtomicU64::new(0)),
            }),
        );
        assert!(result.is_err());
    }
}
