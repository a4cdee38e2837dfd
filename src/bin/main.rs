//! Process root: wires configuration, observability, storage, and the
//! long-lived services, then runs until SIGTERM/SIGINT.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use inventory_ops::{
    config::Config,
    health::{Audit, AuditReport},
    scheduler::wait_for_shutdown_signal,
    service::InventoryOps,
    storage::MemoryStore,
    Actor, BroadcastBus, RecorderMetrics, Role, RoleMatrix,
};

#[derive(Parser)]
#[command(name = "inventory-ops", version, about = "Inventory forecast and order-recommendation core")]
struct Cli {
    /// Path to a TOML config file; env overrides still apply
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the forecast core until shutdown
    Serve,
    /// Execute one forecast run and print the report
    Forecast {
        #[arg(long, default_value_t = 7)]
        horizon: u32,
        #[arg(long, default_value = "default")]
        tenant: String,
        #[arg(long, default_value = "main")]
        location: String,
    },
}

/// Stand-in audit until a reconciliation backend is wired up.
struct NoopAudit;

#[async_trait::async_trait]
impl Audit for NoopAudit {
    async fn run(&self) -> inventory_ops::Result<AuditReport> {
        Ok(AuditReport {
            health_score: 100.0,
            status: "ok".to_string(),
            issues: vec![],
            fixed_mutations: 0,
            stockout_risk_count: 0,
            should_retrain: 0,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    inventory_ops::init_tracing();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(BroadcastBus::default());
    let metrics = Arc::new(RecorderMetrics);
    let authz = Arc::new(RoleMatrix);

    let service = InventoryOps::new(
        store,
        bus,
        metrics.clone(),
        authz,
        Arc::new(NoopAudit),
        config.clone(),
    );

    match cli.command {
        Command::Serve => {
            inventory_ops::init_metrics(&config.metrics)
                .context("initializing metrics exporter")?;

            service.start().await.context("starting workers")?;
            let mut scheduler = service
                .build_scheduler(metrics)
                .context("building scheduler")?;
            scheduler.start().await;

            info!(version = inventory_ops::VERSION, "inventory-ops serving");
            wait_for_shutdown_signal().await;

            scheduler.shutdown().await;
            service.shutdown().await;
        }
        Command::Forecast {
            horizon,
            tenant,
            location,
        } => {
            let actor = Actor::new("cli:operator", Role::Owner);
            let report = service
                .generate_forecast(horizon, &tenant, &location, &actor)
                .await
                .context("forecast run failed")?;

            println!(
                "run {} forecast {} items (skipped {}) avg confidence {:.2} value {} in {}ms{}",
                report.run_id,
                report.items_forecasted,
                report.items_skipped,
                report.avg_confidence,
                report.total_predicted_value,
                report.duration_ms,
                if report.shadow_mode { " [shadow]" } else { "" },
            );
        }
    }

    Ok(())
}
