//! Inventory-Ops - Inventory forecast & order-recommendation core
//!
//! This library ingests historical consumption, population, and menu
//! signals; produces per-item demand forecasts with calibrated
//! confidence; recommends reorder quantities against par/safety/lead-time
//! policy; streams feedback for incremental drift detection; learns
//! adjusted signal weights; and gates automated application of results
//! behind a dual-control shadow-mode approval workflow.

pub mod approval;
pub mod authz;
pub mod config;
pub mod domain;
pub mod engine;
pub mod events;
pub mod health;
pub mod metrics;
pub mod observability;
pub mod policy;
pub mod pricing;
pub mod retrain;
pub mod scheduler;
pub mod service;
pub mod signals;
pub mod storage;
pub mod stream;

// Re-export commonly used types
pub use domain::{
    AbcClass, AccuracyRecord, ApprovalAction, ApprovalEvent, ApprovalStatus,
    FeedbackEntry, FeedbackType, ForecastLine, ForecastRun, InventoryOpsError,
    Item, NewFeedback, OrderReason, OrderStatus, PriceRecord, PriceSource,
    Recipe, RecipeCostResult, Recommendation, RejectReason, Result, RunStats,
    RunStatus, SignalKind, UsagePoint, WeightVector,
};

pub use approval::{ApprovalLedger, CategorySummary, RunState};
pub use authz::{Actor, AuthZ, Role, RoleMatrix};
pub use config::{
    Config, EngineConfig, GovernorConfig, HealthConfig, SchedulerConfig,
    StreamConfig,
};
pub use engine::{
    confidence_score, fuse_prediction, holt_forecast, order_quantity,
    ForecastEngine, OrderDecision, RunReport, RunRequest,
};
pub use events::{BroadcastBus, Event, EventBus, NoopBus, Topic};
pub use health::{
    Alert, AlertSeverity, Audit, AuditRecord, AuditReport, AuditorStatus,
    HealthAuditor, NoRemediation, Remediation,
};
pub use metrics::{init_metrics, Metrics, MetricsConfig, NoopMetrics, RecorderMetrics};
pub use observability::init_tracing;
pub use policy::{classify_abc, AbcEngine, ServiceLevels};
pub use pricing::PriceResolver;
pub use retrain::{ApplyOutcome, RetrainGovernor};
pub use scheduler::{wait_for_shutdown_signal, Job, JobScheduler};
pub use service::{FeedbackReceipt, FeedbackRequest, InventoryOps, WeightProposal};
pub use signals::{SignalBundle, SignalGatherer};
pub use storage::{MemoryStore, Store};
pub use stream::{DriftCache, DriftDecision, FeedbackStream, StreamStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default observability configuration
pub fn init() -> Result<()> {
    observability::init_tracing();
    Ok(())
}
