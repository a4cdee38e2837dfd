//! Configuration records for every component, with defaults beside the
//! definitions and explicit environment overrides for the documented
//! operator knobs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{InventoryOpsError, Result};
use crate::metrics::MetricsConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Forecasting engine knobs. Smoothing parameters are fixed by the
/// model family; the operational knobs live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// When true (the default) every run is recorded in shadow state and
    /// downstream automation must wait for approval.
    pub shadow_mode: bool,
    pub default_horizon_days: u32,
    pub default_lead_time_days: u32,
    /// Fraction of the prediction held as safety stock
    pub safety_stock_pct: f64,
    pub usage_history_days: u32,
    pub population_baseline: f64,
    pub menu_rotation_boost: f64,
    pub model_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shadow_mode: true,
            default_horizon_days: 7,
            default_lead_time_days: 3,
            safety_stock_pct: 0.20,
            usage_history_days: 30,
            population_baseline: 150.0,
            menu_rotation_boost: 1.5,
            model_version: "holt-v1".to_string(),
        }
    }
}

/// Feedback stream poller knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    /// Fractional MAPE threshold; compared as `threshold * 100` against
    /// the window's mean MAPE percentage.
    pub drift_threshold: f64,
    pub incremental_retrain_enabled: bool,
    pub window_size: usize,
    pub min_window_samples: usize,
    pub drift_cooldown_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            batch_size: 100,
            drift_threshold: 0.15,
            incremental_retrain_enabled: true,
            window_size: 20,
            min_window_samples: 10,
            drift_cooldown_secs: 3_600,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drift_threshold_pct(&self) -> f64 {
        self.drift_threshold * 100.0
    }
}

/// Auto-retrain governor knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Weight adjustments apply only when |delta%| exceeds this
    pub min_delta_pct: f64,
    /// Per-item floor between incremental retrain batches
    pub item_cooldown_secs: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_delta_pct: 10.0,
            item_cooldown_secs: 3_600,
        }
    }
}

/// Health auditor knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Cron expression (seconds field included), default every 6 hours
    pub schedule: String,
    pub enable_auto_retrain: bool,
    pub retrain_cooldown_hours: u64,
    pub alert_threshold_critical: f64,
    pub alert_threshold_warning: f64,
    pub score_drop_warning: f64,
    pub stockout_risk_warning: u64,
    pub audit_timeout_secs: u64,
    pub history_limit: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            schedule: "0 0 */6 * * *".to_string(),
            enable_auto_retrain: false,
            retrain_cooldown_hours: 24,
            alert_threshold_critical: 60.0,
            alert_threshold_warning: 75.0,
            score_drop_warning: 15.0,
            stockout_risk_warning: 10,
            audit_timeout_secs: 600,
            history_limit: 100,
        }
    }
}

/// Process scheduler knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cron for the daily forecast run (seconds field included)
    pub forecast_schedule: String,
    /// Cron for the apply-pending-feedback job
    pub apply_feedback_schedule: String,
    pub shutdown_grace_secs: u64,
    /// Tenant and location stamped onto scheduled runs
    pub tenant: String,
    pub location: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            forecast_schedule: "0 0 6 * * *".to_string(),
            apply_feedback_schedule: "0 30 6 * * *".to_string(),
            shutdown_grace_secs: 30,
            tenant: "default".to_string(),
            location: "main".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents).map_err(|e| {
            InventoryOpsError::InvalidArgument(format!("bad config file: {}", e))
        })?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply the documented operator environment variables on top of
    /// whatever the file (or defaults) provided.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        override_parsed("FEEDBACK_POLL_INTERVAL", &mut self.stream.poll_interval_ms)?;
        override_parsed("FEEDBACK_BATCH_SIZE", &mut self.stream.batch_size)?;
        override_parsed("FEEDBACK_DRIFT_THRESHOLD", &mut self.stream.drift_threshold)?;
        override_parsed(
            "INCREMENTAL_RETRAIN_ENABLED",
            &mut self.stream.incremental_retrain_enabled,
        )?;
        override_parsed("FORECAST_SHADOW_MODE", &mut self.engine.shadow_mode)?;
        if let Ok(v) = std::env::var("HEALTH_CHECK_SCHEDULE") {
            self.health.schedule = v;
        }
        override_parsed("ENABLE_AUTO_RETRAIN", &mut self.health.enable_auto_retrain)?;
        override_parsed(
            "RETRAIN_COOLDOWN_HOURS",
            &mut self.health.retrain_cooldown_hours,
        )?;
        override_parsed(
            "ALERT_THRESHOLD_CRITICAL",
            &mut self.health.alert_threshold_critical,
        )?;
        override_parsed(
            "ALERT_THRESHOLD_WARNING",
            &mut self.health.alert_threshold_warning,
        )?;
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.stream.drift_threshold) {
            return Err(InventoryOpsError::InvalidArgument(
                "drift threshold must be a fraction in [0, 1]".to_string(),
            ));
        }
        if self.stream.batch_size == 0 {
            return Err(InventoryOpsError::InvalidArgument(
                "feedback batch size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.engine.safety_stock_pct) {
            return Err(InventoryOpsError::InvalidArgument(
                "safety stock percentage must be a fraction in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(name: &str, slot: &mut T) -> Result<()> {
    if let Ok(raw) = std::env::var(name) {
        *slot = raw.parse().map_err(|_| {
            InventoryOpsError::InvalidArgument(format!("cannot parse {}={}", name, raw))
        })?;
    }
    Ok(())
}
