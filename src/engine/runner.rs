//! Forecast run lifecycle: signal fusion, line construction, and the
//! running -> completed | failed state machine.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    ForecastLine, ForecastRun, InventoryOpsError, Item, OrderStatus, Result,
    RunStats, RunStatus, SignalContributions, WeightVector,
};
use crate::metrics::SharedMetrics;
use crate::pricing::PriceResolver;
use crate::signals::{SignalBundle, SignalGatherer};
use crate::storage::SharedStore;

use super::confidence::confidence_score;
use super::policy::order_quantity;
use super::smoothing::holt_forecast;

#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Caller-supplied id makes the run idempotent; generated otherwise
    pub run_id: Option<Uuid>,
    pub horizon_days: u32,
    pub tenant: String,
    pub location: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub items_forecasted: u64,
    pub items_skipped: u64,
    pub avg_confidence: f64,
    pub total_predicted_value: Decimal,
    pub duration_ms: u64,
    pub shadow_mode: bool,
}

impl RunReport {
    fn from_run(run: &ForecastRun) -> Self {
        Self {
            run_id: run.run_id,
            items_forecasted: run.stats.items_forecasted,
            items_skipped: run.stats.items_skipped,
            avg_confidence: run.stats.avg_confidence,
            total_predicted_value: run.stats.total_predicted_value,
            duration_ms: run.stats.duration_ms,
            shadow_mode: run.shadow,
        }
    }
}

/// Fuse the smoothed base prediction with the multiplier signals.
///
/// The par-level weight is reserved for the order policy, so the fused
/// value normalizes over the participating weights; with all factors at
/// 1.0 the prediction equals the base.
pub fn fuse_prediction(
    base: f64,
    weights: &WeightVector,
    signals: &SignalBundle,
) -> (f64, SignalContributions) {
    let participating = weights.usage_history
        + weights.population
        + weights.menu_rotation
        + weights.seasonality;

    if participating <= f64::EPSILON {
        return (base, SignalContributions::default());
    }

    let usage = weights.usage_history * base;
    let population = weights.population * signals.population_factor * base;
    let menu = weights.menu_rotation * signals.menu_factor * base;
    let seasonality = weights.seasonality * signals.seasonality_factor * base;

    let prediction = ((usage + population + menu + seasonality) / participating).max(0.0);

    let contributions = SignalContributions {
        usage_history: usage / participating,
        population: population / participating,
        menu_rotation: menu / participating,
        seasonality: seasonality / participating,
    };

    (prediction, contributions)
}

pub struct ForecastEngine {
    store: SharedStore,
    signals: SignalGatherer,
    resolver: PriceResolver,
    metrics: SharedMetrics,
    config: EngineConfig,
}

impl ForecastEngine {
    pub fn new(store: SharedStore, metrics: SharedMetrics, config: EngineConfig) -> Self {
        Self {
            signals: SignalGatherer::new(store.clone(), config.clone()),
            resolver: PriceResolver::new(store.clone()),
            store,
            metrics,
            config,
        }
    }

    /// Execute a forecast run over every active item.
    ///
    /// Items fail individually without failing the run; only an
    /// unreachable dependency marks the whole run `failed`. Re-invoking
    /// with the same run id returns the stored result.
    pub async fn generate(&self, request: RunRequest) -> Result<RunReport> {
        if let Some(run_id) = request.run_id {
            if let Some(existing) = self.store.get_run(run_id).await? {
                info!(run_id = %run_id, "run already exists, returning stored result");
                return Ok(RunReport::from_run(&existing));
            }
        }

        let run_id = request.run_id.unwrap_or_else(Uuid::new_v4);
        let forecast_date = Utc::now().date_naive();
        let started = Instant::now();

        let run = ForecastRun::new(
            run_id,
            forecast_date,
            request.horizon_days,
            self.config.model_version.clone(),
            request.tenant.clone(),
            request.location.clone(),
            request.actor.clone(),
            self.config.shadow_mode,
        );
        self.store.insert_forecast_run(&run).await?;

        match self
            .forecast_all_items(&run, forecast_date, request.horizon_days, started)
            .await
        {
            Ok(stats) => {
                let report_stats = stats.clone();
                self.store
                    .update_run_status(run_id, RunStatus::Completed, Some(stats), None)
                    .await?;

                self.metrics.counter(
                    "inventory_ops_forecast_runs_total",
                    &[("status", "completed".to_string())],
                    1,
                );
                self.metrics.histogram(
                    "inventory_ops_forecast_run_duration_ms",
                    report_stats.duration_ms as f64,
                );

                info!(
                    run_id = %run_id,
                    items = report_stats.items_forecasted,
                    skipped = report_stats.items_skipped,
                    avg_confidence = report_stats.avg_confidence,
                    "forecast run completed"
                );

                Ok(RunReport {
                    run_id,
                    items_forecasted: report_stats.items_forecasted,
                    items_skipped: report_stats.items_skipped,
                    avg_confidence: report_stats.avg_confidence,
                    total_predicted_value: report_stats.total_predicted_value,
                    duration_ms: report_stats.duration_ms,
                    shadow_mode: self.config.shadow_mode,
                })
            }
            Err(err) => {
                error!(run_id = %run_id, error = %err, "forecast run failed");
                self.store
                    .update_run_status(
                        run_id,
                        RunStatus::Failed,
                        None,
                        Some(err.to_string()),
                    )
                    .await?;
                self.metrics.counter(
                    "inventory_ops_forecast_runs_total",
                    &[("status", "failed".to_string())],
                    1,
                );
                Err(err)
            }
        }
    }

    async fn forecast_all_items(
        &self,
        run: &ForecastRun,
        forecast_date: NaiveDate,
        horizon_days: u32,
        started: Instant,
    ) -> Result<RunStats> {
        let items = self.store.query_items().await?;

        let mut forecasted = 0u64;
        let mut skipped = 0u64;
        let mut confidence_sum = 0.0;
        let mut total_value = Decimal::ZERO;

        // Items run sequentially to keep write amplification predictable.
        for item in items.iter().filter(|i| i.active) {
            match self
                .forecast_item(run, item, forecast_date, horizon_days)
                .await
            {
                Ok(line) => {
                    self.store.insert_forecast_line(&line).await?;
                    forecasted += 1;
                    confidence_sum += line.confidence;
                    total_value += line.predicted_value;
                }
                Err(err) if err.is_infrastructure() => return Err(err),
                Err(err) => {
                    warn!(item = %item.code, error = %err, "skipping item");
                    self.metrics.counter(
                        "inventory_ops_forecast_items_skipped_total",
                        &[],
                        1,
                    );
                    skipped += 1;
                }
            }
        }

        Ok(RunStats {
            items_forecasted: forecasted,
            items_skipped: skipped,
            avg_confidence: if forecasted > 0 {
                confidence_sum / forecasted as f64
            } else {
                0.0
            },
            total_predicted_value: total_value,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn forecast_item(
        &self,
        run: &ForecastRun,
        item: &Item,
        forecast_date: NaiveDate,
        horizon_days: u32,
    ) -> Result<ForecastLine> {
        let signals = self.signals.gather(item, forecast_date, horizon_days).await?;
        let history = signals.history_values();

        let base = holt_forecast(&history, horizon_days);
        let weights = self
            .store
            .load_weights(&item.code)
            .await?
            .unwrap_or_default();

        let (predicted_usage, contributions) = fuse_prediction(base, &weights, &signals);
        let confidence = confidence_score(&history);

        let lead_time_days = item
            .lead_time_days
            .unwrap_or(self.config.default_lead_time_days);
        let decision = order_quantity(
            predicted_usage,
            item.current_stock,
            signals.par_level,
            lead_time_days,
            self.config.safety_stock_pct,
        );

        let (unit_cost, predicted_value) = match self
            .resolver
            .effective_price(&run.tenant, &item.code, forecast_date)
            .await
        {
            Ok(resolved) => {
                let value = resolved.price
                    * Decimal::try_from(predicted_usage).unwrap_or(Decimal::ZERO);
                (Some(resolved.price), value)
            }
            Err(InventoryOpsError::NoPriceFound { .. }) => (None, Decimal::ZERO),
            Err(other) => return Err(other),
        };

        Ok(ForecastLine {
            line_id: Uuid::new_v4(),
            run_id: run.run_id,
            item_code: item.code.clone(),
            category: item.category.clone(),
            unit: item.unit.clone(),
            storage_location: item.storage_location.clone(),
            predicted_usage,
            confidence,
            contributions,
            weights,
            recommended_order_qty: decision.order_qty,
            order_reason: decision.reason,
            reorder_point: decision.reorder_point,
            safety_stock: decision.safety_stock,
            lead_time_days,
            par_level: signals.par_level,
            current_stock: item.current_stock,
            order_status: OrderStatus::Pending,
            adjusted_qty: None,
            adjustment_reason: None,
            forecast_for_date: forecast_date + Duration::days(horizon_days as i64),
            unit_cost,
            predicted_value,
            actual_usage: None,
            variance: None,
            variance_pct: None,
            created_at: Utc::now(),
        })
    }
}
