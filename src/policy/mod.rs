//! ABC classification and service-level replenishment recommendations,
//! computed on demand from the freshest completed forecast.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    AbcClass, ForecastLine, Recommendation, RecommendationStatus, Result,
};
use crate::engine::std_dev;
use crate::metrics::SharedMetrics;
use crate::storage::SharedStore;

/// Z-scores per class; the defaults encode 99 / 95 / 90 percent service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceLevels {
    pub class_a_z: f64,
    pub class_b_z: f64,
    pub class_c_z: f64,
}

impl Default for ServiceLevels {
    fn default() -> Self {
        Self {
            class_a_z: AbcClass::A.z_score(),
            class_b_z: AbcClass::B.z_score(),
            class_c_z: AbcClass::C.z_score(),
        }
    }
}

impl ServiceLevels {
    pub fn z_for(&self, class: AbcClass) -> f64 {
        match class {
            AbcClass::A => self.class_a_z,
            AbcClass::B => self.class_b_z,
            AbcClass::C => self.class_c_z,
        }
    }
}

/// Partition items by cumulative annual consumption value: A holds the
/// top 80 percent of value, B the next 15, C the tail. Returns the
/// input re-sorted by descending value with its class.
pub fn classify_abc(values: Vec<(String, Decimal)>) -> Vec<(String, Decimal, AbcClass)> {
    let total: Decimal = values.iter().map(|(_, v)| *v).sum();

    let mut sorted = values;
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    if total <= Decimal::ZERO {
        return sorted
            .into_iter()
            .map(|(code, value)| (code, value, AbcClass::C))
            .collect();
    }

    // Class by the cumulative share reached before the item: the run of
    // items covering the top 80 percent of value is A even when a
    // single item carries it all.
    let mut cumulative = Decimal::ZERO;
    sorted
        .into_iter()
        .map(|(code, value)| {
            let pct_before = cumulative / total * Decimal::ONE_HUNDRED;
            cumulative += value;
            let class = if pct_before < Decimal::from(80) {
                AbcClass::A
            } else if pct_before < Decimal::from(95) {
                AbcClass::B
            } else {
                AbcClass::C
            };
            (code, value, class)
        })
        .collect()
}

pub struct AbcEngine {
    store: SharedStore,
    metrics: SharedMetrics,
    config: EngineConfig,
}

/// Annual consumption value = predicted usage x 13 x unit cost.
const ANNUAL_VALUE_MULTIPLIER: i64 = 13;

impl AbcEngine {
    pub fn new(store: SharedStore, metrics: SharedMetrics, config: EngineConfig) -> Self {
        Self {
            store,
            metrics,
            config,
        }
    }

    /// Produce replenishment recommendations from the latest completed
    /// run, sized by class service level, and persist them `pending`.
    pub async fn generate_recommendations(
        &self,
        levels: &ServiceLevels,
    ) -> Result<Vec<Recommendation>> {
        let lines = self.store.latest_completed_lines().await?;
        if lines.is_empty() {
            debug!("no completed forecast available, nothing to recommend");
            return Ok(Vec::new());
        }

        let horizon_days = self.horizon_for(&lines).await?;

        let values: Vec<(String, Decimal)> = lines
            .iter()
            .map(|line| (line.item_code.clone(), annual_value(line)))
            .collect();
        let classified = classify_abc(values);

        let mut recommendations = Vec::new();
        for (item_code, value, class) in classified {
            let Some(line) = lines.iter().find(|l| l.item_code == item_code) else {
                continue;
            };

            if let Some(rec) = self
                .recommend_line(line, class, value, horizon_days, levels)
                .await?
            {
                self.store.insert_recommendation(&rec).await?;
                recommendations.push(rec);
            }
        }

        self.metrics.counter(
            "inventory_ops_recommendations_total",
            &[],
            recommendations.len() as u64,
        );
        info!(
            count = recommendations.len(),
            "generated replenishment recommendations"
        );
        Ok(recommendations)
    }

    async fn horizon_for(&self, lines: &[ForecastLine]) -> Result<u32> {
        let run_id = lines[0].run_id;
        Ok(self
            .store
            .get_run(run_id)
            .await?
            .map(|r| r.horizon_days)
            .unwrap_or(self.config.default_horizon_days)
            .max(1))
    }

    async fn recommend_line(
        &self,
        line: &ForecastLine,
        class: AbcClass,
        annual_value: Decimal,
        horizon_days: u32,
        levels: &ServiceLevels,
    ) -> Result<Option<Recommendation>> {
        let history = self
            .store
            .query_history(
                &line.item_code,
                line.forecast_for_date,
                self.config.usage_history_days,
            )
            .await?;
        let daily: Vec<f64> = history.iter().map(|p| p.qty).collect();

        let horizon = horizon_days as f64;
        let sqrt_horizon = horizon.sqrt();

        // 5th/95th quantile approximations around the forecast mean,
        // then back out the daily demand deviation
        let sigma_horizon = std_dev(&daily) * sqrt_horizon;
        let p05 = (line.predicted_usage - 1.65 * sigma_horizon).max(0.0);
        let p95 = line.predicted_usage + 1.65 * sigma_horizon;
        let sigma_daily = (p95 - p05) / (2.0 * 1.65 * sqrt_horizon);

        let lead_time = line.lead_time_days as f64;
        let sigma_lead_time = (lead_time * sigma_daily.powi(2)).sqrt();
        let safety = levels.z_for(class) * sigma_lead_time;

        let daily_demand = line.predicted_usage / horizon;
        let reorder_point = daily_demand * lead_time + safety;

        if line.current_stock >= reorder_point {
            return Ok(None);
        }

        let qty = (line.predicted_usage + safety - line.current_stock)
            .max(0.0)
            .ceil() as u64;
        if qty == 0 {
            return Ok(None);
        }

        let gap = reorder_point - line.current_stock;
        Ok(Some(Recommendation {
            recommendation_id: Uuid::new_v4(),
            item_code: line.item_code.clone(),
            class,
            annual_value,
            recommended_qty: qty,
            reorder_point,
            safety_stock: safety,
            current_stock: line.current_stock,
            reason: format!(
                "stock {:.1} sits {:.1} below class-{} reorder point {:.1}",
                line.current_stock,
                gap,
                class.as_str(),
                reorder_point
            ),
            status: RecommendationStatus::Pending,
            created_at: Utc::now(),
        }))
    }
}

fn annual_value(line: &ForecastLine) -> Decimal {
    let unit_cost = line.unit_cost.unwrap_or(Decimal::ZERO);
    let usage = Decimal::try_from(line.predicted_usage).unwrap_or(Decimal::ZERO);
    usage * Decimal::from(ANNUAL_VALUE_MULTIPLIER) * unit_cost
}
