//! Signal providers feeding the forecasting engine. Every provider
//! tolerates an empty result set and falls back to its documented
//! default instead of failing the run.

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Item, Result, UsagePoint};
use crate::storage::SharedStore;

/// Everything the engine needs about one item for one forecast date.
#[derive(Debug, Clone)]
pub struct SignalBundle {
    /// Reconciled daily consumption, oldest first; missing days omitted
    pub history: Vec<UsagePoint>,
    /// `total_population / baseline`; 1.0 when population is unknown
    pub population_factor: f64,
    /// Boost when the item appears in a scheduled recipe inside the horizon
    pub menu_factor: f64,
    /// Par level from the item master; 0 when none configured
    pub par_level: f64,
    /// Extension hook; any non-negative scalar, currently always 1.0
    pub seasonality_factor: f64,
}

impl SignalBundle {
    pub fn history_values(&self) -> Vec<f64> {
        self.history.iter().map(|p| p.qty).collect()
    }
}

pub struct SignalGatherer {
    store: SharedStore,
    config: EngineConfig,
}

impl SignalGatherer {
    pub fn new(store: SharedStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub async fn gather(
        &self,
        item: &Item,
        forecast_date: NaiveDate,
        horizon_days: u32,
    ) -> Result<SignalBundle> {
        let history = self
            .store
            .query_history(&item.code, forecast_date, self.config.usage_history_days)
            .await?;

        let population_factor = self.population_factor(forecast_date).await?;
        let menu_factor = self
            .menu_factor(&item.code, forecast_date, horizon_days)
            .await?;

        Ok(SignalBundle {
            history,
            population_factor,
            menu_factor,
            par_level: item.par_level.max(0.0),
            seasonality_factor: 1.0,
        })
    }

    async fn population_factor(&self, date: NaiveDate) -> Result<f64> {
        match self.store.query_population(date).await? {
            Some(total) if total > 0.0 && self.config.population_baseline > 0.0 => {
                Ok(total / self.config.population_baseline)
            }
            Some(_) | None => {
                debug!(%date, "population unavailable, defaulting factor to 1.0");
                Ok(1.0)
            }
        }
    }

    async fn menu_factor(
        &self,
        item_code: &str,
        forecast_date: NaiveDate,
        horizon_days: u32,
    ) -> Result<f64> {
        let to = forecast_date + Duration::days(horizon_days as i64);
        let occurrences = self
            .store
            .query_menu_occurrences(item_code, forecast_date, to)
            .await?;

        Ok(if occurrences > 0 {
            self.config.menu_rotation_boost
        } else {
            1.0
        })
    }
}
