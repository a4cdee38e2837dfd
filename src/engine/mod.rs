//! Forecasting engine: Holt smoothing, signal fusion, confidence
//! calibration, order policy, and the run lifecycle.

mod confidence;
mod policy;
mod runner;
mod smoothing;

pub use confidence::{confidence_score, CONFIDENCE_CEILING, CONFIDENCE_FLOOR};
pub use policy::{order_quantity, OrderDecision};
pub use runner::{fuse_prediction, ForecastEngine, RunReport, RunRequest};
pub use smoothing::{
    coefficient_of_variation, holt_forecast, mean, std_dev, ALPHA, BETA,
};
