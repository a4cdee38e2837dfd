use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::run::ForecastLine;

/// Accuracy of forecasts over a period, judged against reconciled
/// actuals. A forecast is "accurate" when its variance landed within
/// ten percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyRecord {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_evaluated: u64,
    pub accurate_count: u64,
    pub accuracy_pct: f64,
    pub avg_variance_pct: f64,
    pub by_category: Vec<CategoryAccuracy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAccuracy {
    pub category: String,
    pub total_evaluated: u64,
    pub accurate_count: u64,
    pub accuracy_pct: f64,
}

impl AccuracyRecord {
    /// Fold evaluated forecast lines into an accuracy record. Lines
    /// without a recorded actual are ignored.
    pub fn from_lines(
        period_start: NaiveDate,
        period_end: NaiveDate,
        lines: &[ForecastLine],
    ) -> Self {
        let evaluated: Vec<&ForecastLine> =
            lines.iter().filter(|l| l.variance_pct.is_some()).collect();

        let total = evaluated.len() as u64;
        let accurate = evaluated
            .iter()
            .filter(|l| l.is_accurate() == Some(true))
            .count() as u64;

        let avg_variance_pct = if evaluated.is_empty() {
            0.0
        } else {
            evaluated
                .iter()
                .filter_map(|l| l.variance_pct)
                .map(f64::abs)
                .sum::<f64>()
                / evaluated.len() as f64
        };

        let mut per_category: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for line in &evaluated {
            let slot = per_category.entry(line.category.clone()).or_default();
            slot.0 += 1;
            if line.is_accurate() == Some(true) {
                slot.1 += 1;
            }
        }

        let by_category = per_category
            .into_iter()
            .map(|(category, (total, accurate))| CategoryAccuracy {
                category,
                total_evaluated: total,
                accurate_count: accurate,
                accuracy_pct: pct(accurate, total),
            })
            .collect();

        Self {
            period_start,
            period_end,
            total_evaluated: total,
            accurate_count: accurate,
            accuracy_pct: pct(accurate, total),
            avg_variance_pct,
            by_category,
        }
    }
}

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
