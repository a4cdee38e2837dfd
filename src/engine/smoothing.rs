//! Exponential smoothing with additive trend (Holt's method).

/// Level smoothing factor.
pub const ALPHA: f64 = 0.3;
/// Trend smoothing factor.
pub const BETA: f64 = 0.1;

/// Project consumption `horizon_days` ahead from a daily history.
///
/// Empty history forecasts zero. The result is clamped non-negative; a
/// strong downward trend cannot produce a negative demand figure.
pub fn holt_forecast(history: &[f64], horizon_days: u32) -> f64 {
    let Some((&first, rest)) = history.split_first() else {
        return 0.0;
    };

    let mut level = first;
    let mut trend = 0.0;

    for &x in rest {
        let prev_level = level;
        level = ALPHA * x + (1.0 - ALPHA) * (level + trend);
        trend = BETA * (level - prev_level) + (1.0 - BETA) * trend;
    }

    (level + horizon_days as f64 * trend).max(0.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Coefficient of variation; 1.0 when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let mean = mean(values);
    if mean > 0.0 {
        std_dev(values) / mean
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_history_forecasts_level() {
        let history = vec![10.0; 7];
        assert!((holt_forecast(&history, 7) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_forecasts_zero() {
        assert_eq!(holt_forecast(&[], 7), 0.0);
    }

    #[test]
    fn test_upward_trend_extrapolates() {
        let history = vec![10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0];
        let forecast = holt_forecast(&history, 7);
        assert!(forecast > 22.0, "got {}", forecast);
    }

    #[test]
    fn test_downward_trend_clamps_at_zero() {
        let history = vec![10.0, 8.0, 6.0, 4.0, 2.0, 1.0, 0.5];
        let forecast = holt_forecast(&history, 60);
        assert!(forecast >= 0.0);
    }

    #[test]
    fn test_single_point_history() {
        assert_eq!(holt_forecast(&[5.0], 7), 5.0);
    }

    #[test]
    fn test_std_dev() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.138).abs() < 0.01);
    }

    #[test]
    fn test_cv_degenerate_mean() {
        assert_eq!(coefficient_of_variation(&[0.0, 0.0, 0.0]), 1.0);
    }
}
