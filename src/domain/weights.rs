use serde::{Deserialize, Serialize};

/// Closed set of fusion signals. Keeping this a tagged enum (rather than
/// free-form strings) lets the normalization invariant hold by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    UsageHistory,
    Population,
    MenuRotation,
    ParLevel,
    Seasonality,
}

impl SignalKind {
    pub const ALL: [SignalKind; 5] = [
        SignalKind::UsageHistory,
        SignalKind::Population,
        SignalKind::MenuRotation,
        SignalKind::ParLevel,
        SignalKind::Seasonality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::UsageHistory => "usage_history",
            SignalKind::Population => "population",
            SignalKind::MenuRotation => "menu_rotation",
            SignalKind::ParLevel => "par_level",
            SignalKind::Seasonality => "seasonality",
        }
    }
}

/// Largest change any single application may make to one weight.
pub const MAX_WEIGHT_STEP: f64 = 0.20;

/// Learned per-item fusion weights. Always sums to 1.0 (within 1e-9)
/// after construction or any update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub usage_history: f64,
    pub population: f64,
    pub menu_rotation: f64,
    pub par_level: f64,
    pub seasonality: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            usage_history: 0.40,
            population: 0.25,
            menu_rotation: 0.15,
            par_level: 0.10,
            seasonality: 0.10,
        }
    }
}

impl WeightVector {
    pub fn get(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::UsageHistory => self.usage_history,
            SignalKind::Population => self.population,
            SignalKind::MenuRotation => self.menu_rotation,
            SignalKind::ParLevel => self.par_level,
            SignalKind::Seasonality => self.seasonality,
        }
    }

    pub fn set(&mut self, kind: SignalKind, value: f64) {
        match kind {
            SignalKind::UsageHistory => self.usage_history = value,
            SignalKind::Population => self.population = value,
            SignalKind::MenuRotation => self.menu_rotation = value,
            SignalKind::ParLevel => self.par_level = value,
            SignalKind::Seasonality => self.seasonality = value,
        }
    }

    pub fn sum(&self) -> f64 {
        SignalKind::ALL.iter().map(|k| self.get(*k)).sum()
    }

    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= 1e-9
            && SignalKind::ALL
                .iter()
                .all(|k| (0.0..=1.0).contains(&self.get(*k)))
    }

    /// Scale so the vector sums to 1.0. A degenerate all-zero vector
    /// resets to the defaults.
    pub fn renormalized(&self) -> Self {
        let sum = self.sum();
        if sum <= f64::EPSILON {
            return Self::default();
        }
        let mut out = *self;
        for kind in SignalKind::ALL {
            out.set(kind, out.get(kind) / sum);
        }
        out
    }

    /// Apply a set of proposed deltas: each delta is capped to the step
    /// bound, weights are clamped to [0, 1], the vector is renormalized,
    /// and finally the whole change is scaled back if renormalization
    /// pushed any weight past the step bound.
    pub fn apply_deltas(&self, deltas: &[(SignalKind, f64)]) -> Self {
        let mut working = *self;
        for (kind, delta) in deltas {
            let delta = delta.clamp(-MAX_WEIGHT_STEP, MAX_WEIGHT_STEP);
            working.set(*kind, (working.get(*kind) + delta).clamp(0.0, 1.0));
        }

        let mut out = working.renormalized();

        let max_dev = SignalKind::ALL
            .iter()
            .map(|k| (out.get(*k) - self.get(*k)).abs())
            .fold(0.0_f64, f64::max);

        if max_dev > MAX_WEIGHT_STEP {
            // Interpolate between old and new; both sum to 1.0, so the
            // result does too and every weight stays in [0, 1].
            let scale = MAX_WEIGHT_STEP / max_dev;
            for kind in SignalKind::ALL {
                let old = self.get(kind);
                out.set(kind, old + scale * (out.get(kind) - old));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!(WeightVector::default().is_normalized());
    }

    #[test]
    fn test_menu_adjustment_keeps_sum() {
        let updated = WeightVector::default().apply_deltas(&[
            (SignalKind::MenuRotation, 0.05),
            (SignalKind::UsageHistory, -0.05),
        ]);

        assert!((updated.usage_history - 0.35).abs() < 1e-9);
        assert!((updated.menu_rotation - 0.20).abs() < 1e-9);
        assert!((updated.population - 0.25).abs() < 1e-9);
        assert!(updated.is_normalized());
    }

    #[test]
    fn test_oversized_delta_is_capped() {
        let updated =
            WeightVector::default().apply_deltas(&[(SignalKind::Population, 0.9)]);

        assert!(updated.is_normalized());
        for kind in SignalKind::ALL {
            let change = (updated.get(kind) - WeightVector::default().get(kind)).abs();
            assert!(change <= MAX_WEIGHT_STEP + 1e-9, "{:?} moved {}", kind, change);
        }
    }

    #[test]
    fn test_zero_vector_resets_to_defaults() {
        let zero = WeightVector {
            usage_history: 0.0,
            population: 0.0,
            menu_rotation: 0.0,
            par_level: 0.0,
            seasonality: 0.0,
        };
        assert_eq!(zero.renormalized(), WeightVector::default());
    }
}
