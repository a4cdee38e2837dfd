//! Per-item rolling MAPE windows and drift detection.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

/// Rolling error window for one item, derived state rebuilt from
/// persisted feedback on process start.
#[derive(Debug, Clone, Default)]
pub struct DriftCacheEntry {
    window: VecDeque<f64>,
    pub last_trigger: Option<DateTime<Utc>>,
    pub drift_count: u64,
}

impl DriftCacheEntry {
    pub fn mean_mape_pct(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn samples(&self) -> usize {
        self.window.len()
    }
}

/// What the detector decided about one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftDecision {
    /// Not enough samples or error within tolerance
    None,
    /// Drift detected; a retrain should be requested
    Triggered { mean_mape_pct: f64 },
    /// Drift persists but the item triggered less than the cool-down ago
    CoolingDown,
}

#[derive(Debug)]
pub struct DriftCache {
    entries: HashMap<String, DriftCacheEntry>,
    window_size: usize,
    min_samples: usize,
    threshold_pct: f64,
    cooldown: Duration,
}

impl DriftCache {
    pub fn new(
        window_size: usize,
        min_samples: usize,
        threshold_pct: f64,
        cooldown_secs: u64,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            window_size,
            min_samples,
            threshold_pct,
            cooldown: Duration::seconds(cooldown_secs as i64),
        }
    }

    /// Record an error observation and decide whether it constitutes a
    /// new drift trigger. Oldest samples fall out once the window fills.
    pub fn observe(&mut self, item_code: &str, mape_pct: f64, now: DateTime<Utc>) -> DriftDecision {
        let window_size = self.window_size;
        let min_samples = self.min_samples;
        let threshold_pct = self.threshold_pct;
        let cooldown = self.cooldown;
        let entry = self.entries.entry(item_code.to_string()).or_default();

        entry.window.push_back(mape_pct);
        while entry.window.len() > window_size {
            entry.window.pop_front();
        }

        if entry.window.len() < min_samples {
            return DriftDecision::None;
        }

        let mean = entry.mean_mape_pct();
        if mean <= threshold_pct {
            return DriftDecision::None;
        }

        match entry.last_trigger {
            Some(last) if now - last <= cooldown => DriftDecision::CoolingDown,
            _ => {
                entry.last_trigger = Some(now);
                entry.drift_count += 1;
                DriftDecision::Triggered { mean_mape_pct: mean }
            }
        }
    }

    /// Seed a window without running detection, for restart rebuilds.
    pub fn preload(&mut self, item_code: &str, mape_pcts: &[f64]) {
        let window_size = self.window_size;
        let entry = self.entries.entry(item_code.to_string()).or_default();
        for &mape in mape_pcts {
            entry.window.push_back(mape);
            while entry.window.len() > window_size {
                entry.window.pop_front();
            }
        }
    }

    pub fn entry(&self, item_code: &str) -> Option<&DriftCacheEntry> {
        self.entries.get(item_code)
    }

    pub fn tracked_items(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
