//! Behavioral baseline management
//!
//! Keeps rolling averages of the scored outputs per window kind, so that each snapshot can
//! be read relative to the user's recent history.

use crate::types::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default baseline window in snapshots
pub const DEFAULT_BASELINE_WINDOW: usize = 20;

/// Rolling averages for one window kind
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Baselines {
    pub distraction_baseline: Option<f64>,
    pub focus_baseline: Option<f64>,
    pub burstiness_baseline: Option<f64>,
    pub intensity_baseline: Option<f64>,
    pub snapshots_in_baseline: u32,
}

/// A feature vector read against the baseline that preceded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualFeatures {
    pub features: FeatureVector,
    /// Baselines including this snapshot
    pub baselines: Baselines,
    pub distraction_deviation_pct: Option<f64>,
    pub focus_deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WindowHistory {
    distraction_values: VecDeque<f64>,
    focus_values: VecDeque<f64>,
    burstiness_values: VecDeque<f64>,
    intensity_values: VecDeque<f64>,
}

impl WindowHistory {
    fn push(&mut self, features: &FeatureVector, window_size: usize) {
        for (queue, value) in [
            (&mut self.distraction_values, features.distraction_score),
            (&mut self.focus_values, features.focus_hint),
            (&mut self.burstiness_values, features.burstiness),
            (&mut self.intensity_values, features.interaction_intensity),
        ] {
            queue.push_back(value);
            while queue.len() > window_size {
                queue.pop_front();
            }
        }
    }

    fn baselines(&self) -> Baselines {
        Baselines {
            distraction_baseline: rolling_average(&self.distraction_values),
            focus_baseline: rolling_average(&self.focus_values),
            burstiness_baseline: rolling_average(&self.burstiness_values),
            intensity_baseline: rolling_average(&self.intensity_values),
            snapshots_in_baseline: self.distraction_values.len() as u32,
        }
    }
}

/// Baseline store for all window kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStore {
    windows: BTreeMap<String, WindowHistory>,
    /// Maximum number of snapshots per window kind
    window_size: usize,
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

impl BaselineStore {
    pub fn new(window_size: usize) -> Self {
        Self {
            windows: BTreeMap::new(),
            window_size: window_size.max(1),
        }
    }

    /// Compare `features` with the current baseline of its window kind, then fold it in
    pub fn update_and_contextualize(&mut self, features: FeatureVector) -> ContextualFeatures {
        let history = self
            .windows
            .entry(features.window_kind.clone())
            .or_default();

        let previous = history.baselines();
        let distraction_deviation_pct =
            calculate_deviation(features.distraction_score, previous.distraction_baseline);
        let focus_deviation_pct = calculate_deviation(features.focus_hint, previous.focus_baseline);

        history.push(&features, self.window_size);
        let baselines = history.baselines();

        ContextualFeatures {
            features,
            baselines,
            distraction_deviation_pct,
            focus_deviation_pct,
        }
    }

    /// Current baselines of one window kind
    pub fn baselines(&self, window_kind: &str) -> Baselines {
        self.windows
            .get(window_kind)
            .map(WindowHistory::baselines)
            .unwrap_or_default()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn snapshot_count(&self, window_kind: &str) -> usize {
        self.windows
            .get(window_kind)
            .map_or(0, |h| h.distraction_values.len())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}

/// Deviation from baseline as a percentage
fn calculate_deviation(current: f64, baseline: Option<f64>) -> Option<f64> {
    match baseline {
        Some(base) if base > 0.0 => Some(((current - base) / base) * 100.0),
        Some(_) if current > 0.0 => Some(100.0), // From 0 to something
        Some(_) => Some(0.0),
        None => None,
    }
}

fn rolling_average(queue: &VecDeque<f64>) -> Option<f64> {
    if queue.is_empty() {
        return None;
    }
    Some(queue.iter().sum::<f64>() / queue.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(kind: &str, distraction: f64) -> FeatureVector {
        let mut vector = FeatureVector::zeroed(kind, 30_000, 0);
        vector.distraction_score = distraction;
        vector.focus_hint = 1.0 - 0.8 * distraction;
        vector.burstiness = 0.5;
        vector.interaction_intensity = 0.4;
        vector
    }

    #[test]
    fn test_rolling_window() {
        let mut store = BaselineStore::new(3);
        for d in [0.2, 0.3, 0.4, 0.5, 0.6] {
            store.update_and_contextualize(features("short", d));
        }

        let baselines = store.baselines("short");
        // Only 0.4, 0.5, 0.6 remain
        assert!((baselines.distraction_baseline.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(baselines.snapshots_in_baseline, 3);
        assert_eq!(store.snapshot_count("short"), 3);
    }

    #[test]
    fn test_deviation_against_previous_baseline() {
        let mut store = BaselineStore::default();
        let first = store.update_and_contextualize(features("short", 0.3));
        assert!(first.distraction_deviation_pct.is_none());

        for _ in 0..4 {
            store.update_and_contextualize(features("short", 0.3));
        }
        let contextual = store.update_and_contextualize(features("short", 0.36));
        let expected = (0.36 - 0.3) / 0.3 * 100.0;
        assert!((contextual.distraction_deviation_pct.unwrap() - expected).abs() < 1e-6);
        assert_eq!(contextual.baselines.snapshots_in_baseline, 6);
    }

    #[test]
    fn test_window_kinds_are_independent() {
        let mut store = BaselineStore::default();
        store.update_and_contextualize(features("short", 0.9));
        store.update_and_contextualize(features("long", 0.1));

        assert!((store.baselines("short").distraction_baseline.unwrap() - 0.9).abs() < 1e-12);
        assert!((store.baselines("long").distraction_baseline.unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(store.baselines("hourly"), Baselines::default());
    }

    #[test]
    fn test_zero_baseline_deviation() {
        assert_eq!(calculate_deviation(0.0, Some(0.0)), Some(0.0));
        assert_eq!(calculate_deviation(0.2, Some(0.0)), Some(100.0));
        assert_eq!(calculate_deviation(0.2, None), None);
    }

    #[test]
    fn test_serialization_and_clear() {
        let mut store = BaselineStore::new(10);
        store.update_and_contextualize(features("short", 0.35));

        let json = store.to_json().unwrap();
        let mut loaded = BaselineStore::from_json(&json).unwrap();
        assert_eq!(loaded.baselines("short"), store.baselines("short"));

        loaded.clear();
        assert_eq!(loaded.snapshot_count("short"), 0);
    }
}
