//! Engine configuration
//!
//! Every threshold the classifier, aggregator and feature engine use lives here so that
//! hosts can tune them without touching the pipeline. Each section falls back to its
//! defaults when omitted from the JSON document.

use crate::error::BehaviorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Number of inputs the scoring function consumes
pub const SCORING_INPUTS: usize = 12;

/// Name of the default short window
pub const SHORT_WINDOW: &str = "short";

/// Name of the default long window
pub const LONG_WINDOW: &str = "long";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rolling windows fed by the classified event stream
    pub windows: Vec<WindowConfig>,
    pub scroll: ScrollConfig,
    pub tap: TapConfig,
    pub typing: TypingConfig,
    pub clipboard: ClipboardConfig,
    pub features: FeatureConfig,
    pub scoring: ScoringConfig,
    pub baseline: BaselineConfig,
    pub log: LogConfig,
}

/// One rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub kind: String,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Quiet period after the last sample before the gesture is finalized
    pub stop_debounce_ms: i64,
    /// Grace period after finalization during which a new sample continues the gesture
    pub continuation_window_ms: i64,
    /// Deltas with a smaller magnitude fall back to position-based direction
    pub negligible_delta: f64,
    /// Upper bound for reported velocity (px/s)
    pub max_velocity: f64,
    /// Upper bound for reported acceleration (px/s²)
    pub max_acceleration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Delay after pointer-up before a tap is emitted
    pub settle_delay_ms: i64,
    pub long_press_threshold_ms: i64,
    /// Displacement a press must exceed to become a swipe candidate
    pub swipe_min_distance_px: f64,
    /// Only horizontal drags qualify as swipes
    pub horizontal_swipes_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Length increases of at least this many characters are pastes
    pub paste_threshold_chars: i64,
    /// Inter-key latencies above this count as gaps
    pub gap_threshold_ms: i64,
    /// Per-latency cap used for the activity ratio
    pub activity_cap_ms: i64,
    /// Taps per second mapped to a normalized speed of 1.0
    pub max_typing_speed: f64,
    pub deep_typing_min_duration_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Identical detections within this interval are duplicates
    pub debounce_ms: i64,
    /// Minimum time a selection must be held before clearing it counts as a copy
    pub copy_min_dwell_ms: i64,
}

/// Normalization constants for window features. Rates are per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub max_tap_rate: f64,
    pub max_keystroke_rate: f64,
    pub max_switch_rate: f64,
    pub max_notification_rate: f64,
    pub max_notification_open_rate: f64,
    pub max_scroll_velocity: f64,
    /// Inter-event gaps above this contribute to idle time
    pub idle_threshold_ms: i64,
    /// Inter-event gaps above this count as interruptions
    pub interruption_gap_ms: i64,
    pub max_interruptions_per_minute: f64,
}

/// Weights of the default linear scoring function, in input order:
/// tap, key, scroll, idle, switch, burstiness, fragmentation, notification rate,
/// notification open rate, notification score, typing stability, scroll stability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Number of snapshots kept per window kind
    pub window_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                WindowConfig {
                    kind: SHORT_WINDOW.to_string(),
                    duration_ms: 30_000,
                },
                WindowConfig {
                    kind: LONG_WINDOW.to_string(),
                    duration_ms: 300_000,
                },
            ],
            scroll: ScrollConfig::default(),
            tap: TapConfig::default(),
            typing: TypingConfig::default(),
            clipboard: ClipboardConfig::default(),
            features: FeatureConfig::default(),
            scoring: ScoringConfig::default(),
            baseline: BaselineConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            stop_debounce_ms: 200,
            continuation_window_ms: 600,
            negligible_delta: 0.5,
            max_velocity: 10_000.0,
            max_acceleration: 100_000.0,
        }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            long_press_threshold_ms: 500,
            swipe_min_distance_px: 50.0,
            horizontal_swipes_only: false,
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            paste_threshold_chars: 2,
            gap_threshold_ms: 5_000,
            activity_cap_ms: 2_000,
            max_typing_speed: 10.0,
            deep_typing_min_duration_s: 60.0,
        }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            copy_min_dwell_ms: 300,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_tap_rate: 5.0,
            max_keystroke_rate: 10.0,
            max_switch_rate: 0.1,
            max_notification_rate: 0.1,
            max_notification_open_rate: 0.05,
            max_scroll_velocity: 3_000.0,
            idle_threshold_ms: 5_000,
            interruption_gap_ms: 30_000,
            max_interruptions_per_minute: 4.0,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: vec![
                0.05, -0.10, 0.10, 0.10, 0.20, 0.15, 0.20, 0.10, 0.10, 0.10, -0.10, -0.05,
            ],
            bias: 0.0,
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self { window_size: 20 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, BehaviorError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| BehaviorError::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, BehaviorError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Load from a file if present and valid, otherwise return the defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config rejected; using defaults");
                Self::default()
            }
        }
    }

    /// Duration of a configured window
    pub fn window_duration_ms(&self, kind: &str) -> Option<i64> {
        self.windows
            .iter()
            .find(|w| w.kind == kind)
            .map(|w| w.duration_ms)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), BehaviorError> {
        if self.windows.is_empty() {
            return Err(BehaviorError::ConfigError(
                "at least one window must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for window in &self.windows {
            if window.duration_ms <= 0 {
                return Err(BehaviorError::ConfigError(format!(
                    "window `{}` must have a positive duration",
                    window.kind
                )));
            }
            if !seen.insert(window.kind.as_str()) {
                return Err(BehaviorError::ConfigError(format!(
                    "duplicate window kind `{}`",
                    window.kind
                )));
            }
        }

        if self.scroll.stop_debounce_ms <= 0 {
            return Err(BehaviorError::ConfigError(
                "scroll.stop_debounce_ms must be positive".to_string(),
            ));
        }
        if self.scroll.continuation_window_ms < 0 || self.tap.settle_delay_ms < 0 {
            return Err(BehaviorError::ConfigError(
                "grace and settle delays cannot be negative".to_string(),
            ));
        }
        if self.typing.paste_threshold_chars < 2 {
            return Err(BehaviorError::ConfigError(
                "typing.paste_threshold_chars must be at least 2".to_string(),
            ));
        }

        let maxima = [
            ("features.max_tap_rate", self.features.max_tap_rate),
            ("features.max_keystroke_rate", self.features.max_keystroke_rate),
            ("features.max_switch_rate", self.features.max_switch_rate),
            ("features.max_notification_rate", self.features.max_notification_rate),
            (
                "features.max_notification_open_rate",
                self.features.max_notification_open_rate,
            ),
            ("features.max_scroll_velocity", self.features.max_scroll_velocity),
            (
                "features.max_interruptions_per_minute",
                self.features.max_interruptions_per_minute,
            ),
            ("typing.max_typing_speed", self.typing.max_typing_speed),
            (
                "typing.deep_typing_min_duration_s",
                self.typing.deep_typing_min_duration_s,
            ),
            ("scroll.max_velocity", self.scroll.max_velocity),
            ("scroll.max_acceleration", self.scroll.max_acceleration),
        ];
        for (name, value) in maxima {
            if !(value.is_finite() && value > 0.0) {
                return Err(BehaviorError::ConfigError(format!("{name} must be positive")));
            }
        }

        let swipe_distance = self.tap.swipe_min_distance_px;
        if !(swipe_distance.is_finite() && swipe_distance >= 0.0) {
            return Err(BehaviorError::ConfigError(
                "tap.swipe_min_distance_px must be a non-negative number".to_string(),
            ));
        }

        if self.scoring.weights.len() != SCORING_INPUTS {
            return Err(BehaviorError::ConfigError(format!(
                "scoring.weights must have {SCORING_INPUTS} entries, got {}",
                self.scoring.weights.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_duration_ms(SHORT_WINDOW), Some(30_000));
        assert_eq!(config.window_duration_ms(LONG_WINDOW), Some(300_000));
        assert_eq!(config.window_duration_ms("hourly"), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(
            r#"{
                "windows": [{ "kind": "minute", "duration_ms": 60000 }],
                "scroll": { "stop_debounce_ms": 250 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.windows.len(), 1);
        assert_eq!(config.scroll.stop_debounce_ms, 250);
        assert_eq!(config.scroll.continuation_window_ms, 600);
        assert_eq!(config.tap.long_press_threshold_ms, 500);
    }

    #[test]
    fn test_rejects_duplicate_windows() {
        let mut config = EngineConfig::default();
        config.windows[1].kind = SHORT_WINDOW.to_string();
        assert!(matches!(
            config.validate(),
            Err(BehaviorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_weight_arity() {
        let mut config = EngineConfig::default();
        config.scoring.weights.pop();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let result = EngineConfig::from_json(r#"{ "windows": [{ "kind": "x", "duration_ms": 0 }] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_negative_scroll_limits() {
        let velocity = EngineConfig::from_json(r#"{ "scroll": { "max_velocity": -1.0 } }"#);
        assert!(velocity.is_err());

        let mut config = EngineConfig::default();
        config.scroll.max_acceleration = -5.0;
        assert!(matches!(
            config.validate(),
            Err(BehaviorError::ConfigError(message)) if message.contains("scroll.max_acceleration")
        ));
    }

    #[test]
    fn test_rejects_bad_swipe_and_deep_typing_thresholds() {
        let mut config = EngineConfig::default();
        config.tap.swipe_min_distance_px = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.typing.deep_typing_min_duration_s = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.tap.swipe_min_distance_px = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = EngineConfig::load_or_default(Path::new("/nonexistent/behavior.json"));
        assert_eq!(config, EngineConfig::default());
    }
}
