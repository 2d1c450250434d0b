//! Window feature derivation
//!
//! Computes the normalized feature vector for the contents of one rolling window and
//! feeds it to the scoring strategy. Every feature lies in `[0, 1]`; an empty window
//! yields the all-zero vector.

use crate::config::FeatureConfig;
use crate::scoring::{score_or_default, Scorer};
use crate::types::{BehaviorEvent, BehaviorEventKind, FeatureVector, InterruptionAction};

/// Feature deriver for one engine configuration
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    config: FeatureConfig,
}

impl FeatureDeriver {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Derive features for `events`, the ordered contents of a window of `duration_ms`
    pub fn derive(
        &self,
        window_kind: &str,
        duration_ms: i64,
        events: &[BehaviorEvent],
        computed_at_ms: i64,
        scorer: &dyn Scorer,
    ) -> FeatureVector {
        let mut vector = FeatureVector::zeroed(window_kind, duration_ms, computed_at_ms);
        if events.is_empty() {
            return vector;
        }
        let cfg = &self.config;
        let duration_s = duration_ms as f64 / 1000.0;

        let count = |kind: BehaviorEventKind| events.iter().filter(|e| e.kind == kind).count();
        let keystrokes: u64 = events
            .iter()
            .filter_map(BehaviorEvent::typing)
            .map(|t| u64::from(t.typing_tap_count))
            .sum();
        let opened = events
            .iter()
            .filter(|e| e.kind == BehaviorEventKind::Notification)
            .filter_map(BehaviorEvent::interruption)
            .filter(|m| m.action == InterruptionAction::Opened)
            .count();

        let gaps = inter_event_gaps(events);

        vector.event_count = u32::try_from(events.len()).unwrap_or(u32::MAX);
        vector.tap_rate_norm =
            compute_rate_norm(count(BehaviorEventKind::Tap) as f64, duration_s, cfg.max_tap_rate);
        vector.keystroke_rate_norm =
            compute_rate_norm(keystrokes as f64, duration_s, cfg.max_keystroke_rate);
        vector.switch_rate_norm = compute_rate_norm(
            count(BehaviorEventKind::AppSwitch) as f64,
            duration_s,
            cfg.max_switch_rate,
        );
        vector.notification_rate_norm = compute_rate_norm(
            count(BehaviorEventKind::Notification) as f64,
            duration_s,
            cfg.max_notification_rate,
        );
        vector.notification_open_rate_norm =
            compute_rate_norm(opened as f64, duration_s, cfg.max_notification_open_rate);
        vector.scroll_velocity_norm = compute_scroll_velocity_norm(events, cfg.max_scroll_velocity);
        vector.idle_ratio = compute_idle_ratio(&gaps, cfg.idle_threshold_ms, duration_ms);
        vector.burstiness = compute_burstiness(&gaps);
        vector.session_fragmentation = compute_session_fragmentation(
            count(BehaviorEventKind::Notification) + count(BehaviorEventKind::Call),
            &gaps,
            cfg.interruption_gap_ms,
            duration_ms,
            cfg.max_interruptions_per_minute,
        );
        vector.typing_cadence_stability = compute_typing_cadence_stability(events);
        vector.scroll_cadence_stability = compute_scroll_cadence_stability(events);
        vector.notification_score = (0.6 * vector.notification_rate_norm
            + 0.4 * vector.notification_open_rate_norm)
            .clamp(0.0, 1.0);
        vector.interaction_intensity = compute_interaction_intensity(
            vector.tap_rate_norm,
            vector.keystroke_rate_norm,
            vector.scroll_velocity_norm,
            vector.idle_ratio,
        );

        let (distraction, focus) = score_or_default(scorer, &vector.scoring_inputs());
        vector.distraction_score = distraction;
        vector.focus_hint = focus;
        vector
    }
}

fn inter_event_gaps(events: &[BehaviorEvent]) -> Vec<f64> {
    events
        .windows(2)
        .map(|pair| (pair[1].timestamp_ms - pair[0].timestamp_ms).max(0) as f64)
        .collect()
}

/// Events per second relative to a saturation rate: `min(1, count / duration_s / max_rate)`
fn compute_rate_norm(count: f64, duration_s: f64, max_rate: f64) -> f64 {
    if duration_s <= 0.0 || max_rate <= 0.0 {
        return 0.0;
    }
    (count / duration_s / max_rate).clamp(0.0, 1.0)
}

/// Mean of the positive scroll velocities over the saturation velocity
fn compute_scroll_velocity_norm(events: &[BehaviorEvent], max_velocity: f64) -> f64 {
    let velocities: Vec<f64> = events
        .iter()
        .filter_map(BehaviorEvent::scroll)
        .map(|s| s.velocity)
        .filter(|v| *v > 0.0)
        .collect();
    if velocities.is_empty() || max_velocity <= 0.0 {
        return 0.0;
    }
    let mean = velocities.iter().sum::<f64>() / velocities.len() as f64;
    (mean / max_velocity).clamp(0.0, 1.0)
}

/// Share of the window spent idle: gap time beyond the idle threshold
fn compute_idle_ratio(gaps: &[f64], idle_threshold_ms: i64, duration_ms: i64) -> f64 {
    if duration_ms <= 0 {
        return 0.0;
    }
    let threshold = idle_threshold_ms as f64;
    let idle: f64 = gaps
        .iter()
        .filter(|g| **g > threshold)
        .map(|g| g - threshold)
        .sum();
    (idle / duration_ms as f64).clamp(0.0, 1.0)
}

/// Compute burstiness using the Barabási formula
///
/// Formula: `((σ - μ) / (σ + μ) + 1) / 2` with the population σ of the inter-event gaps.
/// 0.0 = perfectly regular, 1.0 = very bursty. No gaps yields 0.0.
fn compute_burstiness(gaps: &[f64]) -> f64 {
    if gaps.is_empty() {
        return 0.0;
    }
    let n = gaps.len() as f64;
    let mean = gaps.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let std_dev = (gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n).sqrt();
    let barabasi = (std_dev - mean) / (std_dev + mean);
    ((barabasi + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Interruptions per minute relative to the saturation rate
///
/// Interruptions are notification and call events plus gaps longer than `interruption_gap_ms`.
fn compute_session_fragmentation(
    interruption_events: usize,
    gaps: &[f64],
    interruption_gap_ms: i64,
    duration_ms: i64,
    max_per_minute: f64,
) -> f64 {
    let window_minutes = duration_ms as f64 / 60_000.0;
    let capacity = window_minutes * max_per_minute;
    if capacity <= 0.0 {
        return 0.0;
    }
    let long_gaps = gaps
        .iter()
        .filter(|g| **g > interruption_gap_ms as f64)
        .count();
    ((interruption_events + long_gaps) as f64 / capacity).clamp(0.0, 1.0)
}

/// `exp(-CV)` of the inter-key latencies pooled across the window's typing sessions
///
/// Each session contributes `typing_tap_count - 1` latencies with its mean and sample
/// deviation; the pooled population variance combines within- and between-session spread.
fn compute_typing_cadence_stability(events: &[BehaviorEvent]) -> f64 {
    let sessions: Vec<(f64, f64, f64)> = events
        .iter()
        .filter_map(BehaviorEvent::typing)
        .filter(|t| t.typing_tap_count > 1)
        .map(|t| {
            (
                f64::from(t.typing_tap_count - 1),
                t.mean_inter_tap_interval_ms,
                t.typing_cadence_variability,
            )
        })
        .collect();

    let total: f64 = sessions.iter().map(|(n, _, _)| n).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let pooled_mean = sessions.iter().map(|(n, m, _)| n * m).sum::<f64>() / total;
    if pooled_mean <= 0.0 {
        return 0.0;
    }
    let pooled_variance = sessions
        .iter()
        .map(|(n, m, s)| (n - 1.0) * s * s + n * (m - pooled_mean).powi(2))
        .sum::<f64>()
        / total;
    stability_from_cv(pooled_variance.max(0.0).sqrt() / pooled_mean)
}

/// `exp(-CV)` of the intervals between consecutive scroll events; needs two intervals
fn compute_scroll_cadence_stability(events: &[BehaviorEvent]) -> f64 {
    let timestamps: Vec<i64> = events
        .iter()
        .filter(|e| e.kind == BehaviorEventKind::Scroll)
        .map(|e| e.timestamp_ms)
        .collect();
    let intervals: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(0) as f64)
        .collect();
    if intervals.len() < 2 {
        return 0.0;
    }
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let std_dev = (intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n).sqrt();
    stability_from_cv(std_dev / mean)
}

fn stability_from_cv(cv: f64) -> f64 {
    if cv.is_finite() {
        (-cv).exp().clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Logistic blend of activity against idleness
///
/// Formula: `sigmoid(5 · (0.3·tap + 0.3·key + 0.2·scroll − 0.2·idle))`
fn compute_interaction_intensity(tap: f64, key: f64, scroll: f64, idle: f64) -> f64 {
    let x = 5.0 * (0.3 * tap + 0.3 * key + 0.2 * scroll - 0.2 * idle);
    (1.0 / (1.0 + (-x).exp())).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::LinearScorer;
    use crate::types::{
        AppSwitchMetrics, EventMetrics, InterruptionMetrics, ScrollDirection, ScrollMetrics,
        TapMetrics, TypingMetrics,
    };
    use pretty_assertions::assert_eq;

    fn tap(t: i64) -> BehaviorEvent {
        BehaviorEvent::new(
            "s",
            t,
            EventMetrics::Tap(TapMetrics {
                tap_duration_ms: 60,
                long_press: false,
            }),
        )
    }

    fn scroll(t: i64, velocity: f64) -> BehaviorEvent {
        BehaviorEvent::new(
            "s",
            t,
            EventMetrics::Scroll(ScrollMetrics {
                velocity,
                acceleration: 0.0,
                direction: ScrollDirection::Down,
                direction_reversal: false,
            }),
        )
    }

    fn notification(t: i64, action: InterruptionAction) -> BehaviorEvent {
        BehaviorEvent::new(
            "s",
            t,
            EventMetrics::Notification(InterruptionMetrics { action }),
        )
    }

    fn typing(t: i64, taps: u32, mean: f64, variability: f64) -> BehaviorEvent {
        BehaviorEvent::new(
            "s",
            t,
            EventMetrics::Typing(TypingMetrics {
                typing_tap_count: taps,
                typing_speed: 2.0,
                mean_inter_tap_interval_ms: mean,
                typing_cadence_variability: variability,
                typing_cadence_stability: 0.5,
                typing_gap_count: 0,
                typing_gap_ratio: 0.0,
                typing_burstiness: 0.2,
                typing_activity_ratio: 0.5,
                typing_interaction_intensity: 0.5,
                duration: 10,
                start_at: "1970-01-01T00:00:00.000Z".to_string(),
                end_at: "1970-01-01T00:00:10.000Z".to_string(),
                deep_typing: false,
                backspace_count: 0,
                number_of_copy: 0,
                number_of_paste: 0,
                number_of_cut: 0,
            }),
        )
    }

    fn derive(events: &[BehaviorEvent], duration_ms: i64) -> FeatureVector {
        FeatureDeriver::new(FeatureConfig::default()).derive(
            "short",
            duration_ms,
            events,
            1_000,
            &LinearScorer::default(),
        )
    }

    #[test]
    fn test_empty_window_is_zero() {
        let vector = derive(&[], 30_000);
        assert_eq!(vector, FeatureVector::zeroed("short", 30_000, 1_000));
    }

    #[test]
    fn test_tap_rate_in_one_second_window() {
        let events: Vec<_> = [0, 200, 400, 600, 800].into_iter().map(tap).collect();
        let vector = derive(&events, 1_000);

        // 5 taps/s against a saturation of 5 taps/s
        assert_eq!(vector.tap_rate_norm, 1.0);
        assert_eq!(vector.event_count, 5);
        assert!(events.iter().all(|e| !e.tap().unwrap().long_press));
        // Perfectly regular taps
        assert_eq!(vector.burstiness, 0.0);
        assert_eq!(vector.idle_ratio, 0.0);
    }

    #[test]
    fn test_rate_below_saturation() {
        let events: Vec<_> = [0, 1_000, 2_000].into_iter().map(tap).collect();
        let vector = derive(&events, 30_000);
        // 3 taps / 30s / 5
        assert!((vector.tap_rate_norm - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let events = vec![
            tap(0),
            scroll(1_000, 1_200.0),
            notification(2_000, InterruptionAction::Opened),
            typing(9_000, 8, 250.0, 40.0),
            scroll(12_000, 800.0),
        ];
        assert_eq!(derive(&events, 30_000), derive(&events, 30_000));
    }

    #[test]
    fn test_all_features_bounded() {
        let mut events = Vec::new();
        for i in 0..40 {
            events.push(tap(i * 10));
            events.push(notification(i * 10 + 5, InterruptionAction::Opened));
        }
        events.push(scroll(500, 50_000.0));
        events.push(typing(600, 500, 10.0, 500.0));
        events.push(BehaviorEvent::new(
            "s",
            100_000,
            EventMetrics::AppSwitch(AppSwitchMetrics {}),
        ));

        let vector = derive(&events, 1_000);
        for (name, value) in vector.named_values() {
            assert!((0.0..=1.0).contains(&value), "{name} = {value}");
        }
        assert!(vector.notification_score > 0.999);
    }

    #[test]
    fn test_idle_and_fragmentation() {
        let events = vec![tap(0), tap(40_000), tap(41_000)];
        let vector = derive(&events, 60_000);

        // (40000 - 5000) / 60000
        assert!((vector.idle_ratio - 35.0 / 60.0).abs() < 1e-12);
        // one long gap over 1 minute * 4 per minute
        assert!((vector.session_fragmentation - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_burstiness() {
        assert_eq!(compute_burstiness(&[]), 0.0);
        assert_eq!(compute_burstiness(&[0.0, 0.0]), 0.0);

        let regular = [10.0, 10.0, 10.0, 10.0];
        assert_eq!(compute_burstiness(&regular), 0.0);

        let bursty = [1.0, 1.0, 100.0, 1.0, 1.0, 100.0];
        assert!(compute_burstiness(&bursty) > 0.5);
    }

    #[test]
    fn test_scroll_cadence_needs_two_intervals() {
        let two = vec![scroll(0, 100.0), scroll(1_000, 100.0)];
        assert_eq!(derive(&two, 30_000).scroll_cadence_stability, 0.0);

        let regular = vec![scroll(0, 100.0), scroll(1_000, 100.0), scroll(2_000, 100.0)];
        assert_eq!(derive(&regular, 30_000).scroll_cadence_stability, 1.0);
    }

    #[test]
    fn test_typing_cadence_pooled() {
        // Identical sessions pool to the per-session CV
        let events = vec![typing(0, 5, 200.0, 50.0), typing(5_000, 5, 200.0, 50.0)];
        let vector = derive(&events, 30_000);

        // pooled variance: 2 * (3 * 2500) / 8
        let expected = (-(1875.0f64.sqrt() / 200.0)).exp();
        assert!((vector.typing_cadence_stability - expected).abs() < 1e-12);

        // Single-keystroke sessions carry no latencies
        let single = vec![typing(0, 1, 0.0, 0.0)];
        assert_eq!(derive(&single, 30_000).typing_cadence_stability, 0.0);
    }

    #[test]
    fn test_scroll_velocity_norm() {
        let events = vec![scroll(0, 1_500.0), scroll(1_000, 0.0), scroll(2_000, 4_500.0)];
        let vector = derive(&events, 30_000);
        // mean of positive velocities 3000 over 3000
        assert_eq!(vector.scroll_velocity_norm, 1.0);
    }

    #[test]
    fn test_interaction_intensity() {
        assert_eq!(compute_interaction_intensity(0.0, 0.0, 0.0, 0.0), 0.5);
        assert!(compute_interaction_intensity(1.0, 1.0, 1.0, 0.0) > 0.9);
        assert!(compute_interaction_intensity(0.0, 0.0, 0.0, 1.0) < 0.5);
    }

    #[test]
    fn test_scores_attached() {
        let events = vec![
            notification(0, InterruptionAction::Opened),
            notification(1_000, InterruptionAction::Ignored),
        ];
        let vector = derive(&events, 30_000);
        assert!(vector.distraction_score > 0.0);
        assert!(
            (vector.focus_hint - (1.0 - 0.8 * vector.distraction_score)).abs() < 1e-12
        );
    }
}
