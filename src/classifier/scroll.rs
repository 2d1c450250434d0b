//! Scroll gesture state machine
//!
//! `Idle → Tracking → FinalizedContinuable → {Tracking | Idle}`. The stop timer moves a
//! tracked gesture to `FinalizedContinuable`; a sample arriving before the grace timer
//! expires resumes the same gesture, otherwise grace expiry releases its summary.

use crate::config::ScrollConfig;
use crate::types::{ScrollDirection, ScrollMetrics};

/// Transient state of one scroll gesture
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollGesture {
    start_time: i64,
    start_position: f64,
    first_position: Option<f64>,
    last_position: Option<f64>,
    last_valid_nonzero_position: Option<f64>,
    end_position: Option<f64>,
    last_sample_time: i64,
    direction: Option<ScrollDirection>,
    has_direction_reversal: bool,
    last_finalized_time: Option<i64>,
    sample_count: u32,
}

/// Finalized gesture, the source of a `scroll` event
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollSummary {
    pub start_time: i64,
    pub end_time: i64,
    pub start_position: f64,
    pub end_position: f64,
    pub distance: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub direction: ScrollDirection,
    pub direction_reversal: bool,
    pub sample_count: u32,
}

impl ScrollSummary {
    pub fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            velocity: self.velocity,
            acceleration: self.acceleration,
            direction: self.direction,
            direction_reversal: self.direction_reversal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum ScrollState {
    #[default]
    Idle,
    Tracking(ScrollGesture),
    FinalizedContinuable(ScrollGesture),
}

#[derive(Debug)]
pub struct ScrollMachine {
    config: ScrollConfig,
    state: ScrollState,
}

impl ScrollMachine {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            state: ScrollState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ScrollState::Idle)
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, ScrollState::Tracking(_))
    }

    pub fn is_continuable(&self) -> bool {
        matches!(self.state, ScrollState::FinalizedContinuable(_))
    }

    /// Feed one sample. Starts, continues or resumes a gesture.
    pub fn on_sample(&mut self, t: i64, position: f64, delta: f64) {
        let state = std::mem::take(&mut self.state);
        let gesture = match state {
            ScrollState::Idle => self.start(t, position, delta),
            ScrollState::Tracking(mut gesture) => {
                self.update(&mut gesture, t, position, delta);
                gesture
            }
            ScrollState::FinalizedContinuable(mut gesture) => {
                tracing::debug!(
                    gap_ms = t - gesture.last_finalized_time.unwrap_or(t),
                    "scroll gesture continued"
                );
                self.update(&mut gesture, t, position, delta);
                gesture
            }
        };
        self.state = ScrollState::Tracking(gesture);
    }

    /// Stop timer elapsed. Returns true if a gesture became continuable.
    pub fn stop(&mut self, at: i64) -> bool {
        match std::mem::take(&mut self.state) {
            ScrollState::Tracking(mut gesture) => {
                gesture.last_finalized_time = Some(at);
                self.state = ScrollState::FinalizedContinuable(gesture);
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Grace timer elapsed: release the finalized gesture
    pub fn expire(&mut self) -> Option<ScrollSummary> {
        match std::mem::take(&mut self.state) {
            ScrollState::FinalizedContinuable(gesture) => Some(self.summarize(&gesture)),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Finalize whatever gesture is in flight
    pub fn flush(&mut self) -> Option<ScrollSummary> {
        match std::mem::take(&mut self.state) {
            ScrollState::Idle => None,
            ScrollState::Tracking(gesture) | ScrollState::FinalizedContinuable(gesture) => {
                Some(self.summarize(&gesture))
            }
        }
    }

    fn start(&self, t: i64, position: f64, delta: f64) -> ScrollGesture {
        let moved = delta.abs() >= self.config.negligible_delta;
        ScrollGesture {
            start_time: t,
            start_position: position - delta,
            first_position: Some(position),
            last_position: Some(position),
            last_valid_nonzero_position: (moved && position != 0.0).then_some(position),
            end_position: moved.then_some(position),
            last_sample_time: t,
            direction: moved.then(|| direction_of(delta)),
            has_direction_reversal: false,
            last_finalized_time: None,
            sample_count: 1,
        }
    }

    fn update(&self, gesture: &mut ScrollGesture, t: i64, position: f64, delta: f64) {
        let moved = delta.abs() >= self.config.negligible_delta;
        let direction = if moved {
            Some(direction_of(delta))
        } else {
            let previous = gesture.last_position.unwrap_or(gesture.start_position);
            let diff = position - previous;
            (diff != 0.0).then(|| direction_of(diff))
        };

        if let Some(direction) = direction {
            if gesture.direction.is_some_and(|d| d != direction) {
                gesture.has_direction_reversal = true;
            }
            gesture.direction = Some(direction);
        }

        if moved {
            gesture.end_position = Some(position);
            if position != 0.0 {
                gesture.last_valid_nonzero_position = Some(position);
            }
        }
        gesture.last_position = Some(position);
        gesture.last_sample_time = t;
        gesture.sample_count += 1;
    }

    fn summarize(&self, gesture: &ScrollGesture) -> ScrollSummary {
        let end_position = gesture
            .end_position
            .or(gesture.last_valid_nonzero_position)
            .or(gesture.last_position)
            .or(gesture.first_position)
            .unwrap_or(gesture.start_position);
        let distance = (end_position - gesture.start_position).abs();

        let elapsed_ms = gesture.last_sample_time - gesture.start_time;
        let (velocity, acceleration) = if elapsed_ms < 1 {
            (0.0, 0.0)
        } else {
            let elapsed_s = elapsed_ms as f64 / 1000.0;
            let velocity = distance / elapsed_s;
            let acceleration = if elapsed_ms > 100 {
                2.0 * distance / (elapsed_s * elapsed_s)
            } else {
                0.0
            };
            (velocity, acceleration)
        };

        let direction = gesture.direction.unwrap_or_else(|| {
            if end_position < gesture.start_position {
                ScrollDirection::Up
            } else {
                ScrollDirection::Down
            }
        });

        let summary = ScrollSummary {
            start_time: gesture.start_time,
            end_time: gesture.last_sample_time,
            start_position: gesture.start_position,
            end_position,
            distance,
            velocity: velocity.clamp(0.0, self.config.max_velocity),
            acceleration: acceleration.clamp(0.0, self.config.max_acceleration),
            direction,
            direction_reversal: gesture.has_direction_reversal,
            sample_count: gesture.sample_count,
        };
        tracing::debug!(
            distance = summary.distance,
            velocity = summary.velocity,
            samples = summary.sample_count,
            reversal = summary.direction_reversal,
            "scroll gesture finalized"
        );
        summary
    }
}

fn direction_of(delta: f64) -> ScrollDirection {
    if delta > 0.0 {
        ScrollDirection::Down
    } else {
        ScrollDirection::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ScrollMachine {
        ScrollMachine::new(ScrollConfig::default())
    }

    #[test]
    fn test_unidirectional_gesture() {
        let mut scroll = machine();
        scroll.on_sample(0, 100.0, 20.0);
        scroll.on_sample(100, 140.0, 40.0);
        scroll.on_sample(200, 200.0, 60.0);
        assert!(scroll.is_tracking());

        let summary = scroll.flush().unwrap();
        assert_eq!(summary.start_position, 80.0);
        assert_eq!(summary.end_position, 200.0);
        assert_eq!(summary.distance, 120.0);
        assert_eq!(summary.direction, ScrollDirection::Down);
        assert!(!summary.direction_reversal);
        // 120px over 0.2s
        assert!((summary.velocity - 600.0).abs() < 1e-9);
        assert!((summary.acceleration - 6_000.0).abs() < 1e-6);
        assert!(scroll.is_idle());
    }

    #[test]
    fn test_reversal_is_sticky() {
        let mut scroll = machine();
        scroll.on_sample(0, 100.0, 20.0);
        scroll.on_sample(50, 80.0, -20.0);
        scroll.on_sample(100, 120.0, 40.0);

        let summary = scroll.flush().unwrap();
        assert!(summary.direction_reversal);
        assert_eq!(summary.direction, ScrollDirection::Down);
    }

    #[test]
    fn test_negligible_delta_uses_position() {
        let mut scroll = machine();
        scroll.on_sample(0, 100.0, 10.0);
        // Delta too small to trust, but position moved back
        scroll.on_sample(50, 90.0, 0.1);

        let summary = scroll.flush().unwrap();
        assert!(summary.direction_reversal);
        assert_eq!(summary.direction, ScrollDirection::Up);
        // End position only tracks samples with real movement
        assert_eq!(summary.end_position, 100.0);
    }

    #[test]
    fn test_continuation_keeps_start_and_reversal() {
        let mut scroll = machine();
        scroll.on_sample(0, 100.0, 20.0);
        scroll.on_sample(50, 90.0, -10.0);
        assert!(scroll.stop(250));
        assert!(scroll.is_continuable());

        scroll.on_sample(400, 150.0, 60.0);
        assert!(scroll.is_tracking());
        assert!(scroll.stop(600));

        let summary = scroll.expire().unwrap();
        assert_eq!(summary.start_position, 80.0);
        assert_eq!(summary.start_time, 0);
        assert_eq!(summary.distance, 70.0);
        assert!(summary.direction_reversal);
        assert_eq!(summary.sample_count, 3);
    }

    #[test]
    fn test_single_sample_has_zero_kinematics() {
        let mut scroll = machine();
        scroll.on_sample(10, 50.0, 50.0);
        scroll.stop(210);
        let summary = scroll.expire().unwrap();
        assert_eq!(summary.distance, 50.0);
        assert_eq!(summary.velocity, 0.0);
        assert_eq!(summary.acceleration, 0.0);
    }

    #[test]
    fn test_short_gesture_has_no_acceleration() {
        let mut scroll = machine();
        scroll.on_sample(0, 10.0, 10.0);
        scroll.on_sample(80, 50.0, 40.0);
        let summary = scroll.flush().unwrap();
        assert!(summary.velocity > 0.0);
        assert_eq!(summary.acceleration, 0.0);
    }

    #[test]
    fn test_velocity_is_clamped() {
        let mut scroll = ScrollMachine::new(ScrollConfig {
            max_velocity: 1_000.0,
            ..ScrollConfig::default()
        });
        scroll.on_sample(0, 0.0, 0.0);
        scroll.on_sample(10, 5_000.0, 5_000.0);
        let summary = scroll.flush().unwrap();
        assert_eq!(summary.velocity, 1_000.0);
    }

    #[test]
    fn test_expire_and_stop_outside_gesture() {
        let mut scroll = machine();
        assert!(!scroll.stop(100));
        assert!(scroll.expire().is_none());
        assert!(scroll.flush().is_none());

        scroll.on_sample(0, 10.0, 10.0);
        // Still tracking: grace expiry has nothing to release
        assert!(scroll.expire().is_none());
        assert!(scroll.is_tracking());
    }
}
