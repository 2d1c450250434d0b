//! Tap and swipe state machine
//!
//! A press is a pointer-down/pointer-up pair. Releasing a press that moved past the swipe
//! threshold yields a swipe immediately; any other release becomes a pending tap that is
//! emitted once the settle delay elapses. Scrolling during the press or the settle period
//! suppresses the tap.

use crate::config::TapConfig;
use crate::types::{AxisDelta, EventMetrics, ScrollDirection, SwipeMetrics, TapMetrics};

#[derive(Debug, Clone, PartialEq)]
struct Press {
    down_time: i64,
    displacement: AxisDelta,
    scrolled: bool,
}

/// Result of a pointer-up
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// Emit this swipe now
    Swipe(SwipeMetrics),
    /// A tap is pending until the settle delay elapses
    TapPending,
    /// The press scrolled; nothing is emitted
    Suppressed,
    /// Pointer-up without a matching pointer-down
    Unmatched,
}

#[derive(Debug)]
pub struct TapMachine {
    config: TapConfig,
    press: Option<Press>,
    pending: Option<TapMetrics>,
}

impl TapMachine {
    pub fn new(config: TapConfig) -> Self {
        Self {
            config,
            press: None,
            pending: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending tap ahead of its settle deadline
    pub fn take_pending(&mut self) -> Option<TapMetrics> {
        self.pending.take()
    }

    pub fn on_down(&mut self, t: i64) {
        if let Some(previous) = &self.press {
            tracing::debug!(down_time = previous.down_time, "press replaced without release");
        }
        self.press = Some(Press {
            down_time: t,
            displacement: AxisDelta::default(),
            scrolled: false,
        });
    }

    pub fn on_move(&mut self, delta: AxisDelta) {
        if let Some(press) = &mut self.press {
            press.displacement.dx += delta.dx;
            press.displacement.dy += delta.dy;
        }
    }

    /// A scroll sample arrived. Returns true if a pending tap was discarded.
    pub fn on_scroll(&mut self) -> bool {
        if let Some(press) = &mut self.press {
            press.scrolled = true;
        }
        self.pending.take().is_some()
    }

    pub fn on_up(&mut self, t: i64) -> Release {
        let Some(press) = self.press.take() else {
            return Release::Unmatched;
        };
        if press.scrolled {
            return Release::Suppressed;
        }
        if let Some(swipe) = self.swipe(&press, t) {
            return Release::Swipe(swipe);
        }
        self.pending = Some(self.tap(&press, t));
        Release::TapPending
    }

    /// Settle delay elapsed
    pub fn settle(&mut self) -> Option<TapMetrics> {
        self.pending.take()
    }

    /// Force out the pending tap or the open press, releasing it at `now`
    pub fn flush(&mut self, now: i64) -> Option<EventMetrics> {
        if let Some(tap) = self.pending.take() {
            self.press = None;
            return Some(EventMetrics::Tap(tap));
        }
        let press = self.press.take()?;
        if press.scrolled {
            return None;
        }
        let up = now.max(press.down_time);
        match self.swipe(&press, up) {
            Some(swipe) => Some(EventMetrics::Swipe(swipe)),
            None => Some(EventMetrics::Tap(self.tap(&press, up))),
        }
    }

    fn tap(&self, press: &Press, up: i64) -> TapMetrics {
        let duration = (up - press.down_time).max(0);
        TapMetrics {
            tap_duration_ms: duration as u64,
            long_press: duration >= self.config.long_press_threshold_ms,
        }
    }

    fn swipe(&self, press: &Press, up: i64) -> Option<SwipeMetrics> {
        let AxisDelta { dx, dy } = press.displacement;
        let qualifies = if self.config.horizontal_swipes_only {
            dx.abs() > self.config.swipe_min_distance_px
        } else {
            press.displacement.magnitude() > self.config.swipe_min_distance_px
        };
        if !qualifies {
            return None;
        }

        let direction = if self.config.horizontal_swipes_only || dx.abs() >= dy.abs() {
            if dx > 0.0 {
                ScrollDirection::Right
            } else {
                ScrollDirection::Left
            }
        } else if dy > 0.0 {
            ScrollDirection::Down
        } else {
            ScrollDirection::Up
        };

        let distance_px = press.displacement.magnitude();
        let duration_ms = (up - press.down_time).max(0);
        let duration_s = duration_ms as f64 / 1000.0;
        let velocity = if duration_ms > 0 {
            distance_px / duration_s
        } else {
            0.0
        };
        let acceleration = if duration_ms > 100 {
            velocity / duration_s
        } else {
            0.0
        };

        Some(SwipeMetrics {
            direction,
            distance_px,
            duration_ms: duration_ms as u64,
            velocity,
            acceleration,
        })
    }
}
