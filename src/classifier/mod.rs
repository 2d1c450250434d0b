//! Gesture classification
//!
//! Turns the ordered stream of normalized events into typed behavior events. Each gesture
//! kind has its own state machine; this module routes events to them, drives their
//! deferred transitions through a [`TimerQueue`] and stamps the emitted events.
//!
//! All transitions run to completion on the caller's thread. Due timers always fire before
//! the event that made them due is applied.

pub mod clipboard;
pub mod scroll;
pub mod tap;
pub mod timer;
pub mod typing;

pub use clipboard::ClipboardMachine;
pub use scroll::{ScrollMachine, ScrollSummary};
pub use tap::{Release, TapMachine};
pub use timer::{TimerHandle, TimerKind, TimerQueue};
pub use typing::TypingMachine;

use crate::config::EngineConfig;
use crate::types::{
    AppSwitchMetrics, BehaviorEvent, ClipboardAction, ClipboardMetrics, EventMetrics,
    InterruptionMetrics, NormalizedEvent,
};

/// Classifier for one tracked surface
#[derive(Debug)]
pub struct GestureClassifier {
    session_id: String,
    timers: TimerQueue,
    scroll: ScrollMachine,
    tap: TapMachine,
    typing: TypingMachine,
    clipboard: ClipboardMachine,
    stop_debounce_ms: i64,
    continuation_window_ms: i64,
    settle_delay_ms: i64,
    paste_threshold_chars: i64,
    last_emitted_ms: Option<i64>,
}

impl GestureClassifier {
    pub fn new(session_id: &str, config: &EngineConfig) -> Self {
        Self {
            session_id: session_id.to_string(),
            timers: TimerQueue::new(),
            scroll: ScrollMachine::new(config.scroll.clone()),
            tap: TapMachine::new(config.tap.clone()),
            typing: TypingMachine::new(config.typing.clone()),
            clipboard: ClipboardMachine::new(config.clipboard.clone()),
            stop_debounce_ms: config.scroll.stop_debounce_ms,
            continuation_window_ms: config.scroll.continuation_window_ms,
            settle_delay_ms: config.tap.settle_delay_ms,
            paste_threshold_chars: config.typing.paste_threshold_chars,
            last_emitted_ms: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Events emitted after this call belong to `session_id`
    pub fn set_session_id(&mut self, session_id: &str) {
        self.session_id = session_id.to_string();
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn scroll(&self) -> &ScrollMachine {
        &self.scroll
    }

    pub fn is_typing(&self) -> bool {
        self.typing.is_active()
    }

    /// Apply one normalized event, appending whatever it completes to `out`
    pub fn handle(&mut self, event: NormalizedEvent, out: &mut Vec<BehaviorEvent>) {
        let t = event.timestamp_ms();
        self.advance_to(t, out);

        match event {
            NormalizedEvent::PointerDown { t } => {
                if let Some(tap) = self.tap.take_pending() {
                    self.timers.cancel(TimerKind::TapSettle);
                    self.emit(t, EventMetrics::Tap(tap), out);
                }
                self.tap.on_down(t);
            }
            NormalizedEvent::PointerMove { axis_delta, .. } => self.tap.on_move(axis_delta),
            NormalizedEvent::PointerUp { t } => match self.tap.on_up(t) {
                Release::Swipe(swipe) => self.emit(t, EventMetrics::Swipe(swipe), out),
                Release::TapPending => {
                    self.timers
                        .schedule(TimerKind::TapSettle, t.saturating_add(self.settle_delay_ms));
                }
                Release::Suppressed => {
                    tracing::trace!(t, "tap suppressed by scroll");
                }
                Release::Unmatched => {
                    tracing::debug!(t, "pointer up without pointer down ignored");
                }
            },
            NormalizedEvent::ScrollSample { t, position, delta } => {
                if self.tap.on_scroll() {
                    self.timers.cancel(TimerKind::TapSettle);
                }
                self.scroll.on_sample(t, position, delta);
                self.timers.cancel(TimerKind::ScrollGrace);
                self.timers
                    .schedule(TimerKind::ScrollStop, t.saturating_add(self.stop_debounce_ms));
            }
            NormalizedEvent::FocusGained { t } => {
                if let Some(metrics) = self.typing.begin(t) {
                    self.emit(t, EventMetrics::Typing(metrics), out);
                }
                self.clipboard.reset_field();
            }
            NormalizedEvent::FocusLost { t } => {
                if let Some(metrics) = self.typing.end(t) {
                    self.emit(t, EventMetrics::Typing(metrics), out);
                }
            }
            NormalizedEvent::TextLengthDelta {
                t,
                delta,
                had_active_selection,
            } => self.on_text_length_delta(t, delta, had_active_selection, out),
            NormalizedEvent::SelectionCleared {
                t,
                held_duration_ms,
            } => {
                if let Some(action) = self.clipboard.on_selection_cleared(t, held_duration_ms) {
                    self.emit_clipboard(t, action, out);
                }
            }
            NormalizedEvent::Notification { t, action } => {
                self.emit(t, EventMetrics::Notification(InterruptionMetrics { action }), out)
            }
            NormalizedEvent::Call { t, action } => {
                self.emit(t, EventMetrics::Call(InterruptionMetrics { action }), out)
            }
            NormalizedEvent::AppSwitch { t } => {
                self.emit(t, EventMetrics::AppSwitch(AppSwitchMetrics {}), out)
            }
        }
    }

    /// Forget the emission high-water mark after the stream's ordering was reset
    pub fn reset(&mut self) {
        self.last_emitted_ms = None;
    }

    /// Fire every timer due at or before `now_ms`
    pub fn advance_to(&mut self, now_ms: i64, out: &mut Vec<BehaviorEvent>) {
        while let Some((handle, at)) = self.timers.pop_due(now_ms) {
            self.on_timer(handle.kind, at, out);
        }
    }

    /// Fire one scheduled timer. Returns false for a stale handle.
    pub fn fire(&mut self, handle: TimerHandle, out: &mut Vec<BehaviorEvent>) -> bool {
        match self.timers.take(handle) {
            Some(at) => {
                self.on_timer(handle.kind, at, out);
                true
            }
            None => false,
        }
    }

    /// Force-finalize every gesture in flight at `now_ms`
    pub fn flush(&mut self, now_ms: i64, out: &mut Vec<BehaviorEvent>) {
        self.advance_to(now_ms, out);
        self.timers.cancel_all();

        if let Some(metrics) = self.tap.flush(now_ms) {
            self.emit(now_ms, metrics, out);
        }
        if let Some(summary) = self.scroll.flush() {
            self.emit(now_ms, EventMetrics::Scroll(summary.metrics()), out);
        }
        if let Some(metrics) = self.typing.end(now_ms) {
            self.emit(now_ms, EventMetrics::Typing(metrics), out);
        }
    }

    fn on_timer(&mut self, kind: TimerKind, at: i64, out: &mut Vec<BehaviorEvent>) {
        match kind {
            TimerKind::ScrollStop => {
                if self.scroll.stop(at) {
                    self.timers.schedule(
                        TimerKind::ScrollGrace,
                        at.saturating_add(self.continuation_window_ms),
                    );
                }
            }
            TimerKind::ScrollGrace => {
                if let Some(summary) = self.scroll.expire() {
                    self.emit(at, EventMetrics::Scroll(summary.metrics()), out);
                }
            }
            TimerKind::TapSettle => {
                if let Some(tap) = self.tap.settle() {
                    self.emit(at, EventMetrics::Tap(tap), out);
                }
            }
        }
    }

    fn on_text_length_delta(
        &mut self,
        t: i64,
        delta: i64,
        had_active_selection: bool,
        out: &mut Vec<BehaviorEvent>,
    ) {
        let detected =
            self.clipboard
                .on_length_change(t, delta, had_active_selection, self.paste_threshold_chars);

        if delta >= self.paste_threshold_chars {
            // Pastes never count as keystrokes, duplicates are dropped entirely
            if let Some(action) = detected {
                self.emit_clipboard(t, action, out);
            }
        } else if delta > 0 {
            self.typing.keystroke(t);
        } else if had_active_selection {
            if let Some(action) = detected {
                self.emit_clipboard(t, action, out);
            }
        } else {
            self.typing.backspace(-delta);
        }
    }

    fn emit_clipboard(
        &mut self,
        t: i64,
        action: ClipboardAction,
        out: &mut Vec<BehaviorEvent>,
    ) {
        self.typing.clipboard(action, t);
        self.emit(t, EventMetrics::Clipboard(ClipboardMetrics { action }), out);
    }

    fn emit(&mut self, at: i64, metrics: EventMetrics, out: &mut Vec<BehaviorEvent>) {
        let timestamp_ms = self.last_emitted_ms.map_or(at, |last| at.max(last));
        self.last_emitted_ms = Some(timestamp_ms);
        out.push(BehaviorEvent::new(&self.session_id, timestamp_ms, metrics));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AxisDelta, BehaviorEventKind, InterruptionAction, ScrollDirection};
    use pretty_assertions::assert_eq;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new("session-1", &EngineConfig::default())
    }

    fn run(classifier: &mut GestureClassifier, events: &[NormalizedEvent]) -> Vec<BehaviorEvent> {
        let mut out = Vec::new();
        for event in events {
            classifier.handle(*event, &mut out);
        }
        out
    }

    fn sample(t: i64, position: f64, delta: f64) -> NormalizedEvent {
        NormalizedEvent::ScrollSample { t, position, delta }
    }

    fn kinds(events: &[BehaviorEvent]) -> Vec<BehaviorEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_unidirectional_scroll_emits_once() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                sample(0, 100.0, 20.0),
                sample(50, 130.0, 30.0),
                sample(100, 170.0, 40.0),
                sample(150, 200.0, 30.0),
            ],
        );
        assert!(out.is_empty());

        // Stop at 350, grace expires at 950
        c.advance_to(949, &mut out);
        assert!(out.is_empty());
        assert!(c.scroll().is_continuable());
        c.advance_to(950, &mut out);

        assert_eq!(kinds(&out), vec![BehaviorEventKind::Scroll]);
        let scroll = out[0].scroll().unwrap();
        assert_eq!(scroll.direction, ScrollDirection::Down);
        assert!(!scroll.direction_reversal);
        assert_eq!(out[0].timestamp_ms, 950);
        assert_eq!(out[0].session_id, "session-1");
    }

    #[test]
    fn test_sign_flip_sets_reversal() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                sample(0, 100.0, 20.0),
                sample(50, 120.0, 20.0),
                sample(100, 90.0, -30.0),
            ],
        );
        c.advance_to(10_000, &mut out);

        assert_eq!(out.len(), 1);
        assert!(out[0].scroll().unwrap().direction_reversal);
    }

    #[test]
    fn test_two_bursts_within_grace_are_one_gesture() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                sample(0, 100.0, 50.0),
                sample(100, 200.0, 100.0),
                // stop fires at 300; grace runs until 900
                sample(500, 300.0, 100.0),
                sample(600, 450.0, 150.0),
            ],
        );
        assert!(out.is_empty());
        c.advance_to(5_000, &mut out);

        assert_eq!(out.len(), 1);
        let metrics = out[0].scroll().unwrap();
        // start 50, end 450 over 600ms
        let expected_velocity = 400.0 / 0.6;
        assert!((metrics.velocity - expected_velocity).abs() < 1e-9);
        assert!(!metrics.direction_reversal);
    }

    #[test]
    fn test_burst_after_grace_is_new_gesture() {
        let mut c = classifier();
        let mut out = run(&mut c, &[sample(0, 100.0, 50.0), sample(100, 200.0, 100.0)]);
        // stop at 300, grace until 900; the next sample fires both first
        out.extend(run(&mut c, &[sample(2_000, 250.0, 50.0)]));
        assert_eq!(kinds(&out), vec![BehaviorEventKind::Scroll]);
        assert_eq!(out[0].timestamp_ms, 900);

        c.flush(2_100, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_taps_emitted_after_settle() {
        let mut c = classifier();
        let mut events = Vec::new();
        for start in [0, 200, 400, 600, 800] {
            events.push(NormalizedEvent::PointerDown { t: start });
            events.push(NormalizedEvent::PointerUp { t: start + 50 });
        }
        let mut out = run(&mut c, &events);
        c.advance_to(2_000, &mut out);

        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|e| !e.tap().unwrap().long_press));
        let timestamps: Vec<_> = out.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(timestamps, vec![150, 350, 550, 750, 950]);
    }

    #[test]
    fn test_down_during_settle_flushes_pending_tap() {
        let mut c = classifier();
        let out = run(
            &mut c,
            &[
                NormalizedEvent::PointerDown { t: 0 },
                NormalizedEvent::PointerUp { t: 30 },
                NormalizedEvent::PointerDown { t: 60 },
            ],
        );
        assert_eq!(kinds(&out), vec![BehaviorEventKind::Tap]);
        assert_eq!(out[0].timestamp_ms, 60);
        assert!(!c.timers().is_armed(TimerKind::TapSettle));
    }

    #[test]
    fn test_scroll_during_press_suppresses_tap() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                NormalizedEvent::PointerDown { t: 0 },
                sample(20, 40.0, 40.0),
                NormalizedEvent::PointerUp { t: 80 },
            ],
        );
        c.advance_to(5_000, &mut out);
        assert_eq!(kinds(&out), vec![BehaviorEventKind::Scroll]);
    }

    #[test]
    fn test_swipe_on_release() {
        let mut c = classifier();
        let out = run(
            &mut c,
            &[
                NormalizedEvent::PointerDown { t: 0 },
                NormalizedEvent::PointerMove {
                    t: 50,
                    axis_delta: AxisDelta::new(120.0, 10.0),
                },
                NormalizedEvent::PointerUp { t: 150 },
            ],
        );
        assert_eq!(kinds(&out), vec![BehaviorEventKind::Swipe]);
        assert_eq!(out[0].swipe().unwrap().direction, ScrollDirection::Right);
    }

    #[test]
    fn test_typing_session_with_clipboard() {
        let mut c = classifier();
        let mut events = vec![NormalizedEvent::FocusGained { t: 0 }];
        for t in [1_000, 1_100, 1_200, 1_300, 7_300, 7_400] {
            events.push(NormalizedEvent::TextLengthDelta {
                t,
                delta: 1,
                had_active_selection: false,
            });
        }
        events.push(NormalizedEvent::TextLengthDelta {
            t: 7_500,
            delta: 24,
            had_active_selection: false,
        });
        events.push(NormalizedEvent::TextLengthDelta {
            t: 7_600,
            delta: -2,
            had_active_selection: false,
        });
        events.push(NormalizedEvent::FocusLost { t: 8_000 });

        let out = run(&mut c, &events);
        assert_eq!(
            kinds(&out),
            vec![BehaviorEventKind::Clipboard, BehaviorEventKind::Typing]
        );
        assert_eq!(out[0].clipboard().unwrap().action, ClipboardAction::Paste);

        let typing = out[1].typing().unwrap();
        // The paste refreshed the last keystroke time but is not a tap
        assert_eq!(typing.typing_tap_count, 6);
        assert_eq!(typing.typing_gap_count, 1);
        assert!((typing.typing_gap_ratio - 0.2).abs() < 1e-12);
        assert!(!typing.deep_typing);
        assert_eq!(typing.number_of_paste, 1);
        assert_eq!(typing.backspace_count, 2);
    }

    #[test]
    fn test_single_keystroke_session_emits() {
        let mut c = classifier();
        let out = run(
            &mut c,
            &[
                NormalizedEvent::FocusGained { t: 0 },
                NormalizedEvent::TextLengthDelta {
                    t: 10,
                    delta: 1,
                    had_active_selection: false,
                },
                NormalizedEvent::FocusLost { t: 1_000 },
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].typing().unwrap().typing_tap_count, 1);
    }

    #[test]
    fn test_cut_and_copy() {
        let mut c = classifier();
        let out = run(
            &mut c,
            &[
                NormalizedEvent::SelectionCleared {
                    t: 100,
                    held_duration_ms: 800,
                },
                NormalizedEvent::TextLengthDelta {
                    t: 200,
                    delta: -6,
                    had_active_selection: true,
                },
                NormalizedEvent::SelectionCleared {
                    t: 210,
                    held_duration_ms: 800,
                },
            ],
        );
        let actions: Vec<_> = out
            .iter()
            .map(|e| e.clipboard().unwrap().action)
            .collect();
        assert_eq!(actions, vec![ClipboardAction::Copy, ClipboardAction::Cut]);
    }

    #[test]
    fn test_interruptions_pass_through() {
        let mut c = classifier();
        let out = run(
            &mut c,
            &[
                NormalizedEvent::Notification {
                    t: 5,
                    action: InterruptionAction::Opened,
                },
                NormalizedEvent::Call {
                    t: 6,
                    action: InterruptionAction::Ignored,
                },
                NormalizedEvent::AppSwitch { t: 7 },
            ],
        );
        assert_eq!(
            kinds(&out),
            vec![
                BehaviorEventKind::Notification,
                BehaviorEventKind::Call,
                BehaviorEventKind::AppSwitch
            ]
        );
        assert_eq!(
            out[0].interruption().unwrap().action,
            InterruptionAction::Opened
        );
    }

    #[test]
    fn test_stale_timer_handle_is_noop() {
        let mut c = classifier();
        let mut out = Vec::new();
        c.handle(sample(0, 10.0, 10.0), &mut out);
        let stale = c.timers.schedule(TimerKind::ScrollStop, 200);
        c.handle(sample(100, 20.0, 10.0), &mut out);

        assert!(!c.fire(stale, &mut out));
        assert!(c.scroll().is_tracking());
        assert!(out.is_empty());
    }

    #[test]
    fn test_flush_finalizes_everything() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                NormalizedEvent::FocusGained { t: 0 },
                NormalizedEvent::TextLengthDelta {
                    t: 10,
                    delta: 1,
                    had_active_selection: false,
                },
                sample(20, 10.0, 10.0),
                NormalizedEvent::PointerDown { t: 30 },
            ],
        );
        c.flush(100, &mut out);

        assert_eq!(
            kinds(&out),
            vec![
                BehaviorEventKind::Tap,
                BehaviorEventKind::Scroll,
                BehaviorEventKind::Typing
            ]
        );
        assert!(c.timers().is_empty());
        assert!(out.iter().all(|e| e.timestamp_ms == 100));
    }

    #[test]
    fn test_repeated_paste_counts_once() {
        let mut c = classifier();
        let paste = NormalizedEvent::TextLengthDelta {
            t: 100,
            delta: 5,
            had_active_selection: false,
        };
        let mut out = run(
            &mut c,
            &[
                NormalizedEvent::FocusGained { t: 0 },
                NormalizedEvent::TextLengthDelta {
                    t: 50,
                    delta: 1,
                    had_active_selection: false,
                },
                paste,
                paste,
            ],
        );
        c.handle(NormalizedEvent::FocusLost { t: 1_000 }, &mut out);

        assert_eq!(
            kinds(&out),
            vec![BehaviorEventKind::Clipboard, BehaviorEventKind::Typing]
        );
        assert_eq!(out[1].typing().unwrap().number_of_paste, 1);
    }

    #[test]
    fn test_reset_restarts_emission_clock() {
        let mut c = classifier();
        let mut out = run(&mut c, &[NormalizedEvent::AppSwitch { t: 100_000 }]);
        c.reset();
        c.handle(NormalizedEvent::AppSwitch { t: 5 }, &mut out);
        assert_eq!(out[1].timestamp_ms, 5);
    }

    #[test]
    fn test_deadlines_saturate_near_max_timestamp() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                NormalizedEvent::PointerDown { t: i64::MAX - 10 },
                NormalizedEvent::PointerUp { t: i64::MAX - 5 },
            ],
        );
        assert_eq!(c.timers().deadline(TimerKind::TapSettle), Some(i64::MAX));
        c.advance_to(i64::MAX, &mut out);
        assert_eq!(kinds(&out), vec![BehaviorEventKind::Tap]);
    }

    #[test]
    fn test_emitted_timestamps_are_monotonic() {
        let mut c = classifier();
        let mut out = run(
            &mut c,
            &[
                NormalizedEvent::PointerDown { t: 0 },
                NormalizedEvent::PointerUp { t: 40 },
                NormalizedEvent::AppSwitch { t: 100 },
            ],
        );
        c.advance_to(1_000, &mut out);
        // Tap settles at 140, after the app switch
        assert_eq!(
            kinds(&out),
            vec![BehaviorEventKind::AppSwitch, BehaviorEventKind::Tap]
        );
        assert!(out.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }
}
