//! Behavioral data types
//!
//! This module defines the normalized input events, the classified behavior events and the
//! feature vector that flow through the interaction pipeline. None of these types carry
//! text content, absolute coordinates or device identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relative pointer displacement since the previous move sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisDelta {
    pub dx: f64,
    pub dy: f64,
}

impl AxisDelta {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// Interruption action taken by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionAction {
    Ignored,
    Opened,
    Answered,
    Dismissed,
}

/// A platform primitive after normalization. Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizedEvent {
    PointerDown {
        t: i64,
    },
    PointerUp {
        t: i64,
    },
    PointerMove {
        t: i64,
        axis_delta: AxisDelta,
    },
    ScrollSample {
        t: i64,
        position: f64,
        delta: f64,
    },
    FocusGained {
        t: i64,
    },
    FocusLost {
        t: i64,
    },
    TextLengthDelta {
        t: i64,
        delta: i64,
        had_active_selection: bool,
    },
    SelectionCleared {
        t: i64,
        held_duration_ms: i64,
    },
    /// Host-reported notification outcome
    Notification {
        t: i64,
        action: InterruptionAction,
    },
    /// Host-reported call outcome
    Call {
        t: i64,
        action: InterruptionAction,
    },
    /// Host-reported foreground app change
    AppSwitch {
        t: i64,
    },
}

impl NormalizedEvent {
    pub fn timestamp_ms(&self) -> i64 {
        match *self {
            NormalizedEvent::PointerDown { t }
            | NormalizedEvent::PointerUp { t }
            | NormalizedEvent::PointerMove { t, .. }
            | NormalizedEvent::ScrollSample { t, .. }
            | NormalizedEvent::FocusGained { t }
            | NormalizedEvent::FocusLost { t }
            | NormalizedEvent::TextLengthDelta { t, .. }
            | NormalizedEvent::SelectionCleared { t, .. }
            | NormalizedEvent::Notification { t, .. }
            | NormalizedEvent::Call { t, .. }
            | NormalizedEvent::AppSwitch { t } => t,
        }
    }
}

/// Behavioral event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorEventKind {
    Tap,
    Swipe,
    Scroll,
    Typing,
    Clipboard,
    Notification,
    Call,
    AppSwitch,
}

impl BehaviorEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorEventKind::Tap => "tap",
            BehaviorEventKind::Swipe => "swipe",
            BehaviorEventKind::Scroll => "scroll",
            BehaviorEventKind::Typing => "typing",
            BehaviorEventKind::Clipboard => "clipboard",
            BehaviorEventKind::Notification => "notification",
            BehaviorEventKind::Call => "call",
            BehaviorEventKind::AppSwitch => "app_switch",
        }
    }
}

/// Scroll and swipe direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Clipboard action inferred from text-length and selection changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardAction {
    Copy,
    Paste,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapMetrics {
    /// Press-to-release duration in milliseconds
    pub tap_duration_ms: u64,
    pub long_press: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeMetrics {
    pub direction: ScrollDirection,
    pub distance_px: f64,
    pub duration_ms: u64,
    /// px/s
    pub velocity: f64,
    /// px/s²
    pub acceleration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    /// px/s
    pub velocity: f64,
    /// px/s², assuming constant acceleration from rest
    pub acceleration: f64,
    pub direction: ScrollDirection,
    /// Whether the direction changed at any point during the gesture
    pub direction_reversal: bool,
}

/// Typing metrics for a single typing session (focus gain to focus loss)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingMetrics {
    pub typing_tap_count: u32,
    /// Taps per second
    pub typing_speed: f64,
    pub mean_inter_tap_interval_ms: f64,
    pub typing_cadence_variability: f64,
    pub typing_cadence_stability: f64,
    pub typing_gap_count: u32,
    pub typing_gap_ratio: f64,
    pub typing_burstiness: f64,
    pub typing_activity_ratio: f64,
    pub typing_interaction_intensity: f64,
    /// Whole seconds
    pub duration: u32,
    /// ISO-8601 UTC
    pub start_at: String,
    /// ISO-8601 UTC
    pub end_at: String,
    pub deep_typing: bool,
    pub backspace_count: u32,
    pub number_of_copy: u32,
    pub number_of_paste: u32,
    pub number_of_cut: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardMetrics {
    pub action: ClipboardAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionMetrics {
    pub action: InterruptionAction,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppSwitchMetrics {}

/// Kind-specific metrics of a behavior event
#[derive(Debug, Clone, PartialEq)]
pub enum EventMetrics {
    Tap(TapMetrics),
    Swipe(SwipeMetrics),
    Scroll(ScrollMetrics),
    Typing(TypingMetrics),
    Clipboard(ClipboardMetrics),
    Notification(InterruptionMetrics),
    Call(InterruptionMetrics),
    AppSwitch(AppSwitchMetrics),
}

impl EventMetrics {
    pub fn kind(&self) -> BehaviorEventKind {
        match self {
            EventMetrics::Tap(_) => BehaviorEventKind::Tap,
            EventMetrics::Swipe(_) => BehaviorEventKind::Swipe,
            EventMetrics::Scroll(_) => BehaviorEventKind::Scroll,
            EventMetrics::Typing(_) => BehaviorEventKind::Typing,
            EventMetrics::Clipboard(_) => BehaviorEventKind::Clipboard,
            EventMetrics::Notification(_) => BehaviorEventKind::Notification,
            EventMetrics::Call(_) => BehaviorEventKind::Call,
            EventMetrics::AppSwitch(_) => BehaviorEventKind::AppSwitch,
        }
    }
}

/// A classified behavioral event
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorEvent {
    pub event_id: String,
    pub session_id: String,
    pub timestamp_ms: i64,
    pub kind: BehaviorEventKind,
    pub metrics: EventMetrics,
}

impl BehaviorEvent {
    /// Create an event with a fresh identifier; the kind follows the metrics variant
    pub fn new(session_id: &str, timestamp_ms: i64, metrics: EventMetrics) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            timestamp_ms,
            kind: metrics.kind(),
            metrics,
        }
    }

    pub fn scroll(&self) -> Option<&ScrollMetrics> {
        match &self.metrics {
            EventMetrics::Scroll(m) => Some(m),
            _ => None,
        }
    }

    pub fn tap(&self) -> Option<&TapMetrics> {
        match &self.metrics {
            EventMetrics::Tap(m) => Some(m),
            _ => None,
        }
    }

    pub fn swipe(&self) -> Option<&SwipeMetrics> {
        match &self.metrics {
            EventMetrics::Swipe(m) => Some(m),
            _ => None,
        }
    }

    pub fn typing(&self) -> Option<&TypingMetrics> {
        match &self.metrics {
            EventMetrics::Typing(m) => Some(m),
            _ => None,
        }
    }

    pub fn clipboard(&self) -> Option<&ClipboardMetrics> {
        match &self.metrics {
            EventMetrics::Clipboard(m) => Some(m),
            _ => None,
        }
    }

    pub fn interruption(&self) -> Option<&InterruptionMetrics> {
        match &self.metrics {
            EventMetrics::Notification(m) | EventMetrics::Call(m) => Some(m),
            _ => None,
        }
    }
}

/// Normalized window features plus the scoring output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub window_kind: String,
    pub window_duration_ms: i64,
    /// When the vector was computed (Unix epoch milliseconds)
    pub computed_at_ms: i64,
    pub event_count: u32,

    pub tap_rate_norm: f64,
    pub keystroke_rate_norm: f64,
    pub switch_rate_norm: f64,
    pub notification_rate_norm: f64,
    pub notification_open_rate_norm: f64,
    pub scroll_velocity_norm: f64,
    pub idle_ratio: f64,
    pub burstiness: f64,
    pub session_fragmentation: f64,
    pub typing_cadence_stability: f64,
    pub scroll_cadence_stability: f64,
    pub notification_score: f64,
    pub interaction_intensity: f64,

    pub distraction_score: f64,
    pub focus_hint: f64,
}

impl FeatureVector {
    /// All-zero vector, used for empty windows
    pub fn zeroed(window_kind: &str, window_duration_ms: i64, computed_at_ms: i64) -> Self {
        Self {
            window_kind: window_kind.to_string(),
            window_duration_ms,
            computed_at_ms,
            event_count: 0,
            tap_rate_norm: 0.0,
            keystroke_rate_norm: 0.0,
            switch_rate_norm: 0.0,
            notification_rate_norm: 0.0,
            notification_open_rate_norm: 0.0,
            scroll_velocity_norm: 0.0,
            idle_ratio: 0.0,
            burstiness: 0.0,
            session_fragmentation: 0.0,
            typing_cadence_stability: 0.0,
            scroll_cadence_stability: 0.0,
            notification_score: 0.0,
            interaction_intensity: 0.0,
            distraction_score: 0.0,
            focus_hint: 0.0,
        }
    }

    /// Scoring-function inputs in their fixed order
    pub fn scoring_inputs(&self) -> [f64; 12] {
        [
            self.tap_rate_norm,
            self.keystroke_rate_norm,
            self.scroll_velocity_norm,
            self.idle_ratio,
            self.switch_rate_norm,
            self.burstiness,
            self.session_fragmentation,
            self.notification_rate_norm,
            self.notification_open_rate_norm,
            self.notification_score,
            self.typing_cadence_stability,
            self.scroll_cadence_stability,
        ]
    }

    /// Every bounded value with its name
    pub fn named_values(&self) -> [(&'static str, f64); 15] {
        [
            ("tap_rate_norm", self.tap_rate_norm),
            ("keystroke_rate_norm", self.keystroke_rate_norm),
            ("switch_rate_norm", self.switch_rate_norm),
            ("notification_rate_norm", self.notification_rate_norm),
            ("notification_open_rate_norm", self.notification_open_rate_norm),
            ("scroll_velocity_norm", self.scroll_velocity_norm),
            ("idle_ratio", self.idle_ratio),
            ("burstiness", self.burstiness),
            ("session_fragmentation", self.session_fragmentation),
            ("typing_cadence_stability", self.typing_cadence_stability),
            ("scroll_cadence_stability", self.scroll_cadence_stability),
            ("notification_score", self.notification_score),
            ("interaction_intensity", self.interaction_intensity),
            ("distraction_score", self.distraction_score),
            ("focus_hint", self.focus_hint),
        ]
    }
}
