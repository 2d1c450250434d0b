//! Rolling windows of behavior events
//!
//! Every configured window receives every event. Eviction is lazy: a window is pruned
//! when an event is added to it, relative to that newest event's timestamp.

use crate::config::WindowConfig;
use crate::error::BehaviorError;
use crate::types::BehaviorEvent;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// One rolling window
#[derive(Debug, Clone)]
pub struct Window {
    kind: String,
    duration_ms: i64,
    events: VecDeque<BehaviorEvent>,
}

impl Window {
    pub fn new(kind: &str, duration_ms: i64) -> Self {
        Self {
            kind: kind.to_string(),
            duration_ms,
            events: VecDeque::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, event: BehaviorEvent) {
        let latest = event.timestamp_ms;
        self.events.push_back(event);
        let cutoff = latest - self.duration_ms;
        while self
            .events
            .front()
            .is_some_and(|front| front.timestamp_ms < cutoff)
        {
            self.events.pop_front();
        }
    }

    pub fn events(&self) -> Vec<BehaviorEvent> {
        self.events.iter().cloned().collect()
    }
}

/// All configured windows
#[derive(Debug, Clone, Default)]
pub struct WindowAggregator {
    windows: Vec<Window>,
    latest_timestamp_ms: Option<i64>,
}

impl WindowAggregator {
    pub fn new(configs: &[WindowConfig]) -> Self {
        Self {
            windows: configs
                .iter()
                .map(|c| Window::new(&c.kind, c.duration_ms))
                .collect(),
            latest_timestamp_ms: None,
        }
    }

    /// Append an event to every window. Events must arrive in timestamp order.
    pub fn add_event(&mut self, event: &BehaviorEvent) {
        if let Some(latest) = self.latest_timestamp_ms {
            if event.timestamp_ms < latest {
                tracing::warn!(
                    timestamp_ms = event.timestamp_ms,
                    latest_ms = latest,
                    "behavior event arrived out of order"
                );
            }
        }
        self.latest_timestamp_ms = Some(
            self.latest_timestamp_ms
                .map_or(event.timestamp_ms, |l| l.max(event.timestamp_ms)),
        );
        for window in &mut self.windows {
            window.push(event.clone());
        }
    }

    pub fn window(&self, kind: &str) -> Result<&Window, BehaviorError> {
        self.windows
            .iter()
            .find(|w| w.kind == kind)
            .ok_or_else(|| BehaviorError::UnknownWindow(kind.to_string()))
    }

    /// Ordered contents of one window
    pub fn events_in(&self, kind: &str) -> Result<Vec<BehaviorEvent>, BehaviorError> {
        self.window(kind).map(Window::events)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.windows.iter().map(|w| w.kind.clone()).collect()
    }

    pub fn clear(&mut self) {
        for window in &mut self.windows {
            window.events.clear();
        }
        self.latest_timestamp_ms = None;
    }
}

/// Shared window store
pub type SharedWindows = Arc<RwLock<WindowAggregator>>;

/// Cloneable read-only view of the shared window store
#[derive(Debug, Clone)]
pub struct WindowReader {
    windows: SharedWindows,
}

impl WindowReader {
    pub fn new(windows: SharedWindows) -> Self {
        Self { windows }
    }

    /// Copy of one window's events, taken under the read lock
    pub fn events_in(&self, kind: &str) -> Result<Vec<BehaviorEvent>, BehaviorError> {
        let guard = self.windows.read().unwrap_or_else(PoisonError::into_inner);
        guard.events_in(kind)
    }

    /// Copy of one window, taken under the read lock
    pub fn snapshot(&self, kind: &str) -> Result<Window, BehaviorError> {
        let guard = self.windows.read().unwrap_or_else(PoisonError::into_inner);
        guard.window(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        let guard = self.windows.read().unwrap_or_else(PoisonError::into_inner);
        guard.kinds()
    }
}
