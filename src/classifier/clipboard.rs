//! Clipboard inference from text-length and selection changes
//!
//! Paste: a length increase of at least the paste threshold.
//! Cut: a length decrease while a selection was active.
//! Copy: a selection cleared after being held long enough, with no deletion consuming it.

use crate::config::ClipboardConfig;
use crate::types::ClipboardAction;

/// Last observed fate of the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SelectionState {
    #[default]
    Untouched,
    /// The selection was deleted or replaced
    Consumed { at: i64 },
}

/// Identity of one detection: the action and the length change that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signature {
    action: ClipboardAction,
    /// Length delta for paste and cut, zero for copy
    delta: i64,
    at: i64,
}

#[derive(Debug)]
pub struct ClipboardMachine {
    config: ClipboardConfig,
    selection: SelectionState,
    text_length: i64,
    last_detection: Option<Signature>,
}

impl ClipboardMachine {
    pub fn new(config: ClipboardConfig) -> Self {
        Self {
            config,
            selection: SelectionState::Untouched,
            text_length: 0,
            last_detection: None,
        }
    }

    /// Running text length relative to the start of the current focus
    pub fn text_length(&self) -> i64 {
        self.text_length
    }

    /// New text field focus
    pub fn reset_field(&mut self) {
        self.text_length = 0;
        self.selection = SelectionState::Untouched;
    }

    /// Text length changed. Returns the clipboard action this change implies, if any.
    pub fn on_length_change(
        &mut self,
        t: i64,
        delta: i64,
        had_active_selection: bool,
        paste_threshold: i64,
    ) -> Option<ClipboardAction> {
        let action = if delta >= paste_threshold {
            Some(ClipboardAction::Paste)
        } else if delta < 0 && had_active_selection {
            Some(ClipboardAction::Cut)
        } else {
            None
        };

        // A repeated notification of the same change leaves no trace
        if let Some(action) = action {
            if self.is_duplicate(action, delta, t) {
                tracing::debug!(action = ?action, delta, "duplicate clipboard detection dropped");
                return None;
            }
        }

        self.text_length = self.text_length.saturating_add(delta);
        if had_active_selection {
            self.selection = SelectionState::Consumed { at: t };
        } else if delta > 0 {
            // Typing starts a fresh selection context
            self.selection = SelectionState::Untouched;
        }

        let action = action?;
        self.record(action, delta, t);
        Some(action)
    }

    /// Selection cleared after being held for `held_duration_ms`
    pub fn on_selection_cleared(&mut self, t: i64, held_duration_ms: i64) -> Option<ClipboardAction> {
        let previous = std::mem::take(&mut self.selection);
        if let SelectionState::Consumed { at } = previous {
            tracing::trace!(consumed_at = at, "selection cleared after deletion");
            return None;
        }
        if held_duration_ms < self.config.copy_min_dwell_ms {
            return None;
        }
        if self.is_duplicate(ClipboardAction::Copy, 0, t) {
            tracing::debug!("duplicate copy detection dropped");
            return None;
        }
        self.record(ClipboardAction::Copy, 0, t);
        Some(ClipboardAction::Copy)
    }

    fn is_duplicate(&self, action: ClipboardAction, delta: i64, t: i64) -> bool {
        self.last_detection.is_some_and(|last| {
            last.action == action
                && last.delta == delta
                && t.saturating_sub(last.at) < self.config.debounce_ms
        })
    }

    fn record(&mut self, action: ClipboardAction, delta: i64, t: i64) {
        self.last_detection = Some(Signature { action, delta, at: t });
    }
}
