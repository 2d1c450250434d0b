//! Cancellable deadlines for the classifier's deferred transitions
//!
//! At most one deadline per [`TimerKind`] is armed. Re-arming a kind replaces its previous
//! deadline and bumps the generation, so a handle obtained before the replacement is stale
//! and firing it does nothing.

/// Deferred transitions driven by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Quiet period after the last scroll sample
    ScrollStop,
    /// Continuation window after a scroll gesture stopped
    ScrollGrace,
    /// Delay between pointer-up and tap emission
    TapSettle,
}

/// Handle to one scheduling of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub kind: TimerKind,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at_ms: i64,
    handle: TimerHandle,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    generation: u64,
    armed: Vec<Deadline>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` at `at_ms`, replacing any deadline of the same kind
    pub fn schedule(&mut self, kind: TimerKind, at_ms: i64) -> TimerHandle {
        self.cancel(kind);
        self.generation = self.generation.saturating_add(1);
        let handle = TimerHandle {
            kind,
            generation: self.generation,
        };
        self.armed.push(Deadline { at_ms, handle });
        handle
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.armed.retain(|d| d.handle.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.armed.clear();
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<i64> {
        self.armed
            .iter()
            .find(|d| d.handle.kind == kind)
            .map(|d| d.at_ms)
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    /// Whether `handle` still refers to an armed deadline
    pub fn is_current(&self, handle: TimerHandle) -> bool {
        self.armed.iter().any(|d| d.handle == handle)
    }

    /// Disarm `handle` and return its deadline. Stale handles yield `None`.
    pub fn take(&mut self, handle: TimerHandle) -> Option<i64> {
        let index = self.armed.iter().position(|d| d.handle == handle)?;
        Some(self.armed.swap_remove(index).at_ms)
    }

    /// Disarm and return the earliest deadline at or before `now_ms`.
    /// Ties go to the timer scheduled first.
    pub fn pop_due(&mut self, now_ms: i64) -> Option<(TimerHandle, i64)> {
        let index = self
            .armed
            .iter()
            .enumerate()
            .filter(|(_, d)| d.at_ms <= now_ms)
            .min_by_key(|(_, d)| (d.at_ms, d.handle.generation))
            .map(|(i, _)| i)?;
        let due = self.armed.swap_remove(index);
        Some((due.handle, due.at_ms))
    }
}
