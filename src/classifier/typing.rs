//! Typing session state machine
//!
//! A session spans one text-input focus. Only inter-key latencies and counters are kept;
//! no text content ever reaches this module.

use crate::config::TypingConfig;
use crate::encoder::format_timestamp_ms;
use crate::types::{ClipboardAction, TypingMetrics};

#[derive(Debug, Clone, PartialEq)]
struct TypingSession {
    session_start: i64,
    last_keystroke_time: Option<i64>,
    inter_key_latencies: Vec<i64>,
    backspace_count: u32,
    paste_count: u32,
    copy_count: u32,
    cut_count: u32,
}

#[derive(Debug)]
pub struct TypingMachine {
    config: TypingConfig,
    session: Option<TypingSession>,
}

impl TypingMachine {
    pub fn new(config: TypingConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Open a session. A session that is still open is ended first and its metrics returned.
    pub fn begin(&mut self, t: i64) -> Option<TypingMetrics> {
        let previous = self.end(t);
        self.session = Some(TypingSession {
            session_start: t,
            last_keystroke_time: None,
            inter_key_latencies: Vec::new(),
            backspace_count: 0,
            paste_count: 0,
            copy_count: 0,
            cut_count: 0,
        });
        previous
    }

    pub fn keystroke(&mut self, t: i64) {
        let Some(session) = &mut self.session else {
            return;
        };
        if let Some(last) = session.last_keystroke_time {
            session.inter_key_latencies.push((t - last).max(0));
        }
        session.last_keystroke_time = Some(t);
    }

    pub fn backspace(&mut self, deleted: i64) {
        if let Some(session) = &mut self.session {
            let deleted = u32::try_from(deleted.max(0)).unwrap_or(u32::MAX);
            session.backspace_count = session.backspace_count.saturating_add(deleted);
        }
    }

    /// Count a detected clipboard action against the open session
    pub fn clipboard(&mut self, action: ClipboardAction, t: i64) {
        let Some(session) = &mut self.session else {
            return;
        };
        match action {
            ClipboardAction::Paste => {
                session.paste_count += 1;
                // Pasting keeps an ongoing typing run alive. Before the first keystroke there
                // is no run: the paste is not a typing tap, and stamping it would start the
                // inter-tap latency chain at a paste and make a paste-only focus look typed.
                if session.last_keystroke_time.is_some() {
                    session.last_keystroke_time = Some(t);
                }
            }
            ClipboardAction::Copy => session.copy_count += 1,
            ClipboardAction::Cut => session.cut_count += 1,
        }
    }

    /// Close the session. Metrics are produced only if a keystroke occurred.
    pub fn end(&mut self, t: i64) -> Option<TypingMetrics> {
        let session = self.session.take()?;
        session.last_keystroke_time?;
        let metrics = compute_metrics(&self.config, &session, t);
        tracing::debug!(
            taps = metrics.typing_tap_count,
            duration_s = metrics.duration,
            gaps = metrics.typing_gap_count,
            "typing session ended"
        );
        Some(metrics)
    }
}

fn compute_metrics(config: &TypingConfig, session: &TypingSession, end: i64) -> TypingMetrics {
    let latencies = &session.inter_key_latencies;
    let duration_ms = (end - session.session_start).max(0);
    let duration_s = duration_ms as f64 / 1000.0;

    let tap_count = latencies.len() as u32 + 1;
    let typing_speed = if duration_s > 0.0 {
        tap_count as f64 / duration_s
    } else {
        0.0
    };

    let mean = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<i64>() as f64 / latencies.len() as f64
    };

    // Sample standard deviation, needs at least three taps
    let variability = if latencies.len() >= 2 {
        let sum_sq: f64 = latencies
            .iter()
            .map(|&l| (l as f64 - mean).powi(2))
            .sum();
        (sum_sq / (latencies.len() - 1) as f64).sqrt()
    } else {
        0.0
    };

    let stability = if mean > 0.0 {
        (1.0 - (variability / mean).min(1.0)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let gap_count = latencies
        .iter()
        .filter(|&&l| l > config.gap_threshold_ms)
        .count() as u32;
    let gap_ratio = if latencies.is_empty() {
        0.0
    } else {
        gap_count as f64 / latencies.len() as f64
    };

    let burstiness = if variability + mean > 0.0 {
        (((variability - mean) / (variability + mean) + 1.0) / 2.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let activity_ratio = if duration_ms > 0 {
        let active: i64 = latencies
            .iter()
            .map(|&l| l.min(config.activity_cap_ms))
            .sum();
        (active as f64 / duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let speed_norm = (typing_speed / config.max_typing_speed).min(1.0);
    let intensity =
        (0.4 * speed_norm + 0.35 * (1.0 - gap_ratio) + 0.25 * stability).clamp(0.0, 1.0);

    TypingMetrics {
        typing_tap_count: tap_count,
        typing_speed,
        mean_inter_tap_interval_ms: mean,
        typing_cadence_variability: variability,
        typing_cadence_stability: stability,
        typing_gap_count: gap_count,
        typing_gap_ratio: gap_ratio,
        typing_burstiness: burstiness,
        typing_activity_ratio: activity_ratio,
        typing_interaction_intensity: intensity,
        duration: u32::try_from(duration_ms / 1000).unwrap_or(u32::MAX),
        start_at: format_timestamp_ms(session.session_start),
        end_at: format_timestamp_ms(end),
        deep_typing: duration_s >= config.deep_typing_min_duration_s,
        backspace_count: session.backspace_count,
        number_of_copy: session.copy_count,
        number_of_paste: session.paste_count,
        number_of_cut: session.cut_count,
    }
}
