//! Event normalization
//!
//! Converts raw `(kind, timestamp_ms, payload)` primitives into [`NormalizedEvent`]s and
//! enforces the ordering contract of the stream. A rejected primitive never advances the
//! normalizer's state, so the stream continues with the next primitive.

use crate::error::BehaviorError;
use crate::types::{AxisDelta, InterruptionAction, NormalizedEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Latest accepted timestamp, 9999-12-31T23:59:59.999Z. Anything later has no ISO-8601 wire form.
pub const MAX_TIMESTAMP_MS: i64 = 253_402_300_799_999;

/// A raw primitive as delivered by a platform collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrimitive {
    pub kind: String,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl RawPrimitive {
    pub fn new(kind: &str, timestamp_ms: i64) -> Self {
        Self {
            kind: kind.to_string(),
            timestamp_ms,
            payload: Map::new(),
        }
    }

    /// Builder-style payload field
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(field.to_string(), value.into());
        self
    }
}

/// Parse a single JSON primitive (one NDJSON line)
pub fn parse_primitive(json: &str) -> Result<RawPrimitive, BehaviorError> {
    serde_json::from_str(json)
        .map_err(|e| BehaviorError::ParseError(format!("Failed to parse primitive: {e}")))
}

/// Stateful normalizer for one event stream
#[derive(Debug, Default)]
pub struct EventNormalizer {
    last_timestamp_ms: Option<i64>,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the last accepted primitive
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.last_timestamp_ms
    }

    /// Forget the ordering history (new session)
    pub fn reset(&mut self) {
        self.last_timestamp_ms = None;
    }

    /// Normalize a primitive, rejecting malformed or out-of-order input
    pub fn normalize(&mut self, raw: &RawPrimitive) -> Result<NormalizedEvent, BehaviorError> {
        let t = raw.timestamp_ms;
        if t < 0 {
            return Err(BehaviorError::InvalidField {
                field: "timestamp_ms".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if t > MAX_TIMESTAMP_MS {
            return Err(BehaviorError::InvalidField {
                field: "timestamp_ms".to_string(),
                reason: format!("exceeds supported range (max {MAX_TIMESTAMP_MS})"),
            });
        }
        if let Some(previous_ms) = self.last_timestamp_ms {
            if t < previous_ms {
                return Err(BehaviorError::NonMonotonicTimestamp {
                    timestamp_ms: t,
                    previous_ms,
                });
            }
        }

        let event = decode(&raw.kind, t, &raw.payload)?;
        self.last_timestamp_ms = Some(t);
        Ok(event)
    }
}

fn decode(kind: &str, t: i64, payload: &Map<String, Value>) -> Result<NormalizedEvent, BehaviorError> {
    let event = match kind {
        "pointer_down" => NormalizedEvent::PointerDown { t },
        "pointer_up" => NormalizedEvent::PointerUp { t },
        "pointer_move" => NormalizedEvent::PointerMove {
            t,
            axis_delta: AxisDelta::new(number(payload, "dx")?, number(payload, "dy")?),
        },
        "scroll_sample" => NormalizedEvent::ScrollSample {
            t,
            position: number(payload, "position")?,
            delta: number(payload, "delta")?,
        },
        "focus_gained" => NormalizedEvent::FocusGained { t },
        "focus_lost" => NormalizedEvent::FocusLost { t },
        "text_length_delta" => {
            let delta = integer(payload, "delta")?;
            if delta == 0 {
                return Err(BehaviorError::InvalidField {
                    field: "delta".to_string(),
                    reason: "text length did not change".to_string(),
                });
            }
            NormalizedEvent::TextLengthDelta {
                t,
                delta,
                had_active_selection: flag(payload, "had_active_selection")?,
            }
        }
        "selection_cleared" => {
            let held_duration_ms = integer(payload, "held_duration_ms")?;
            if held_duration_ms < 0 {
                return Err(BehaviorError::InvalidField {
                    field: "held_duration_ms".to_string(),
                    reason: "must not be negative".to_string(),
                });
            }
            NormalizedEvent::SelectionCleared {
                t,
                held_duration_ms,
            }
        }
        "notification" => NormalizedEvent::Notification {
            t,
            action: action(payload)?,
        },
        "call" => NormalizedEvent::Call {
            t,
            action: action(payload)?,
        },
        "app_switch" => NormalizedEvent::AppSwitch { t },
        other => return Err(BehaviorError::UnknownEventKind(other.to_string())),
    };
    Ok(event)
}

fn number(payload: &Map<String, Value>, field: &str) -> Result<f64, BehaviorError> {
    let value = payload
        .get(field)
        .ok_or_else(|| BehaviorError::MissingField(field.to_string()))?;
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(BehaviorError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a finite number, got {value}"),
        }),
    }
}

fn integer(payload: &Map<String, Value>, field: &str) -> Result<i64, BehaviorError> {
    let value = payload
        .get(field)
        .ok_or_else(|| BehaviorError::MissingField(field.to_string()))?;
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
        _ => Err(BehaviorError::InvalidField {
            field: field.to_string(),
            reason: format!("expected an integer, got {value}"),
        }),
    }
}

fn flag(payload: &Map<String, Value>, field: &str) -> Result<bool, BehaviorError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(BehaviorError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}

fn action(payload: &Map<String, Value>) -> Result<InterruptionAction, BehaviorError> {
    let value = payload
        .get("action")
        .ok_or_else(|| BehaviorError::MissingField("action".to_string()))?;
    serde_json::from_value(value.clone()).map_err(|_| BehaviorError::InvalidField {
        field: "action".to_string(),
        reason: format!("unknown interruption action {value}"),
    })
}
