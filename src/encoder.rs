//! Wire encoding
//!
//! Stable JSON shapes for behavior events and feature snapshots. Timestamps on the wire are
//! ISO-8601 UTC with millisecond precision.

use crate::baseline::{Baselines, ContextualFeatures};
use crate::error::BehaviorError;
use crate::types::{
    AppSwitchMetrics, BehaviorEvent, BehaviorEventKind, ClipboardMetrics, EventMetrics,
    InterruptionMetrics, ScrollMetrics, SwipeMetrics, TapMetrics, TypingMetrics,
};
use crate::{PRODUCER_NAME, VERSION};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Render Unix epoch milliseconds as ISO-8601 UTC, e.g. `2024-01-15T14:00:00.250Z`
pub fn format_timestamp_ms(timestamp_ms: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => {
            tracing::warn!(timestamp_ms, "timestamp outside the representable calendar range");
            String::new()
        }
    }
}

/// Parse an ISO-8601 timestamp into Unix epoch milliseconds
pub fn parse_timestamp_ms(timestamp: &str) -> Result<i64, BehaviorError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| BehaviorError::InvalidField {
            field: "timestamp".to_string(),
            reason: e.to_string(),
        })
}

/// `{"event": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: WireEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub event_type: BehaviorEventKind,
    pub metrics: Value,
}

impl EventEnvelope {
    pub fn from_event(event: &BehaviorEvent) -> Result<Self, BehaviorError> {
        Ok(Self {
            event: WireEvent {
                event_id: event.event_id.clone(),
                session_id: event.session_id.clone(),
                timestamp: format_timestamp_ms(event.timestamp_ms),
                event_type: event.kind,
                metrics: metrics_to_value(&event.metrics)?,
            },
        })
    }

    pub fn into_event(self) -> Result<BehaviorEvent, BehaviorError> {
        let WireEvent {
            event_id,
            session_id,
            timestamp,
            event_type,
            metrics,
        } = self.event;
        let metrics = metrics_from_value(event_type, metrics)?;
        Ok(BehaviorEvent {
            event_id,
            session_id,
            timestamp_ms: parse_timestamp_ms(&timestamp)?,
            kind: event_type,
            metrics,
        })
    }
}

fn metrics_to_value(metrics: &EventMetrics) -> Result<Value, BehaviorError> {
    let value = match metrics {
        EventMetrics::Tap(m) => serde_json::to_value(m),
        EventMetrics::Swipe(m) => serde_json::to_value(m),
        EventMetrics::Scroll(m) => serde_json::to_value(m),
        EventMetrics::Typing(m) => serde_json::to_value(m),
        EventMetrics::Clipboard(m) => serde_json::to_value(m),
        EventMetrics::Notification(m) | EventMetrics::Call(m) => serde_json::to_value(m),
        EventMetrics::AppSwitch(m) => serde_json::to_value(m),
    };
    value.map_err(|e| BehaviorError::EncodingError(e.to_string()))
}

fn metrics_from_value(kind: BehaviorEventKind, value: Value) -> Result<EventMetrics, BehaviorError> {
    let metrics = match kind {
        BehaviorEventKind::Tap => EventMetrics::Tap(serde_json::from_value::<TapMetrics>(value)?),
        BehaviorEventKind::Swipe => {
            EventMetrics::Swipe(serde_json::from_value::<SwipeMetrics>(value)?)
        }
        BehaviorEventKind::Scroll => {
            EventMetrics::Scroll(serde_json::from_value::<ScrollMetrics>(value)?)
        }
        BehaviorEventKind::Typing => {
            EventMetrics::Typing(serde_json::from_value::<TypingMetrics>(value)?)
        }
        BehaviorEventKind::Clipboard => {
            EventMetrics::Clipboard(serde_json::from_value::<ClipboardMetrics>(value)?)
        }
        BehaviorEventKind::Notification => {
            EventMetrics::Notification(serde_json::from_value::<InterruptionMetrics>(value)?)
        }
        BehaviorEventKind::Call => {
            EventMetrics::Call(serde_json::from_value::<InterruptionMetrics>(value)?)
        }
        BehaviorEventKind::AppSwitch => {
            EventMetrics::AppSwitch(serde_json::from_value::<AppSwitchMetrics>(value)?)
        }
    };
    Ok(metrics)
}

/// Encode a behavior event to its wire JSON
pub fn encode_event(event: &BehaviorEvent) -> Result<String, BehaviorError> {
    let envelope = EventEnvelope::from_event(event)?;
    serde_json::to_string(&envelope).map_err(BehaviorError::JsonError)
}

/// Decode a behavior event from its wire JSON
pub fn decode_event(json: &str) -> Result<BehaviorEvent, BehaviorError> {
    let envelope: EventEnvelope = serde_json::from_str(json)?;
    envelope.into_event()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotWindow {
    pub kind: String,
    pub duration_ms: i64,
    pub event_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBaseline {
    #[serde(flatten)]
    pub baselines: Baselines,
    pub distraction_deviation_pct: Option<f64>,
    pub focus_deviation_pct: Option<f64>,
}

/// Feature snapshot as published to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub producer: SnapshotProducer,
    pub computed_at: String,
    pub window: SnapshotWindow,
    pub features: BTreeMap<String, f64>,
    pub baseline: SnapshotBaseline,
}

/// Encoder for feature snapshots
pub struct FeatureSnapshotEncoder {
    instance_id: String,
}

impl Default for FeatureSnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, contextual: &ContextualFeatures) -> FeatureSnapshot {
        let features = &contextual.features;
        FeatureSnapshot {
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at: format_timestamp_ms(features.computed_at_ms),
            window: SnapshotWindow {
                kind: features.window_kind.clone(),
                duration_ms: features.window_duration_ms,
                event_count: features.event_count,
            },
            features: features
                .named_values()
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            baseline: SnapshotBaseline {
                baselines: contextual.baselines.clone(),
                distraction_deviation_pct: contextual.distraction_deviation_pct,
                focus_deviation_pct: contextual.focus_deviation_pct,
            },
        }
    }

    pub fn encode_to_json(&self, contextual: &ContextualFeatures) -> Result<String, BehaviorError> {
        serde_json::to_string_pretty(&self.encode(contextual)).map_err(BehaviorError::JsonError)
    }
}
