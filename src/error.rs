//! Error types for Synheart Behavior

use thiserror::Error;

/// Errors that can occur while ingesting, classifying or deriving features
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("Timestamp {timestamp_ms} precedes previous event at {previous_ms}")]
    NonMonotonicTimestamp { timestamp_ms: i64, previous_ms: i64 },

    #[error("Unknown window kind: {0}")]
    UnknownWindow(String),

    #[error("Scoring function expects {expected} inputs, got {actual}")]
    ScoringShapeMismatch { expected: usize, actual: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Event feed unavailable: {0}")]
    FeedError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BehaviorError {
    /// Whether the error concerns a single input event (the stream can continue)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            BehaviorError::ParseError(_)
                | BehaviorError::JsonError(_)
                | BehaviorError::MissingField(_)
                | BehaviorError::InvalidField { .. }
                | BehaviorError::UnknownEventKind(_)
                | BehaviorError::NonMonotonicTimestamp { .. }
        )
    }
}
