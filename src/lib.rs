//! Synheart Behavior - On-device interaction classification and behavioral features
//!
//! Behavior turns raw interaction primitives into behavioral signals through a
//! one-way pipeline: normalization → gesture classification → rolling windows
//! → feature derivation → scoring.
//!
//! ## Modules
//!
//! - **Classification**: scroll, tap/swipe, typing session and clipboard state machines
//! - **Features**: windowed rates, burstiness, cadence stability and a distraction/focus score

pub mod baseline;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod scoring;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::BehaviorError;
pub use normalizer::RawPrimitive;
pub use pipeline::{EventFeed, IngestStats, InteractionEngine};
pub use scoring::{LinearScorer, Scorer};
pub use types::{BehaviorEvent, BehaviorEventKind, EventMetrics, FeatureVector, NormalizedEvent};
pub use window::WindowReader;

/// Library version embedded in feature snapshots
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for feature snapshots
pub const PRODUCER_NAME: &str = "synheart-behavior";
