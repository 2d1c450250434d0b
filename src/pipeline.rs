//! Pipeline orchestration
//!
//! [`InteractionEngine`] is the public API of the crate. It owns the normalizer, the
//! classifier, the shared window store, the scoring strategy and the baseline store, and
//! runs the full path from raw primitive to scored feature vector.
//!
//! # Example
//! ```ignore
//! let mut engine = InteractionEngine::new(EngineConfig::default())?;
//! engine.on_behavior_event(|event| println!("{:?}", event.kind));
//! engine.ingest_json(r#"{"kind": "pointer_down", "timestamp_ms": 1000}"#)?;
//! engine.tick();
//! let features = engine.derive_features("short")?;
//! ```

use crate::baseline::{BaselineStore, Baselines, ContextualFeatures};
use crate::classifier::GestureClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::encoder::FeatureSnapshotEncoder;
use crate::error::BehaviorError;
use crate::features::FeatureDeriver;
use crate::normalizer::{parse_primitive, EventNormalizer, RawPrimitive};
use crate::scoring::{LinearScorer, Scorer};
use crate::types::{BehaviorEvent, FeatureVector};
use crate::window::{SharedWindows, WindowAggregator, WindowReader};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Callback invoked for every emitted behavior event
pub type BehaviorListener = Box<dyn FnMut(&BehaviorEvent) + Send>;

/// Ingest counters since the engine was created or last cleared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Primitives that passed normalization
    pub accepted: u64,
    /// Primitives rejected as malformed or out of order
    pub rejected: u64,
    /// Behavior events emitted by the classifier
    pub emitted: u64,
}

/// Producer half of the engine's single-producer queue
#[derive(Debug)]
pub struct EventFeed {
    sender: SyncSender<RawPrimitive>,
}

impl EventFeed {
    /// Queue a primitive, blocking while the queue is full
    pub fn send(&self, raw: RawPrimitive) -> Result<(), BehaviorError> {
        self.sender
            .send(raw)
            .map_err(|_| BehaviorError::FeedError("engine dropped the feed".to_string()))
    }

    /// Queue a primitive without blocking
    pub fn try_send(&self, raw: RawPrimitive) -> Result<(), BehaviorError> {
        self.sender.try_send(raw).map_err(|e| match e {
            TrySendError::Full(_) => BehaviorError::FeedError("feed is full".to_string()),
            TrySendError::Disconnected(_) => {
                BehaviorError::FeedError("engine dropped the feed".to_string())
            }
        })
    }
}

/// Real-time interaction engine for one tracked surface
pub struct InteractionEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    scorer: Box<dyn Scorer>,
    normalizer: EventNormalizer,
    classifier: GestureClassifier,
    windows: SharedWindows,
    deriver: FeatureDeriver,
    baselines: BaselineStore,
    encoder: FeatureSnapshotEncoder,
    listeners: Vec<BehaviorListener>,
    feed: Option<Receiver<RawPrimitive>>,
    stats: IngestStats,
}

impl InteractionEngine {
    /// Create an engine driven by the system clock
    pub fn new(config: EngineConfig) -> Result<Self, BehaviorError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine driven by `clock`
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, BehaviorError> {
        config.validate()?;
        let scorer = LinearScorer::from_config(&config.scoring)?;
        let session_id = Uuid::new_v4().to_string();

        Ok(Self {
            classifier: GestureClassifier::new(&session_id, &config),
            windows: Arc::new(RwLock::new(WindowAggregator::new(&config.windows))),
            deriver: FeatureDeriver::new(config.features.clone()),
            baselines: BaselineStore::new(config.baseline.window_size),
            encoder: FeatureSnapshotEncoder::new(),
            scorer: Box::new(scorer),
            normalizer: EventNormalizer::new(),
            listeners: Vec::new(),
            feed: None,
            stats: IngestStats::default(),
            config,
            clock,
        })
    }

    /// Replace the scoring strategy
    pub fn with_scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        self.classifier.session_id()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Register a listener for every emitted behavior event
    pub fn on_behavior_event<F>(&mut self, listener: F)
    where
        F: FnMut(&BehaviorEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Read-only view of the window store, usable from other threads
    pub fn reader(&self) -> WindowReader {
        WindowReader::new(Arc::clone(&self.windows))
    }

    /// Open the single-producer queue. A previously opened feed is disconnected.
    pub fn feed(&mut self, capacity: usize) -> EventFeed {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        self.feed = Some(receiver);
        EventFeed { sender }
    }

    /// Ingest everything queued on the feed
    pub fn drain_feed(&mut self) -> Vec<BehaviorEvent> {
        let queued: Vec<RawPrimitive> = match &self.feed {
            Some(receiver) => receiver.try_iter().collect(),
            None => return Vec::new(),
        };
        let mut emitted = Vec::new();
        for raw in queued {
            // Rejections are already logged and counted
            if let Ok(events) = self.ingest(&raw) {
                emitted.extend(events);
            }
        }
        emitted
    }

    /// Ingest one raw primitive, returning the behavior events it completed
    pub fn ingest(&mut self, raw: &RawPrimitive) -> Result<Vec<BehaviorEvent>, BehaviorError> {
        let event = match self.normalizer.normalize(raw) {
            Ok(event) => event,
            Err(e) => {
                self.stats.rejected += 1;
                tracing::warn!(
                    kind = %raw.kind,
                    timestamp_ms = raw.timestamp_ms,
                    error = %e,
                    "primitive rejected"
                );
                return Err(e);
            }
        };
        self.stats.accepted += 1;

        let mut emitted = Vec::new();
        self.classifier.handle(event, &mut emitted);
        self.dispatch(&emitted);
        Ok(emitted)
    }

    /// Ingest one JSON-encoded primitive
    pub fn ingest_json(&mut self, json: &str) -> Result<Vec<BehaviorEvent>, BehaviorError> {
        match parse_primitive(json) {
            Ok(raw) => self.ingest(&raw),
            Err(e) => {
                self.stats.rejected += 1;
                tracing::warn!(error = %e, "primitive rejected");
                Err(e)
            }
        }
    }

    /// Fire timers due at the clock's current time
    pub fn tick(&mut self) -> Vec<BehaviorEvent> {
        let now = self.clock.now_ms();
        self.advance_to(now)
    }

    /// Fire timers due at or before `now_ms`
    pub fn advance_to(&mut self, now_ms: i64) -> Vec<BehaviorEvent> {
        let mut emitted = Vec::new();
        self.classifier.advance_to(now_ms, &mut emitted);
        self.dispatch(&emitted);
        emitted
    }

    /// Ordered contents of one window
    pub fn events_in(&self, window_kind: &str) -> Result<Vec<BehaviorEvent>, BehaviorError> {
        self.reader().events_in(window_kind)
    }

    /// Compute the feature vector of one window. Does not touch the baselines.
    pub fn derive_features(&self, window_kind: &str) -> Result<FeatureVector, BehaviorError> {
        let window = self.reader().snapshot(window_kind)?;
        let events = window.events();
        Ok(self.deriver.derive(
            window_kind,
            window.duration_ms(),
            &events,
            self.clock.now_ms(),
            self.scorer.as_ref(),
        ))
    }

    /// Derive features, compare them with the window's baseline and fold them into it
    pub fn snapshot(&mut self, window_kind: &str) -> Result<ContextualFeatures, BehaviorError> {
        let features = self.derive_features(window_kind)?;
        Ok(self.baselines.update_and_contextualize(features))
    }

    /// [`snapshot`](Self::snapshot) encoded as feature snapshot JSON
    pub fn snapshot_json(&mut self, window_kind: &str) -> Result<String, BehaviorError> {
        let contextual = self.snapshot(window_kind)?;
        self.encoder.encode_to_json(&contextual)
    }

    pub fn baselines(&self, window_kind: &str) -> Baselines {
        self.baselines.baselines(window_kind)
    }

    pub fn save_baselines(&self) -> Result<String, BehaviorError> {
        self.baselines.to_json().map_err(BehaviorError::JsonError)
    }

    pub fn load_baselines(&mut self, json: &str) -> Result<(), BehaviorError> {
        self.baselines = BaselineStore::from_json(json)?;
        Ok(())
    }

    pub fn clear_baselines(&mut self) {
        self.baselines.clear();
    }

    /// Force-finalize every gesture and typing session, then start a new session
    pub fn end_session(&mut self) -> Vec<BehaviorEvent> {
        let emitted = self.flush();
        let previous = self.classifier.session_id().to_string();
        let next = Uuid::new_v4().to_string();
        self.classifier.set_session_id(&next);
        tracing::info!(
            session_id = %previous,
            next_session_id = %next,
            flushed = emitted.len(),
            "session ended"
        );
        emitted
    }

    /// Force-finalize in-flight gestures, then empty every window and reset ordering
    pub fn clear(&mut self) -> Vec<BehaviorEvent> {
        let emitted = self.flush();
        self.classifier.reset();
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.normalizer.reset();
        self.stats = IngestStats::default();
        tracing::info!(flushed = emitted.len(), "engine cleared");
        emitted
    }

    fn flush(&mut self) -> Vec<BehaviorEvent> {
        let now = self.clock.now_ms();
        let at = self
            .normalizer
            .last_timestamp_ms()
            .map_or(now, |last| last.max(now));
        let mut emitted = Vec::new();
        self.classifier.flush(at, &mut emitted);
        self.dispatch(&emitted);
        emitted
    }

    fn dispatch(&mut self, events: &[BehaviorEvent]) {
        if events.is_empty() {
            return;
        }
        {
            let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
            for event in events {
                windows.add_event(event);
            }
        }
        for event in events {
            tracing::debug!(
                event_type = event.kind.as_str(),
                timestamp_ms = event.timestamp_ms,
                "behavior event emitted"
            );
            for listener in &mut self.listeners {
                listener(event);
            }
        }
        self.stats.emitted += events.len() as u64;
    }
}
