//! Distraction scoring
//!
//! The scoring function is a strategy: anything implementing [`Scorer`] maps the twelve
//! feature inputs to `(distraction_score, focus_hint)`. [`LinearScorer`] is the default.

use crate::config::{ScoringConfig, SCORING_INPUTS};
use crate::error::BehaviorError;

/// Maps feature inputs to `(distraction_score, focus_hint)`
pub trait Scorer: Send + Sync {
    fn score(&self, inputs: &[f64]) -> Result<(f64, f64), BehaviorError>;
}

/// Focus is the damped complement of distraction
pub fn focus_from_distraction(distraction: f64) -> f64 {
    (1.0 - 0.8 * distraction).clamp(0.0, 1.0)
}

/// Weighted sum of the inputs plus bias, clamped to `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScorer {
    weights: [f64; SCORING_INPUTS],
    bias: f64,
}

impl LinearScorer {
    pub fn new(weights: [f64; SCORING_INPUTS], bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn from_config(config: &ScoringConfig) -> Result<Self, BehaviorError> {
        let weights: [f64; SCORING_INPUTS] =
            config
                .weights
                .as_slice()
                .try_into()
                .map_err(|_| BehaviorError::ScoringShapeMismatch {
                    expected: SCORING_INPUTS,
                    actual: config.weights.len(),
                })?;
        Ok(Self::new(weights, config.bias))
    }

    pub fn weights(&self) -> &[f64; SCORING_INPUTS] {
        &self.weights
    }
}

impl Default for LinearScorer {
    fn default() -> Self {
        let config = ScoringConfig::default();
        let mut weights = [0.0; SCORING_INPUTS];
        for (slot, weight) in weights.iter_mut().zip(config.weights) {
            *slot = weight;
        }
        Self::new(weights, config.bias)
    }
}

impl Scorer for LinearScorer {
    fn score(&self, inputs: &[f64]) -> Result<(f64, f64), BehaviorError> {
        if inputs.len() != SCORING_INPUTS {
            return Err(BehaviorError::ScoringShapeMismatch {
                expected: SCORING_INPUTS,
                actual: inputs.len(),
            });
        }
        let raw: f64 = self
            .weights
            .iter()
            .zip(inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        let distraction = if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok((distraction, focus_from_distraction(distraction)))
    }
}

/// Run a scorer, degrading to `(0, 0)` when it cannot score the inputs
pub fn score_or_default(scorer: &dyn Scorer, inputs: &[f64]) -> (f64, f64) {
    match scorer.score(inputs) {
        Ok((distraction, focus)) if distraction.is_finite() && focus.is_finite() => {
            (distraction.clamp(0.0, 1.0), focus.clamp(0.0, 1.0))
        }
        Ok(output) => {
            tracing::warn!(?output, "scorer produced non-finite output");
            (0.0, 0.0)
        }
        Err(e) => {
            tracing::warn!(error = %e, "scoring failed; using zero scores");
            (0.0, 0.0)
        }
    }
}
