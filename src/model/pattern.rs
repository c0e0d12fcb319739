use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::network::Mlp;
use crate::encoder::FeatureVector;
use crate::feedback::{FeedbackRecord, Outcome};
use crate::kernel::config::ModelConfig;
use crate::kernel::error::{ConfigError, EngineError};
use crate::suggestion::{ActionCategory, CategoryRegistry};

/// Keeps the negative-label gradient finite when the shown category already has p ~ 1.
const NEGATIVE_DENOM_FLOOR: f32 = 1e-4;

/// Learned parameters plus the bookkeeping that makes replay safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// Bumped on every gradient step.
    pub version: u64,
    /// Highest feedback sequence number already applied.
    pub watermark: u64,
    pub trained_records: u64,
    /// Output order of the network.
    pub categories: Vec<ActionCategory>,
    pub network: Mlp,
}

/// Category -> probability, in registry order. Sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    probabilities: Vec<(ActionCategory, f32)>,
}

impl Prediction {
    pub fn new(probabilities: Vec<(ActionCategory, f32)>) -> Self {
        Self { probabilities }
    }

    pub fn probability(&self, category: &ActionCategory) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ActionCategory, f32)> {
        self.probabilities.iter()
    }

    /// Highest `m` categories, probability descending, category id on ties.
    pub fn top(&self, m: usize) -> Vec<(ActionCategory, f32)> {
        let mut ranked = self.probabilities.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(m);
        ranked
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

pub struct PatternModel {
    config: ModelConfig,
    state: ModelState,
}

impl PatternModel {
    /// Fresh, untrained model. Weights depend only on the configured seed.
    pub fn new(config: ModelConfig, input_dim: usize, registry: &CategoryRegistry) -> Self {
        let categories: Vec<ActionCategory> = registry.categories().cloned().collect();
        let network = Mlp::new(input_dim, config.hidden_units, categories.len(), config.seed);
        Self {
            config,
            state: ModelState {
                version: 0,
                watermark: 0,
                trained_records: 0,
                categories,
                network,
            },
        }
    }

    /// Adopts a persisted state, refusing one whose shape no longer fits this engine.
    pub fn from_state(
        config: ModelConfig,
        state: ModelState,
        input_dim: usize,
        registry: &CategoryRegistry,
    ) -> Result<Self, EngineError> {
        if !state.network.is_consistent() {
            return Err(EngineError::ModelUnavailable("network shapes are inconsistent".into()));
        }
        if state.network.input_dim() != input_dim {
            return Err(EngineError::ModelUnavailable(format!(
                "snapshot expects {} features, encoder produces {}",
                state.network.input_dim(),
                input_dim
            )));
        }
        let expected: Vec<&ActionCategory> = registry.categories().collect();
        let stored: Vec<&ActionCategory> = state.categories.iter().collect();
        if expected != stored || state.network.output_dim() != expected.len() {
            return Err(EngineError::ModelUnavailable(
                "snapshot categories differ from the registry".into(),
            ));
        }
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn watermark(&self) -> u64 {
        self.state.watermark
    }

    pub fn trained_records(&self) -> u64 {
        self.state.trained_records
    }

    /// Marks everything up to `seq` as already seen without training on it.
    pub fn advance_watermark(&mut self, seq: u64) {
        self.state.watermark = self.state.watermark.max(seq);
    }

    /// 0 until `min_feedback` records have been learned, then rising linearly
    /// to 1 over the next `min_feedback`.
    pub fn cold_start_weight(&self) -> f32 {
        let min = self.config.min_feedback;
        if min == 0 {
            return 1.0;
        }
        let past = self.state.trained_records.saturating_sub(min);
        (past as f32 / min as f32).min(1.0)
    }

    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        if features.dim() != self.state.network.input_dim() {
            warn!(
                expected = self.state.network.input_dim(),
                got = features.dim(),
                "feature dimension mismatch, model abstains"
            );
            return Prediction::new(Vec::new());
        }
        let acts = self.state.network.forward(features.as_slice());
        Prediction::new(
            self.state
                .categories
                .iter()
                .cloned()
                .zip(acts.probabilities)
                .collect(),
        )
    }

    /// Raw single gradient step. `weight` scales the step (multi-source suggestions use > 1).
    ///
    /// Accepted: cross-entropy toward the shown category.
    /// Ignored / timed out: `-s * ln(1 - p_c)`, pushing mass away from the shown category.
    pub fn update(
        &mut self,
        features: &FeatureVector,
        category: &ActionCategory,
        outcome: Outcome,
        weight: f32,
    ) -> Result<&ModelState, EngineError> {
        let target = self
            .state
            .categories
            .iter()
            .position(|c| c == category)
            .ok_or_else(|| ConfigError::UnknownCategory(category.to_string()))?;
        if features.dim() != self.state.network.input_dim() {
            return Err(EngineError::ModelUnavailable(format!(
                "feature dimension {} does not match {}",
                features.dim(),
                self.state.network.input_dim()
            )));
        }

        let x = features.as_slice();
        let acts = self.state.network.forward(x);
        let p = &acts.probabilities;

        let grad: Vec<f32> = if outcome.is_positive() {
            p.iter()
                .enumerate()
                .map(|(j, pj)| if j == target { pj - 1.0 } else { *pj })
                .collect()
        } else {
            let s = self.config.negative_scale;
            let pc = p[target];
            let denom = (1.0 - pc).max(NEGATIVE_DENOM_FLOOR);
            p.iter()
                .enumerate()
                .map(|(j, pj)| if j == target { s * pc } else { -s * pc * pj / denom })
                .collect()
        };

        let lr = self.config.learning_rate * weight;
        self.state.network.backward(x, &acts, &grad, lr);
        self.state.version += 1;
        self.state.trained_records += 1;

        debug!(
            category = %category,
            outcome = %outcome,
            version = self.state.version,
            "model updated"
        );
        Ok(&self.state)
    }

    /// At-most-once entry point. Records at or below the watermark are skipped.
    /// Returns whether a gradient step was taken.
    pub fn apply(&mut self, record: &FeedbackRecord) -> bool {
        if record.seq <= self.state.watermark {
            return false;
        }
        let weight = if record.multi_source {
            self.config.multi_source_boost
        } else {
            1.0
        };
        let applied = match self.update(&record.features, &record.category, record.outcome, weight)
        {
            Ok(_) => true,
            Err(e) => {
                warn!(seq = record.seq, error = %e, "feedback record not trainable, skipped");
                false
            }
        };
        self.state.watermark = record.seq;
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::default_categories;

    fn model() -> PatternModel {
        let registry = CategoryRegistry::new(default_categories()).unwrap();
        PatternModel::new(ModelConfig::default(), 6, &registry)
    }

    #[test]
    fn prediction_is_a_distribution() {
        let m = model();
        let p = m.predict(&FeatureVector::new(vec![0.1, 0.2, 0.0, 1.0, 0.5, 0.0]));
        let sum: f32 = p.iter().map(|(_, v)| v).sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(p.top(2).len(), 2);
    }

    #[test]
    fn negative_feedback_lowers_probability() {
        let mut m = model();
        let x = FeatureVector::new(vec![1.0, 0.0, 0.5, 0.0, 0.0, 1.0]);
        let cat = ActionCategory::from("show-tip");
        let before = m.predict(&x).probability(&cat).unwrap();
        m.update(&x, &cat, Outcome::Ignored, 1.0).unwrap();
        let after = m.predict(&x).probability(&cat).unwrap();
        assert!(after < before);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut m = model();
        let x = FeatureVector::zeros(6);
        assert!(m
            .update(&x, &ActionCategory::from("nope"), Outcome::Accepted, 1.0)
            .is_err());
        assert_eq!(m.version(), 0);
    }

    #[test]
    fn cold_start_ramps_linearly() {
        let mut m = model();
        assert_eq!(m.cold_start_weight(), 0.0);
        let x = FeatureVector::zeros(6);
        for _ in 0..20 {
            m.update(&x, &"run-build".into(), Outcome::Accepted, 1.0).unwrap();
        }
        assert_eq!(m.cold_start_weight(), 0.0);
        for _ in 0..10 {
            m.update(&x, &"run-build".into(), Outcome::Accepted, 1.0).unwrap();
        }
        assert!((m.cold_start_weight() - 0.5).abs() < 1e-6);
        for _ in 0..30 {
            m.update(&x, &"run-build".into(), Outcome::Accepted, 1.0).unwrap();
        }
        assert_eq!(m.cold_start_weight(), 1.0);
    }
}
