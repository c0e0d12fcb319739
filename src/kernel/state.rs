use crate::context::ContextStore;
use crate::encoder::FeatureEncoder;
use crate::feedback::{FeedbackLoop, RestoreReport};
use crate::fusion::{SuggestionFuser, SuppressionWindow};
use crate::model::PatternModel;
use crate::rules::RuleEngine;
use crate::session::SessionTracker;
use crate::suggestion::CategoryRegistry;

use super::config::EngineConfig;
use super::telemetry::TelemetryRecorder;

/// Everything the cycle pipeline and the feedback path share.
/// Owned by one `Engine` and only reached through its lock.
pub struct EngineState {
    pub config: EngineConfig,
    pub registry: CategoryRegistry,
    pub store: ContextStore,
    pub encoder: FeatureEncoder,
    pub model: PatternModel,
    pub rules: RuleEngine,
    pub fuser: SuggestionFuser,
    pub suppression: SuppressionWindow,
    pub sessions: SessionTracker,
    pub feedback: FeedbackLoop,
    pub telemetry: TelemetryRecorder,
    /// What startup recovery found.
    pub restored: RestoreReport,
}

impl EngineState {
    /// True when the model could not be restored and learning starts from scratch.
    pub fn is_model_cold(&self) -> bool {
        self.restored.model_unavailable.is_some() || self.model.trained_records() == 0
    }
}
