use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::action::ActionPayload;
use super::category::ActionCategory;
use crate::rules::RuleId;

/// Which candidate source produced a suggestion.
/// Declaration order is the tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Rule,
    Model,
    Llm,
}

impl SuggestionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionSource::Rule => "rule",
            SuggestionSource::Model => "model",
            SuggestionSource::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: ActionCategory,
    pub description: String,
    /// The source whose confidence won when candidates were merged.
    pub source: SuggestionSource,
    /// Every source that proposed this category in the cycle.
    pub sources: BTreeSet<SuggestionSource>,
    /// Always within [0, 1].
    pub confidence: f32,
    pub payload: ActionPayload,
    /// Set when a rule proposed (or co-proposed) the category.
    pub rule_id: Option<RuleId>,
}

impl Suggestion {
    pub fn new(
        category: ActionCategory,
        description: impl Into<String>,
        source: SuggestionSource,
        confidence: f32,
        payload: ActionPayload,
    ) -> Self {
        Self {
            category,
            description: description.into(),
            source,
            sources: BTreeSet::from([source]),
            confidence: clamp_unit(confidence),
            payload,
            rule_id: None,
        }
    }

    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn has_source(&self, source: SuggestionSource) -> bool {
        self.sources.contains(&source)
    }

    pub fn is_multi_source(&self) -> bool {
        self.sources.len() > 1
    }
}

pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
