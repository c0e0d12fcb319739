use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::predicate::{Predicate, RuleContext};
use crate::feedback::{FeedbackRecord, Outcome};
use crate::kernel::config::RulesConfig;
use crate::suggestion::{
    clamp_unit, render_description, ActionCategory, ActionContext, ActionTemplate,
    CategoryRegistry, Suggestion, SuggestionSource,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A deterministic predicate -> category mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    /// Lower runs first.
    pub priority: u32,
    pub category: ActionCategory,
    pub base_confidence: f32,
    pub predicate: Predicate,
    /// Overrides the category's action template.
    #[serde(default)]
    pub action: Option<ActionTemplate>,
    /// Overrides the category's description template.
    #[serde(default)]
    pub description: Option<String>,
}

pub struct RuleEngine {
    rules: Vec<Rule>,
    weights: HashMap<RuleId, f32>,
    config: RulesConfig,
    registry: CategoryRegistry,
}

impl RuleEngine {
    pub fn new(config: RulesConfig, registry: CategoryRegistry) -> Self {
        let mut rules = config.table.clone();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Self {
            rules,
            weights: HashMap::new(),
            config,
            registry,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Current multiplier for `id`; 1.0 until feedback moves it.
    pub fn weight(&self, id: &RuleId) -> f32 {
        self.weights.get(id).copied().unwrap_or(1.0)
    }

    pub fn weights(&self) -> &HashMap<RuleId, f32> {
        &self.weights
    }

    /// First `max_matches` rules whose predicate holds and whose action resolves.
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Suggestion> {
        let action_ctx = ActionContext::new(ctx.current, ctx.store);
        let mut out = Vec::new();

        for rule in &self.rules {
            if out.len() >= self.config.max_matches {
                break;
            }
            if !rule.predicate.matches(ctx) {
                continue;
            }
            let Some(spec) = self.registry.spec(&rule.category) else {
                continue;
            };
            let template = rule.action.as_ref().unwrap_or(&spec.action);
            let Some(payload) = template.resolve(&action_ctx) else {
                debug!(rule = %rule.id, "rule matched but its action has no target");
                continue;
            };
            let description = render_description(
                rule.description.as_deref().unwrap_or(&spec.description),
                &payload,
            );
            let confidence = clamp_unit(rule.base_confidence * self.weight(&rule.id));
            out.push(
                Suggestion::new(
                    rule.category.clone(),
                    description,
                    SuggestionSource::Rule,
                    confidence,
                    payload,
                )
                .with_rule(rule.id.clone()),
            );
        }
        out
    }

    /// Multiplicative boost on accept, decay otherwise, clamped to the configured bounds.
    /// Ignored and timed-out outcomes are treated the same.
    pub fn adjust(&mut self, id: &RuleId, outcome: Outcome) -> Option<f32> {
        if !self.rules.iter().any(|r| &r.id == id) {
            return None;
        }
        let factor = if outcome.is_positive() {
            self.config.boost
        } else {
            self.config.decay
        };
        let next = (self.weight(id) * factor).clamp(self.config.min_weight, self.config.max_weight);
        self.weights.insert(id.clone(), next);
        debug!(rule = %id, outcome = %outcome, weight = next, "rule weight adjusted");
        Some(next)
    }

    /// Rebuilds weights from the feedback log, oldest record first.
    pub fn replay<'a>(&mut self, records: impl IntoIterator<Item = &'a FeedbackRecord>) {
        self.weights.clear();
        for record in records {
            if !record.involves_rule() {
                continue;
            }
            if let Some(id) = &record.rule_id {
                self.adjust(id, record.outcome);
            }
        }
    }
}
