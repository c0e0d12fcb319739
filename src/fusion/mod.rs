//! Merges rule, model and language-model candidates into at most a handful of ranked suggestions.

pub mod suppression;

pub use suppression::SuppressionWindow;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::kernel::config::FusionConfig;
use crate::kernel::time::Millis;
use crate::model::Prediction;
use crate::suggestion::{
    render_description, ActionCategory, ActionContext, CategoryRegistry, Suggestion,
    SuggestionSource,
};

/// Candidates gathered for one cycle.
pub struct FusionInput<'a> {
    pub rules: Vec<Suggestion>,
    pub prediction: Option<&'a Prediction>,
    /// Scales model probabilities; 0 while the model is cold.
    pub cold_start_weight: f32,
    pub llm: Vec<Suggestion>,
    /// Used to resolve payloads for model-sourced candidates.
    pub action_ctx: ActionContext<'a>,
}

pub struct SuggestionFuser {
    config: FusionConfig,
    registry: CategoryRegistry,
}

impl SuggestionFuser {
    pub fn new(config: FusionConfig, registry: CategoryRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Top-M categories above the floor, scaled by the cold-start weight.
    pub fn model_candidates(
        &self,
        prediction: &Prediction,
        cold_start_weight: f32,
        action_ctx: &ActionContext<'_>,
    ) -> Vec<Suggestion> {
        prediction
            .top(self.config.top_m)
            .into_iter()
            .filter(|(_, p)| *p >= self.config.confidence_floor)
            .filter_map(|(category, p)| {
                let scaled = p * cold_start_weight;
                if scaled <= 0.0 {
                    return None;
                }
                let spec = self.registry.spec(&category)?;
                let payload = spec.action.resolve(action_ctx)?;
                let description = render_description(&spec.description, &payload);
                Some(Suggestion::new(
                    category,
                    description,
                    SuggestionSource::Model,
                    scaled,
                    payload,
                ))
            })
            .collect()
    }

    /// Best first. Empty when nothing survives; that is a normal outcome.
    pub fn fuse(
        &self,
        input: FusionInput<'_>,
        suppression: &SuppressionWindow,
        now: Millis,
    ) -> Vec<Suggestion> {
        let FusionInput {
            rules,
            prediction,
            cold_start_weight,
            llm,
            action_ctx,
        } = input;

        let model = prediction
            .map(|p| self.model_candidates(p, cold_start_weight, &action_ctx))
            .unwrap_or_default();

        // === 1. MERGE by category ===
        let mut merged: BTreeMap<ActionCategory, Suggestion> = BTreeMap::new();
        for candidate in rules.into_iter().chain(model).chain(llm) {
            if !self.registry.contains(&candidate.category) {
                debug!(category = %candidate.category, "dropping unregistered candidate");
                continue;
            }
            match merged.get_mut(&candidate.category) {
                None => {
                    merged.insert(candidate.category.clone(), candidate);
                }
                Some(existing) => merge_into(existing, candidate),
            }
        }

        // === 2. RANK ===
        let mut ranked: Vec<Suggestion> = merged.into_values().collect();
        ranked.sort_by(rank_order);

        // === 3. SUPPRESS + TRUNCATE ===
        ranked.retain(|s| !suppression.is_suppressed(&s.category, now));
        ranked.truncate(self.config.max_suggestions);
        ranked
    }
}

/// Keeps the higher confidence (source priority on ties), the union of sources
/// and the winning rule's id.
fn merge_into(existing: &mut Suggestion, candidate: Suggestion) {
    let mut sources = existing.sources.clone();
    sources.extend(candidate.sources.iter().copied());

    let wins = match candidate.confidence.total_cmp(&existing.confidence) {
        Ordering::Greater => true,
        Ordering::Equal => candidate.source < existing.source,
        Ordering::Less => false,
    };
    // Credit goes to the rule whose payload is shown.
    let rule_id = if wins {
        candidate.rule_id.clone().or_else(|| existing.rule_id.take())
    } else {
        existing.rule_id.take().or_else(|| candidate.rule_id.clone())
    };
    if wins {
        *existing = candidate;
    }
    existing.sources = sources;
    existing.rule_id = rule_id;
}

fn rank_order(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.category.cmp(&b.category))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSnapshot, ContextStore};
    use crate::suggestion::{default_categories, ActionPayload};

    fn candidate(cat: &str, source: SuggestionSource, confidence: f32) -> Suggestion {
        Suggestion::new(cat.into(), cat, source, confidence, ActionPayload::None)
    }

    #[test]
    fn ties_prefer_rules_then_category() {
        let a = candidate("show-tip", SuggestionSource::Llm, 0.5);
        let b = candidate("take-break", SuggestionSource::Rule, 0.5);
        let c = candidate("run-build", SuggestionSource::Llm, 0.5);
        let mut v = vec![a, b, c];
        v.sort_by(rank_order);
        let order: Vec<&str> = v.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(order, vec!["take-break", "run-build", "show-tip"]);
    }

    #[test]
    fn merge_keeps_max_and_unions_sources() {
        let mut existing = candidate("run-build", SuggestionSource::Rule, 0.4)
            .with_rule("build-after-save".into());
        merge_into(&mut existing, candidate("run-build", SuggestionSource::Model, 0.7));
        assert_eq!(existing.confidence, 0.7);
        assert_eq!(existing.source, SuggestionSource::Model);
        assert!(existing.is_multi_source());
        assert_eq!(existing.rule_id.as_ref().map(|r| r.as_str()), Some("build-after-save"));
    }

    #[test]
    fn empty_sources_fuse_to_empty() {
        let registry = CategoryRegistry::new(default_categories()).unwrap();
        let fuser = SuggestionFuser::new(FusionConfig::default(), registry);
        let snap = ContextSnapshot::builder(0).build();
        let store = ContextStore::new(4);
        let input = FusionInput {
            rules: vec![],
            prediction: None,
            cold_start_weight: 1.0,
            llm: vec![],
            action_ctx: ActionContext::new(&snap, &store),
        };
        assert!(fuser.fuse(input, &SuppressionWindow::new(1_000), 0).is_empty());
    }
}
