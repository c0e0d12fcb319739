use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encoder::FeatureVector;
use crate::kernel::time::Millis;
use crate::rules::RuleId;
use crate::suggestion::{ActionCategory, SuggestionSource};

/// How a presented suggestion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Ignored,
    TimedOut,
}

impl Outcome {
    pub fn is_positive(self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Ignored => "ignored",
            Outcome::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the feedback log. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Strictly increasing across the log; the model watermark is expressed in it.
    pub seq: u64,
    pub session_id: Uuid,
    /// Snapshot the suggestion was produced from.
    pub snapshot_id: Uuid,
    pub timestamp_ms: Millis,
    pub category: ActionCategory,
    pub outcome: Outcome,
    pub sources: BTreeSet<SuggestionSource>,
    pub rule_id: Option<RuleId>,
    pub multi_source: bool,
    pub feature_digest: u64,
    pub features: FeatureVector,
}

impl FeedbackRecord {
    pub fn involves_rule(&self) -> bool {
        self.sources.contains(&SuggestionSource::Rule) && self.rule_id.is_some()
    }
}
