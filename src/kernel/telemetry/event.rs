use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feedback::Outcome;
use crate::kernel::time::Millis;
use crate::suggestion::{ActionCategory, SuggestionSource};

// Allowed: ids, category ids, counts, durations, enums.
// Forbidden: window titles, file paths, descriptions, payloads, feature values.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    CycleCompleted {
        rule_candidates: u32,
        model_candidates: u32,
        llm_candidates: u32,
        proposed: bool,
        latency_us: u64,
    },

    SuggestionProposed {
        session_id: Uuid,
        category: ActionCategory,
        source: SuggestionSource,
        multi_source: bool,
    },

    SessionResolved {
        session_id: Uuid,
        outcome: Outcome,
        response_ms: Millis,
    },

    /// A proposal arrived while another session was outstanding.
    ProposalDropped { active: Uuid },

    CandidateSource(CandidateSourceEvent),

    EncodingFailed,

    PersistenceFailure { target: PersistenceTarget },

    Learning(LearningEvent),

    ActionFailed { category: ActionCategory },

    ModelSnapshotSaved { version: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSourceEvent {
    TimedOut { cutoff_ms: u64 },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceTarget {
    FeedbackLog,
    ModelSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningEvent {
    Suspended,
    Resumed,
}
