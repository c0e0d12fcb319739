use std::collections::{BTreeMap, VecDeque};

use super::event::{CandidateSourceEvent, LearningEvent, TelemetryEvent};
use crate::feedback::Outcome;
use crate::suggestion::SuggestionSource;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub feedback: FeedbackStats,
    pub cycles: CycleStats,
    pub proposals: ProposalStats,
    pub health: HealthStats,
}

/// Followed / ignored bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackStats {
    pub total: u64,
    pub accepted: u64,
    pub ignored: u64,
    pub timed_out: u64,
    pub acceptance_rate: f64,
    pub avg_response_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    pub count: u64,
    pub proposed: u64,
    pub avg_latency_us: f64,
    pub max_latency_us: u64,
    pub llm_timeouts: u64,
    pub llm_failures: u64,
    pub encoding_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalStats {
    pub by_source: BTreeMap<SuggestionSource, u64>,
    pub multi_source: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthStats {
    pub persistence_failures: u64,
    pub learning_suspensions: u64,
    pub learning_resumptions: u64,
    pub action_failures: u64,
    pub snapshots_saved: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    let mut total_latency_us: u64 = 0;
    let mut total_response_ms: i64 = 0;

    for event in events {
        match event {
            TelemetryEvent::CycleCompleted {
                proposed,
                latency_us,
                ..
            } => {
                snap.cycles.count += 1;
                if *proposed {
                    snap.cycles.proposed += 1;
                }
                total_latency_us = total_latency_us.saturating_add(*latency_us);
                snap.cycles.max_latency_us = snap.cycles.max_latency_us.max(*latency_us);
            }
            TelemetryEvent::SuggestionProposed {
                source,
                multi_source,
                ..
            } => {
                *snap.proposals.by_source.entry(*source).or_insert(0) += 1;
                if *multi_source {
                    snap.proposals.multi_source += 1;
                }
            }
            TelemetryEvent::SessionResolved {
                outcome,
                response_ms,
                ..
            } => {
                snap.feedback.total += 1;
                match outcome {
                    Outcome::Accepted => snap.feedback.accepted += 1,
                    Outcome::Ignored => snap.feedback.ignored += 1,
                    Outcome::TimedOut => snap.feedback.timed_out += 1,
                }
                total_response_ms = total_response_ms.saturating_add(*response_ms);
            }
            TelemetryEvent::ProposalDropped { .. } => snap.proposals.dropped += 1,
            TelemetryEvent::CandidateSource(CandidateSourceEvent::TimedOut { .. }) => {
                snap.cycles.llm_timeouts += 1
            }
            TelemetryEvent::CandidateSource(CandidateSourceEvent::Failed) => {
                snap.cycles.llm_failures += 1
            }
            TelemetryEvent::EncodingFailed => snap.cycles.encoding_failures += 1,
            TelemetryEvent::PersistenceFailure { .. } => snap.health.persistence_failures += 1,
            TelemetryEvent::Learning(LearningEvent::Suspended) => {
                snap.health.learning_suspensions += 1
            }
            TelemetryEvent::Learning(LearningEvent::Resumed) => {
                snap.health.learning_resumptions += 1
            }
            TelemetryEvent::ActionFailed { .. } => snap.health.action_failures += 1,
            TelemetryEvent::ModelSnapshotSaved { .. } => snap.health.snapshots_saved += 1,
        }
    }

    if snap.cycles.count > 0 {
        snap.cycles.avg_latency_us = total_latency_us as f64 / snap.cycles.count as f64;
    }
    if snap.feedback.total > 0 {
        snap.feedback.acceptance_rate = snap.feedback.accepted as f64 / snap.feedback.total as f64;
        snap.feedback.avg_response_ms = total_response_ms as f64 / snap.feedback.total as f64;
    }

    snap
}
