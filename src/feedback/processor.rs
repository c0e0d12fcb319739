use tracing::{error, info, warn};

use super::record::FeedbackRecord;
use crate::context::ContextStore;
use crate::fusion::SuppressionWindow;
use crate::kernel::config::ModelConfig;
use crate::kernel::error::{EngineError, PersistenceError};
use crate::model::PatternModel;
use crate::rules::RuleEngine;
use crate::session::ResolvedSession;
use crate::storage::{FeedbackLog, RetryPolicy, SnapshotStore};
use crate::suggestion::CategoryRegistry;

/// Everything a resolution may touch, borrowed from the engine state for one call.
pub struct Learners<'a> {
    pub model: &'a mut PatternModel,
    pub rules: &'a mut RuleEngine,
    pub store: &'a mut ContextStore,
    pub suppression: &'a mut SuppressionWindow,
}

/// What one resolution did.
#[derive(Debug, Clone)]
pub struct FeedbackReport {
    pub record: FeedbackRecord,
    pub persisted: bool,
    pub model_updated: bool,
    pub rule_weight: Option<f32>,
    pub snapshot_saved: bool,
    /// Learning switched state during this call: `Some(true)` suspended, `Some(false)` resumed.
    pub learning_changed: Option<bool>,
    pub persistence_error: Option<String>,
}

/// Result of startup recovery.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub records: usize,
    pub replayed: usize,
    /// The snapshot could not be used and a fresh model was started.
    pub model_unavailable: Option<String>,
}

/// Turns resolved sessions into durable records and then into learning.
pub struct FeedbackLoop {
    log: Box<dyn FeedbackLog>,
    snapshots: Box<dyn SnapshotStore>,
    retry: RetryPolicy,
    snapshot_every: u64,
    next_seq: u64,
    since_save: u64,
    suspended: bool,
}

impl FeedbackLoop {
    pub fn new(
        log: Box<dyn FeedbackLog>,
        snapshots: Box<dyn SnapshotStore>,
        retry: RetryPolicy,
        snapshot_every: u64,
    ) -> Self {
        Self {
            log,
            snapshots,
            retry,
            snapshot_every: snapshot_every.max(1),
            next_seq: 1,
            since_save: 0,
            suspended: false,
        }
    }

    pub fn is_learning_suspended(&self) -> bool {
        self.suspended
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Startup: load the snapshot, replay newer log records into it and
    /// rebuild rule weights from the whole log.
    pub fn restore(
        &mut self,
        config: &ModelConfig,
        input_dim: usize,
        registry: &CategoryRegistry,
        rules: &mut RuleEngine,
    ) -> (PatternModel, RestoreReport) {
        let records = self.log.load_all().unwrap_or_else(|e| {
            error!(error = %e, "feedback log unreadable, starting without history");
            Vec::new()
        });
        let last_seq = records.iter().map(|r| r.seq).max().unwrap_or(0);
        self.next_seq = last_seq + 1;

        let mut report = RestoreReport {
            records: records.len(),
            ..RestoreReport::default()
        };

        let loaded = self
            .snapshots
            .load()
            .map_err(|e| EngineError::ModelUnavailable(e.to_string()))
            .and_then(|state| match state {
                Some(state) => {
                    PatternModel::from_state(config.clone(), state, input_dim, registry).map(Some)
                }
                None => Ok(None),
            });

        let mut model = match loaded {
            Ok(Some(model)) => model,
            Ok(None) => PatternModel::new(config.clone(), input_dim, registry),
            Err(e) => {
                warn!(error = %e, "model snapshot unusable, continuing with a cold model");
                report.model_unavailable = Some(e.to_string());
                let mut fresh = PatternModel::new(config.clone(), input_dim, registry);
                fresh.advance_watermark(last_seq);
                fresh
            }
        };

        for record in &records {
            if model.apply(record) {
                report.replayed += 1;
            }
        }
        rules.replay(&records);

        info!(
            records = report.records,
            replayed = report.replayed,
            watermark = model.watermark(),
            trained = model.trained_records(),
            "feedback history restored"
        );
        (model, report)
    }

    /// Persist first, then learn. Exactly one record per call.
    pub async fn resolve(
        &mut self,
        resolved: ResolvedSession,
        learners: Learners<'_>,
    ) -> FeedbackReport {
        let ResolvedSession {
            session,
            outcome,
            resolved_at,
        } = resolved;
        let suggestion = session.suggestion;

        let record = FeedbackRecord {
            seq: self.next_seq,
            session_id: session.id,
            snapshot_id: session.origin.id,
            timestamp_ms: resolved_at,
            multi_source: suggestion.is_multi_source(),
            category: suggestion.category,
            outcome,
            sources: suggestion.sources,
            rule_id: suggestion.rule_id,
            feature_digest: session.features.digest(),
            features: session.features,
        };
        self.next_seq += 1;

        let mut report = FeedbackReport {
            record,
            persisted: false,
            model_updated: false,
            rule_weight: None,
            snapshot_saved: false,
            learning_changed: None,
            persistence_error: None,
        };

        // === 1. PERSIST ===
        let log = &mut self.log;
        let to_write = &report.record;
        let appended = self.retry.run("feedback append", || log.append(to_write)).await;
        match appended {
            Ok(()) => {
                report.persisted = true;
                if self.suspended {
                    self.suspended = false;
                    report.learning_changed = Some(false);
                    info!("feedback log writable again, learning resumed");
                }
            }
            Err(e) => {
                error!(seq = report.record.seq, error = %e, "feedback record not persisted");
                report.persistence_error = Some(e.to_string());
                if !self.suspended {
                    self.suspended = true;
                    report.learning_changed = Some(true);
                    warn!("learning suspended until the feedback log accepts writes");
                }
            }
        }

        // === 2. LEARN (only from durable records) ===
        if report.persisted {
            report.model_updated = learners.model.apply(&report.record);
            if report.record.involves_rule() {
                if let Some(id) = &report.record.rule_id {
                    report.rule_weight = learners.rules.adjust(id, report.record.outcome);
                }
            }
        }

        // === 3. SUPPRESS + REMEMBER ===
        if !outcome.is_positive() {
            learners
                .suppression
                .suppress(report.record.category.clone(), resolved_at);
        }
        learners.store.append(session.origin);

        // === 4. SNAPSHOT cadence ===
        if report.model_updated {
            self.since_save += 1;
            if self.since_save >= self.snapshot_every {
                match self.save_model(learners.model).await {
                    Ok(()) => report.snapshot_saved = true,
                    Err(e) => {
                        report.persistence_error.get_or_insert(e.to_string());
                    }
                }
            }
        }

        report
    }

    /// Writes the model snapshot with the same retry policy as records.
    pub async fn save_model(&mut self, model: &PatternModel) -> Result<(), PersistenceError> {
        let snapshots = &mut self.snapshots;
        let state = model.state();
        let result = self
            .retry
            .run("model snapshot", || snapshots.save(state))
            .await;
        match &result {
            Ok(()) => {
                self.since_save = 0;
                info!(version = state.version, watermark = state.watermark, "model snapshot saved");
            }
            Err(e) => error!(error = %e, "model snapshot not saved"),
        }
        result
    }
}
