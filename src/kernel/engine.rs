use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::EngineConfig;
use super::error::{EngineError, SessionError};
use super::state::EngineState;
use super::telemetry::event::{
    CandidateSourceEvent, LearningEvent, PersistenceTarget, TelemetryEvent,
};
use super::telemetry::{TelemetryRecorder, TelemetrySnapshot};
use super::time::{Clock, Millis, SystemClock};
use crate::context::{ContextSnapshot, ContextStore};
use crate::encoder::{FeatureEncoder, FeatureVector};
use crate::feedback::{FeedbackLoop, FeedbackRecord, Learners};
use crate::fusion::{FusionInput, SuggestionFuser, SuppressionWindow};
use crate::model::Prediction;
use crate::rules::{RuleContext, RuleEngine};
use crate::services::{
    ActionExecutor, CandidateRequest, CandidateSource, CategoryOption, LocalLlmSource,
    SystemExecutor,
};
use crate::session::{Decision, ResolvedSession, SessionState, SessionTracker};
use crate::storage::{
    FeedbackLog, FileSnapshotStore, JsonlFeedbackLog, RetryPolicy, SnapshotStore,
};
use crate::suggestion::{render_description, ActionContext, Suggestion};

/// The suggestion currently awaiting a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSuggestion {
    pub session_id: Uuid,
    pub suggestion: Suggestion,
    pub deadline: Millis,
}

/// What one `ingest` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Proposed(PendingSuggestion),
    /// Fusion came back empty.
    NoSuggestion,
    /// A suggestion was produced but another session is outstanding.
    Dropped { active: Uuid },
    /// Another cycle was in flight; the snapshot was only recorded.
    Busy,
    /// Snapshot id already seen.
    Duplicate,
    /// Older than the newest retained snapshot.
    Stale,
}

/// Explicit engine context. Cheap to clone; clones share one state.
#[derive(Clone)]
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    cycle_gate: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
    candidates: Option<Arc<dyn CandidateSource>>,
    executor: Arc<dyn ActionExecutor>,
}

pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    candidates: Option<Arc<dyn CandidateSource>>,
    executor: Option<Arc<dyn ActionExecutor>>,
    feedback_log: Option<Box<dyn FeedbackLog>>,
    snapshot_store: Option<Box<dyn SnapshotStore>>,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Overrides the configured language-model source.
    pub fn candidate_source(mut self, source: impl CandidateSource + 'static) -> Self {
        self.candidates = Some(Arc::new(source));
        self
    }

    pub fn executor(mut self, executor: impl ActionExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn feedback_log(mut self, log: impl FeedbackLog + 'static) -> Self {
        self.feedback_log = Some(Box::new(log));
        self
    }

    pub fn snapshot_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.snapshot_store = Some(Box::new(store));
        self
    }

    /// Validates the config, restores learned state and assembles the engine.
    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config;
        config.validate()?;
        let registry = config.registry()?;

        let encoder = FeatureEncoder::new(config.encoder.clone());
        let mut rules = RuleEngine::new(config.rules.clone(), registry.clone());

        let log = self
            .feedback_log
            .unwrap_or_else(|| Box::new(JsonlFeedbackLog::new(&config.storage.feedback_log)));
        let snapshots = self
            .snapshot_store
            .unwrap_or_else(|| Box::new(FileSnapshotStore::new(&config.storage.model_snapshot)));
        let retry = RetryPolicy::new(
            config.storage.retry_attempts,
            Duration::from_millis(config.storage.retry_base_ms),
        );
        let mut feedback = FeedbackLoop::new(log, snapshots, retry, config.storage.snapshot_every);
        let (model, restored) =
            feedback.restore(&config.model, encoder.dim(), &registry, &mut rules);

        let candidates = self.candidates.or_else(|| {
            config
                .llm
                .enabled
                .then(|| Arc::new(LocalLlmSource::new(config.llm.clone())) as Arc<dyn CandidateSource>)
        });
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(SystemExecutor::new(config.actions.clone())));

        let state = EngineState {
            store: ContextStore::new(config.context.capacity),
            fuser: SuggestionFuser::new(config.fusion.clone(), registry.clone()),
            suppression: SuppressionWindow::new(config.fusion.suppression_ms()),
            sessions: SessionTracker::new(
                config.session.deadline_ms(),
                config.session.resolved_history,
            ),
            telemetry: TelemetryRecorder::new(),
            encoder,
            model,
            rules,
            feedback,
            registry,
            restored,
            config,
        };

        info!(
            categories = state.registry.len(),
            rules = state.rules.rules().len(),
            features = state.encoder.dim(),
            llm = candidates.is_some(),
            "engine ready"
        );

        Ok(Engine {
            state: Arc::new(Mutex::new(state)),
            cycle_gate: Arc::new(Mutex::new(())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            candidates,
            executor,
        })
    }
}

/// Prepared in the first locked phase of a cycle, consumed in the last.
struct CyclePlan {
    features: FeatureVector,
    prediction: Prediction,
    cold_start_weight: f32,
    rule_candidates: Vec<Suggestion>,
    request: Option<CandidateRequest>,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: None,
            candidates: None,
            executor: None,
            feedback_log: None,
            snapshot_store: None,
        }
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    /// One context cycle: record the snapshot, then rules + model (+ LLM) -> fusion -> session.
    pub async fn ingest(&self, snapshot: ContextSnapshot) -> Result<CycleOutcome, EngineError> {
        let started = Instant::now();
        let gate = self.cycle_gate.try_lock().ok();

        // === 1. OBSERVE + PLAN (locked) ===
        let plan = {
            let mut guard = self.state.lock().await;
            let st = &mut *guard;

            if st.store.contains(&snapshot.id) {
                return Ok(CycleOutcome::Duplicate);
            }
            if let Some(latest) = st.store.latest() {
                if snapshot.timestamp_ms < latest.timestamp_ms {
                    debug!(id = %snapshot.id, "stale snapshot ignored");
                    return Ok(CycleOutcome::Stale);
                }
            }

            if let Some(followed) = st.sessions.followed_by(&snapshot) {
                let now = self.clock.now_ms();
                if let Ok(resolved) = st.sessions.resolve(followed, SessionState::Accepted, now) {
                    info!(session = %followed, "suggestion followed without explicit accept");
                    finish(st, resolved).await;
                }
            }

            let k = st.encoder.history_window();
            let mut history = st.store.window(k.saturating_sub(1));
            history.push(snapshot.clone());
            let features = match st.encoder.encode(&history) {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, "snapshot dropped, cannot encode");
                    st.telemetry.record(TelemetryEvent::EncodingFailed);
                    return Err(e.into());
                }
            };
            st.store.append(snapshot.clone());

            if gate.is_none() {
                return Ok(CycleOutcome::Busy);
            }

            let now = self.clock.now_ms();
            st.suppression.prune(now);

            let previous = history.len().checked_sub(2).map(|i| &history[i]);
            let rule_ctx = RuleContext::new(&snapshot, previous, &st.store)
                .with_utc_offset(st.config.encoder.utc_offset_minutes);
            let rule_candidates = st.rules.evaluate(&rule_ctx);
            let prediction = st.model.predict(&features);

            // No point asking a slow source while a decision is pending.
            let request = match (&self.candidates, st.sessions.state()) {
                (Some(_), SessionState::Idle) => Some(build_request(st, &snapshot, &features)),
                _ => None,
            };

            CyclePlan {
                features,
                prediction,
                cold_start_weight: st.model.cold_start_weight(),
                rule_candidates,
                request,
            }
        };

        // === 2. LLM (unlocked, bounded) ===
        let cutoff = self.llm_cutoff().await;
        let llm_candidates = match (&self.candidates, &plan.request) {
            (Some(source), Some(request)) => {
                match tokio::time::timeout(cutoff, source.request_candidates(request)).await {
                    Ok(Ok(found)) => Ok(found),
                    Ok(Err(e)) => {
                        warn!(source = source.name(), error = %e, "candidate source failed");
                        Err(TelemetryEvent::CandidateSource(CandidateSourceEvent::Failed))
                    }
                    Err(_) => {
                        let err = EngineError::CandidateSourceTimeout(cutoff);
                        debug!(source = source.name(), "{err}");
                        Err(TelemetryEvent::CandidateSource(CandidateSourceEvent::TimedOut {
                            cutoff_ms: cutoff.as_millis() as u64,
                        }))
                    }
                }
            }
            _ => Ok(Vec::new()),
        };

        // === 3. FUSE + PROPOSE (locked) ===
        let mut guard = self.state.lock().await;
        let st = &mut *guard;
        let llm_candidates = llm_candidates.unwrap_or_else(|event| {
            st.telemetry.record(event);
            Vec::new()
        });

        let rule_count = plan.rule_candidates.len() as u32;
        let llm_count = llm_candidates.len() as u32;
        let action_ctx = ActionContext::new(&snapshot, &st.store);
        let model_count = st
            .fuser
            .model_candidates(&plan.prediction, plan.cold_start_weight, &action_ctx)
            .len() as u32;
        let now = self.clock.now_ms();
        let fused = st.fuser.fuse(
            FusionInput {
                rules: plan.rule_candidates,
                prediction: Some(&plan.prediction),
                cold_start_weight: plan.cold_start_weight,
                llm: llm_candidates,
                action_ctx,
            },
            &st.suppression,
            now,
        );

        let outcome = match fused.into_iter().next() {
            None => CycleOutcome::NoSuggestion,
            Some(top) => match st.sessions.propose(top, plan.features, snapshot, now) {
                Ok(session) => {
                    let pending = PendingSuggestion {
                        session_id: session.id,
                        suggestion: session.suggestion.clone(),
                        deadline: session.deadline,
                    };
                    st.telemetry.record(TelemetryEvent::SuggestionProposed {
                        session_id: pending.session_id,
                        category: pending.suggestion.category.clone(),
                        source: pending.suggestion.source,
                        multi_source: pending.suggestion.is_multi_source(),
                    });
                    info!(
                        session = %pending.session_id,
                        category = %pending.suggestion.category,
                        source = pending.suggestion.source.as_str(),
                        confidence = pending.suggestion.confidence,
                        "suggestion proposed"
                    );
                    CycleOutcome::Proposed(pending)
                }
                Err(SessionError::Busy(active)) => {
                    st.telemetry.record(TelemetryEvent::ProposalDropped { active });
                    CycleOutcome::Dropped { active }
                }
                Err(e) => return Err(e.into()),
            },
        };

        st.telemetry.record(TelemetryEvent::CycleCompleted {
            rule_candidates: rule_count,
            model_candidates: model_count,
            llm_candidates: llm_count,
            proposed: matches!(outcome, CycleOutcome::Proposed(_)),
            latency_us: started.elapsed().as_micros() as u64,
        });
        drop(gate);
        Ok(outcome)
    }

    async fn llm_cutoff(&self) -> Duration {
        self.state.lock().await.config.llm.cutoff()
    }

    pub async fn current_suggestion(&self) -> Option<PendingSuggestion> {
        let st = self.state.lock().await;
        st.sessions.current().map(|s| PendingSuggestion {
            session_id: s.id,
            suggestion: s.suggestion.clone(),
            deadline: s.deadline,
        })
    }

    /// Explicit accept / dismiss. Each session resolves once; repeats are `SessionError`s.
    /// The state stays locked until feedback, learning and suppression are applied.
    pub async fn decide(
        &self,
        session_id: Uuid,
        decision: Decision,
    ) -> Result<FeedbackRecord, EngineError> {
        let now = self.clock.now_ms();
        let mut guard = self.state.lock().await;
        let st = &mut *guard;
        let mut resolved = st
            .sessions
            .resolve(session_id, decision.terminal_state(), now)?;

        if decision == Decision::Accept {
            let payload = &resolved.session.suggestion.payload;
            if let Err(e) = self.executor.execute(payload).await {
                warn!(session = %session_id, error = %e, "accepted action failed, recorded as ignored");
                resolved.downgrade_to_ignored();
                st.telemetry.record(TelemetryEvent::ActionFailed {
                    category: resolved.session.suggestion.category.clone(),
                });
            }
        }

        Ok(finish(st, resolved).await)
    }

    /// Times out the outstanding session if its deadline has passed.
    pub async fn expire_due(&self) -> Option<FeedbackRecord> {
        let now = self.clock.now_ms();
        let mut st = self.state.lock().await;
        let resolved = st.sessions.expire_due(now)?;
        Some(finish(&mut st, resolved).await)
    }

    pub async fn save_model(&self) -> Result<(), EngineError> {
        let mut guard = self.state.lock().await;
        let st = &mut *guard;
        match st.feedback.save_model(&st.model).await {
            Ok(()) => {
                st.telemetry.record(TelemetryEvent::ModelSnapshotSaved {
                    version: st.model.version(),
                });
                Ok(())
            }
            Err(e) => {
                st.telemetry.record(TelemetryEvent::PersistenceFailure {
                    target: PersistenceTarget::ModelSnapshot,
                });
                Err(e.into())
            }
        }
    }

    /// Clean shutdown: persists the model. An outstanding session is left unresolved.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        info!("engine shutting down");
        self.save_model().await
    }

    pub async fn telemetry(&self) -> TelemetrySnapshot {
        self.state.lock().await.telemetry.snapshot()
    }

    /// Encodes an explicit history with this engine's encoder.
    pub async fn encode(&self, history: &[ContextSnapshot]) -> Result<FeatureVector, EngineError> {
        Ok(self.state.lock().await.encoder.encode(history)?)
    }

    pub async fn predict(&self, features: &FeatureVector) -> Prediction {
        self.state.lock().await.model.predict(features)
    }

    /// Read-only access to the whole state.
    pub async fn inspect<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        let st = self.state.lock().await;
        f(&st)
    }
}

fn build_request(
    st: &EngineState,
    snapshot: &ContextSnapshot,
    features: &FeatureVector,
) -> CandidateRequest {
    let action_ctx = ActionContext::new(snapshot, &st.store);
    let options = st
        .registry
        .specs()
        .iter()
        .filter_map(|spec| {
            let payload = spec.action.resolve(&action_ctx)?;
            Some(CategoryOption {
                category: spec.id.clone(),
                description: render_description(&spec.description, &payload),
                payload,
            })
        })
        .collect();
    CandidateRequest {
        features: features.clone(),
        snapshot: snapshot.clone(),
        transitions: st.store.transitions_from(&snapshot.normalized_app()),
        options,
        deadline: st.config.llm.cutoff(),
    }
}

/// Hands a resolved session to the feedback loop and records what happened.
async fn finish(st: &mut EngineState, resolved: ResolvedSession) -> FeedbackRecord {
    let session_id = resolved.session.id;
    let response_ms = resolved.response_ms();

    let EngineState {
        feedback,
        model,
        rules,
        store,
        suppression,
        telemetry,
        ..
    } = st;

    let report = feedback
        .resolve(
            resolved,
            Learners {
                model: &mut *model,
                rules: &mut *rules,
                store: &mut *store,
                suppression: &mut *suppression,
            },
        )
        .await;

    telemetry.record(TelemetryEvent::SessionResolved {
        session_id,
        outcome: report.record.outcome,
        response_ms,
    });
    if !report.persisted {
        telemetry.record(TelemetryEvent::PersistenceFailure {
            target: PersistenceTarget::FeedbackLog,
        });
    }
    match report.learning_changed {
        Some(true) => telemetry.record(TelemetryEvent::Learning(LearningEvent::Suspended)),
        Some(false) => telemetry.record(TelemetryEvent::Learning(LearningEvent::Resumed)),
        None => {}
    }
    if report.snapshot_saved {
        telemetry.record(TelemetryEvent::ModelSnapshotSaved {
            version: model.version(),
        });
    } else if report.persisted && report.persistence_error.is_some() {
        telemetry.record(TelemetryEvent::PersistenceFailure {
            target: PersistenceTarget::ModelSnapshot,
        });
    }

    info!(
        session = %session_id,
        category = %report.record.category,
        outcome = %report.record.outcome,
        seq = report.record.seq,
        persisted = report.persisted,
        model_updated = report.model_updated,
        "session resolved"
    );
    report.record
}
