//! The single suggestion currently on screen, awaiting accept / dismiss / timeout.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::{normalize_app_name, ContextSnapshot};
use crate::encoder::FeatureVector;
use crate::feedback::Outcome;
use crate::kernel::error::SessionError;
use crate::kernel::time::Millis;
use crate::suggestion::{ActionPayload, Suggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Proposed,
    Accepted,
    Dismissed,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Accepted | SessionState::Dismissed | SessionState::TimedOut
        )
    }

    /// Feedback outcome for a terminal state.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            SessionState::Accepted => Some(Outcome::Accepted),
            SessionState::Dismissed => Some(Outcome::Ignored),
            SessionState::TimedOut => Some(Outcome::TimedOut),
            SessionState::Idle | SessionState::Proposed => None,
        }
    }
}

/// What the user can say about a proposed suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Dismiss,
}

impl Decision {
    pub fn terminal_state(self) -> SessionState {
        match self {
            Decision::Accept => SessionState::Accepted,
            Decision::Dismiss => SessionState::Dismissed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuggestionSession {
    pub id: Uuid,
    pub suggestion: Suggestion,
    pub features: FeatureVector,
    /// Snapshot the suggestion was produced from.
    pub origin: ContextSnapshot,
    pub proposed_at: Millis,
    pub deadline: Millis,
    pub state: SessionState,
}

/// A session that reached a terminal state. Handed to the feedback loop exactly once.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: SuggestionSession,
    pub outcome: Outcome,
    pub resolved_at: Millis,
}

impl ResolvedSession {
    pub fn response_ms(&self) -> Millis {
        self.resolved_at.saturating_sub(self.session.proposed_at)
    }

    /// An accepted action that could not run counts as ignored.
    pub fn downgrade_to_ignored(&mut self) {
        self.session.state = SessionState::Dismissed;
        self.outcome = SessionState::Dismissed.outcome().unwrap_or(Outcome::Ignored);
    }
}

/// Holds at most one proposed session and remembers recently resolved ids.
#[derive(Debug)]
pub struct SessionTracker {
    active: Option<SuggestionSession>,
    resolved: VecDeque<Uuid>,
    resolved_set: HashSet<Uuid>,
    history: usize,
    deadline_ms: Millis,
    dropped: u64,
}

impl SessionTracker {
    pub fn new(deadline_ms: Millis, history: usize) -> Self {
        Self {
            active: None,
            resolved: VecDeque::new(),
            resolved_set: HashSet::new(),
            history: history.max(1),
            deadline_ms,
            dropped: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Proposed
        } else {
            SessionState::Idle
        }
    }

    pub fn current(&self) -> Option<&SuggestionSession> {
        self.active.as_ref()
    }

    /// Proposals rejected because one was already outstanding.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Idle -> Proposed. A second proposal while one is outstanding is dropped, never queued.
    pub fn propose(
        &mut self,
        suggestion: Suggestion,
        features: FeatureVector,
        origin: ContextSnapshot,
        now: Millis,
    ) -> Result<&SuggestionSession, SessionError> {
        if let Some(active) = &self.active {
            self.dropped += 1;
            debug!(active = %active.id, "proposal dropped, session outstanding");
            return Err(SessionError::Busy(active.id));
        }
        let session = SuggestionSession {
            id: Uuid::new_v4(),
            suggestion,
            features,
            origin,
            proposed_at: now,
            deadline: now.saturating_add(self.deadline_ms),
            state: SessionState::Proposed,
        };
        Ok(self.active.insert(session))
    }

    /// Proposed -> terminal. Unknown and already-resolved ids are errors and change nothing.
    pub fn resolve(
        &mut self,
        id: Uuid,
        terminal: SessionState,
        now: Millis,
    ) -> Result<ResolvedSession, SessionError> {
        if self.resolved_set.contains(&id) {
            return Err(SessionError::AlreadyResolved(id));
        }
        let outcome = terminal.outcome().ok_or(SessionError::Unknown(id))?;
        match &self.active {
            Some(active) if active.id == id => {}
            _ => return Err(SessionError::Unknown(id)),
        }
        let mut session = self.active.take().ok_or(SessionError::Unknown(id))?;
        session.state = terminal;
        self.remember(id);
        Ok(ResolvedSession {
            session,
            outcome,
            resolved_at: now,
        })
    }

    /// Times out the outstanding session once its deadline has passed.
    pub fn expire_due(&mut self, now: Millis) -> Option<ResolvedSession> {
        let id = match &self.active {
            Some(active) if now >= active.deadline => active.id,
            _ => return None,
        };
        self.resolve(id, SessionState::TimedOut, now).ok()
    }

    /// Id of the outstanding session when `snapshot` shows the user already
    /// switched to the app it proposed.
    pub fn followed_by(&self, snapshot: &ContextSnapshot) -> Option<Uuid> {
        let active = self.active.as_ref()?;
        let ActionPayload::OpenApp { name } = &active.suggestion.payload else {
            return None;
        };
        let target = normalize_app_name(name);
        (!target.is_empty() && snapshot.normalized_app() == target).then_some(active.id)
    }

    fn remember(&mut self, id: Uuid) {
        if self.resolved.len() >= self.history {
            if let Some(old) = self.resolved.pop_front() {
                self.resolved_set.remove(&old);
            }
        }
        self.resolved.push_back(id);
        self.resolved_set.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::SuggestionSource;

    fn suggestion(payload: ActionPayload) -> Suggestion {
        Suggestion::new("switch-context".into(), "x", SuggestionSource::Rule, 0.6, payload)
    }

    fn propose(tracker: &mut SessionTracker, payload: ActionPayload, now: Millis) -> Uuid {
        tracker
            .propose(
                suggestion(payload),
                FeatureVector::zeros(1),
                ContextSnapshot::builder(now).build(),
                now,
            )
            .map(|s| s.id)
            .unwrap()
    }

    #[test]
    fn one_outstanding_session() {
        let mut t = SessionTracker::new(30_000, 8);
        let id = propose(&mut t, ActionPayload::None, 0);
        let second = t.propose(
            suggestion(ActionPayload::None),
            FeatureVector::zeros(1),
            ContextSnapshot::builder(1).build(),
            1,
        );
        assert_eq!(second.unwrap_err(), SessionError::Busy(id));
        assert_eq!(t.dropped(), 1);
        assert_eq!(t.current().map(|s| s.id), Some(id));
    }

    #[test]
    fn failed_accept_downgrades_state_and_outcome() {
        let mut t = SessionTracker::new(30_000, 8);
        let id = propose(&mut t, ActionPayload::None, 0);
        let mut resolved = t.resolve(id, SessionState::Accepted, 5).unwrap();
        resolved.downgrade_to_ignored();
        assert_eq!(resolved.session.state, SessionState::Dismissed);
        assert_eq!(resolved.outcome, Outcome::Ignored);
        assert_eq!(resolved.session.state.outcome(), Some(resolved.outcome));
    }

    #[test]
    fn resolves_once() {
        let mut t = SessionTracker::new(30_000, 8);
        let id = propose(&mut t, ActionPayload::None, 0);
        let resolved = t.resolve(id, SessionState::Dismissed, 5).unwrap();
        assert_eq!(resolved.outcome, Outcome::Ignored);
        assert_eq!(t.state(), SessionState::Idle);
        assert_eq!(
            t.resolve(id, SessionState::Accepted, 6).unwrap_err(),
            SessionError::AlreadyResolved(id)
        );
        let stranger = Uuid::new_v4();
        assert_eq!(
            t.resolve(stranger, SessionState::Accepted, 6).unwrap_err(),
            SessionError::Unknown(stranger)
        );
    }

    #[test]
    fn deadline_times_out() {
        let mut t = SessionTracker::new(30_000, 8);
        propose(&mut t, ActionPayload::None, 1_000);
        assert!(t.expire_due(30_999).is_none());
        let resolved = t.expire_due(31_000).unwrap();
        assert_eq!(resolved.outcome, Outcome::TimedOut);
        assert_eq!(resolved.session.state, SessionState::TimedOut);
    }

    #[test]
    fn switching_to_the_proposed_app_is_a_follow() {
        let mut t = SessionTracker::new(30_000, 8);
        let id = propose(
            &mut t,
            ActionPayload::OpenApp {
                name: "Firefox".into(),
            },
            0,
        );
        let other = ContextSnapshot::builder(1).class("Slack").build();
        let target = ContextSnapshot::builder(2).class("firefox").build();
        assert_eq!(t.followed_by(&other), None);
        assert_eq!(t.followed_by(&target), Some(id));
    }
}
