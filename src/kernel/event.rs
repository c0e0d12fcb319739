use uuid::Uuid;

use crate::context::ContextSnapshot;
use crate::session::Decision;

/// Inputs the reactor drains each tick.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Pushed by the context collector.
    Snapshot(ContextSnapshot),
    /// From the hotkey / UI layer.
    Decision { session_id: Uuid, decision: Decision },
    Shutdown,
}

impl EngineEvent {
    pub fn accept(session_id: Uuid) -> Self {
        EngineEvent::Decision {
            session_id,
            decision: Decision::Accept,
        }
    }

    pub fn dismiss(session_id: Uuid) -> Self {
        EngineEvent::Decision {
            session_id,
            decision: Decision::Dismiss,
        }
    }
}
