use std::time::Duration;

use async_trait::async_trait;

use crate::context::ContextSnapshot;
use crate::encoder::FeatureVector;
use crate::kernel::error::CandidateError;
use crate::suggestion::{ActionCategory, ActionPayload, Suggestion};

/// A category the source may pick, already resolved against the current context.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOption {
    pub category: ActionCategory,
    pub description: String,
    pub payload: ActionPayload,
}

/// Everything an external source gets to see for one cycle.
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    pub features: FeatureVector,
    pub snapshot: ContextSnapshot,
    /// Apps usually visited after the current one, most frequent first.
    pub transitions: Vec<(String, u32)>,
    pub options: Vec<CategoryOption>,
    /// Time budget. Replies after this are discarded by the caller.
    pub deadline: Duration,
}

impl CandidateRequest {
    pub fn option(&self, category: &ActionCategory) -> Option<&CategoryOption> {
        self.options.iter().find(|o| &o.category == category)
    }
}

/// Optional third candidate source (a local language model in production).
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered candidates, possibly empty. Must not be relied on to respect the deadline;
    /// the engine enforces it.
    async fn request_candidates(
        &self,
        request: &CandidateRequest,
    ) -> Result<Vec<Suggestion>, CandidateError>;
}
