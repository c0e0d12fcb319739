//! External collaborators: the optional language-model candidate source and action execution.

pub mod action;
pub mod candidate;
pub mod llm;

pub use action::{ActionExecutor, NoopExecutor, SystemExecutor};
pub use candidate::{CandidateRequest, CandidateSource, CategoryOption};
pub use llm::LocalLlmSource;
