pub mod context;
pub mod encoder;
pub mod feedback;
pub mod fusion;
pub mod kernel;
pub mod model;
pub mod rules;
pub mod services;
pub mod session;
pub mod storage;
pub mod suggestion;

// Re-export the handles most callers need
pub use context::ContextSnapshot;
pub use kernel::{CycleOutcome, Engine, EngineConfig, EngineError, EngineEvent, Reactor};
pub use session::Decision;
pub use suggestion::Suggestion;
