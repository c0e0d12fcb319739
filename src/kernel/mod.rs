pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod reactor;
pub mod state;
pub mod telemetry;
pub mod time;

pub use config::EngineConfig;
pub use engine::{CycleOutcome, Engine, EngineBuilder, PendingSuggestion};
pub use error::EngineError;
pub use event::EngineEvent;
pub use reactor::Reactor;
pub use state::EngineState;
pub use time::{Clock, ManualClock, Millis, SystemClock};
