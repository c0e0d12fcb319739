//! Durable state: the append-only feedback log and the model snapshot.

pub mod feedback_log;
pub mod retry;
pub mod snapshot;

pub use feedback_log::{FeedbackLog, JsonlFeedbackLog, MemoryFeedbackLog};
pub use retry::RetryPolicy;
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
