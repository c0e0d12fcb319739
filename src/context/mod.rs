pub mod app;
pub mod snapshot;
pub mod store;

pub use app::{app_from_title, normalize_app_name};
pub use snapshot::{ContextSnapshot, SnapshotBuilder, MAX_RECENT_FILES};
pub use store::ContextStore;
