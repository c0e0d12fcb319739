pub mod action;
pub mod category;
pub mod types;

pub use action::{render_description, ActionContext, ActionPayload, ActionTemplate};
pub use category::{default_categories, ActionCategory, CategoryRegistry, CategorySpec};
pub use types::{clamp_unit, Suggestion, SuggestionSource};
