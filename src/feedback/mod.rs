pub mod processor;
pub mod record;

pub use processor::{FeedbackLoop, FeedbackReport, Learners, RestoreReport};
pub use record::{FeedbackRecord, Outcome};
