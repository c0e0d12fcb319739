pub mod network;
pub mod pattern;

pub use network::{softmax, Mlp};
pub use pattern::{ModelState, PatternModel, Prediction};
