pub mod defaults;
pub mod engine;
pub mod predicate;

pub use defaults::default_rules;
pub use engine::{Rule, RuleEngine, RuleId};
pub use predicate::{Predicate, RuleContext};
