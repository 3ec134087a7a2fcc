pub mod attrs;
pub mod defs;
pub mod matcher;
pub mod nets;
pub mod rule;
pub mod specificity;

pub use attrs::Attributes;
pub use defs::{DefinitionStore, Slot};
pub use matcher::{first_match, substitute, Bindings, MatchHost, NoEval};
pub use nets::PatternNet;
pub use rule::{Delayed, Rule, RuleSet};
pub use specificity::{generality, SpecificityWeights};
