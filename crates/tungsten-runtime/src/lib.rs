//! Evaluation runtime: the rewrite engine, builtin dispatch, numeric
//! kernel and session context over the `tungsten-core` expression model
//! and the `tungsten-rewrite` matcher.

pub mod builtins;
pub mod context;
pub mod error;
pub mod eval;
pub mod numeric;

pub use builtins::{standard_registry, BuiltinEntry, BuiltinRegistry, BuiltinResult, NativeFn};
pub use context::{CollectingSink, EvalContext, Limits, Message, MessageSink, NullSink};
pub use error::{EvalError, EvalResult};
pub use eval::evaluate;
pub use numeric::{ArithOp, BigKernel, NumericKernel};

pub use tungsten_rewrite::{Attributes, DefinitionStore, Rule, RuleSet, Slot};
