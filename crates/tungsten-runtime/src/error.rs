use thiserror::Error;

use tungsten_core::Expr;

/// Control-flow unwinding out of the rewrite loop.
///
/// Resource-limit variants carry the last fully-computed form so the
/// top-level entry point can hand back a partial result alongside the
/// diagnostic message. An abort carries nothing; the caller gets `$Aborted`.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("recursion depth of {limit} exceeded")]
    RecursionLimit { limit: u32, partial: Expr },

    #[error("iteration limit of {limit} exceeded")]
    IterationLimit { limit: u64, partial: Expr },

    #[error("time limit exceeded")]
    TimeLimit { partial: Expr },

    #[error("evaluation aborted")]
    Aborted,
}

pub type EvalResult<T> = Result<T, EvalError>;
