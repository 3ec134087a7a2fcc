//! Evaluation context: definitions, builtin registry, numeric kernel,
//! resource limits, cooperative abort and the message sink.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use tungsten_core::{system, Expr};
use tungsten_rewrite::{Attributes, DefinitionStore};

use crate::builtins::{standard_registry, BuiltinRegistry};
use crate::error::{EvalError, EvalResult};
use crate::numeric::{BigKernel, NumericKernel};

/// Resource budget for one top-level evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum nesting depth of recursive evaluation.
    pub max_recursion: u32,
    /// Maximum number of rewrite steps across the whole evaluation.
    pub max_iterations: u64,
    /// Wall-clock budget, checked at loop boundaries.
    pub time_budget: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_recursion: 1024,
            max_iterations: 65536,
            time_budget: None,
        }
    }
}

/// One emitted diagnostic: `symbol::tag` with the filled-in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub symbol: String,
    pub tag: String,
    pub text: String,
    pub args: Vec<Expr>,
}

pub trait MessageSink {
    fn emit(&mut self, message: Message);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn emit(&mut self, _message: Message) {}
}

/// Accumulates messages behind a shared handle, so a test can keep reading
/// after handing the sink to the context.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    inner: Rc<RefCell<Vec<Message>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl MessageSink for CollectingSink {
    fn emit(&mut self, message: Message) {
        self.inner.borrow_mut().push(message);
    }
}

pub struct EvalContext {
    pub defs: DefinitionStore,
    pub builtins: BuiltinRegistry,
    pub kernel: Box<dyn NumericKernel>,
    pub limits: Limits,
    sink: Box<dyn MessageSink>,
    abort: Arc<AtomicBool>,
    deadline: Option<Instant>,
    pub(crate) depth: u32,
    pub(crate) iterations: u64,
}

impl EvalContext {
    /// A context with the standard builtin registry, the bignum kernel and
    /// the stock message templates.
    pub fn new(defs: DefinitionStore, sink: Box<dyn MessageSink>, limits: Limits) -> Self {
        Self::with_parts(defs, standard_registry(), Box::new(BigKernel), sink, limits)
    }

    pub fn with_parts(
        mut defs: DefinitionStore,
        builtins: BuiltinRegistry,
        kernel: Box<dyn NumericKernel>,
        sink: Box<dyn MessageSink>,
        limits: Limits,
    ) -> Self {
        register_standard_messages(&mut defs);
        EvalContext {
            defs,
            builtins,
            kernel,
            limits,
            sink,
            abort: Arc::new(AtomicBool::new(false)),
            deadline: None,
            depth: 0,
            iterations: 0,
        }
    }

    /// Handle another thread can use to request an abort.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Combined attribute view: explicit definitions override nothing, the
    /// two sources are unioned.
    pub fn attributes(&self, symbol: &str) -> Attributes {
        self.defs.attributes(symbol) | self.builtins.attributes(symbol)
    }

    /// Resets counters and arms the wall clock for a fresh top-level
    /// evaluation. A pending abort from a previous run is cleared.
    pub(crate) fn begin(&mut self) {
        self.depth = 0;
        self.iterations = 0;
        self.deadline = self.limits.time_budget.map(|d| Instant::now() + d);
        self.abort.store(false, Ordering::Relaxed);
    }

    /// Abort and deadline check at a loop boundary. `partial` is the form
    /// reported with a deadline overrun.
    pub(crate) fn poll(&self, partial: &Expr) -> EvalResult<()> {
        if self.aborted() {
            return Err(EvalError::Aborted);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EvalError::TimeLimit { partial: partial.clone() });
            }
        }
        Ok(())
    }

    /// Counts one rewrite step; errors once the budget is spent.
    pub(crate) fn bump_iteration(&mut self, partial: &Expr) -> EvalResult<()> {
        self.iterations += 1;
        if self.iterations > self.limits.max_iterations {
            return Err(EvalError::IterationLimit {
                limit: self.limits.max_iterations,
                partial: partial.clone(),
            });
        }
        Ok(())
    }

    /// Emits `symbol::tag`, filling the registered template's `` `n` ``
    /// holes with formatted arguments. Unknown tags fall back to the
    /// `General` table, then to a placeholder text.
    pub fn message(&mut self, symbol: &str, tag: &str, args: &[Expr]) {
        let template = self
            .defs
            .message_template(symbol, tag)
            .or_else(|| self.defs.message_template(system::GENERAL, tag))
            .unwrap_or("-- message text not found --")
            .to_string();
        let text = fill_template(&template, args);
        log::debug!("message {}::{}: {}", symbol, tag, text);
        self.sink.emit(Message {
            symbol: symbol.to_string(),
            tag: tag.to_string(),
            text,
            args: args.to_vec(),
        });
    }
}

/// Replaces `` `1` ``, `` `2` ``, ... with the formatted arguments.
fn fill_template(template: &str, args: &[Expr]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '`' {
            out.push(c);
            continue;
        }
        let rest = &template[i + 1..];
        if let Some(end) = rest.find('`') {
            if let Ok(n) = rest[..end].parse::<usize>() {
                if let Some(arg) = n.checked_sub(1).and_then(|k| args.get(k)) {
                    out.push_str(&arg.to_string());
                    for _ in 0..end + 1 {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn register_standard_messages(defs: &mut DefinitionStore) {
    defs.set_message(
        system::RECURSION_LIMIT,
        "reclim",
        "Recursion depth of `1` exceeded.",
    );
    defs.set_message(
        system::ITERATION_LIMIT,
        "itlim",
        "Iteration limit of `1` exceeded.",
    );
    defs.set_message(system::GENERAL, "timelim", "Time limit exceeded.");
    defs.set_message(system::GENERAL, "abort", "Evaluation aborted.");
    defs.set_message(
        system::GENERAL,
        "tdlen",
        "Objects of unequal length in `1` cannot be combined.",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvalContext {
        EvalContext::new(DefinitionStore::new(), Box::new(NullSink), Limits::default())
    }

    #[test]
    fn template_substitution() {
        let args = [Expr::integer(3), Expr::symbol("x")];
        assert_eq!(fill_template("got `1` and `2`.", &args), "got 3 and x.");
        // Out-of-range holes are left alone.
        assert_eq!(fill_template("hole `9` stays.", &args), "hole `9` stays.");
        assert_eq!(fill_template("no holes", &args), "no holes");
    }

    #[test]
    fn collecting_sink_shares_its_buffer() {
        let sink = CollectingSink::new();
        let mut c = EvalContext::new(
            DefinitionStore::new(),
            Box::new(sink.clone()),
            Limits::default(),
        );
        c.message(system::GENERAL, "abort", &[]);
        let msgs = sink.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].text, "Evaluation aborted.");
    }

    #[test]
    fn abort_handle_is_shared() {
        let c = ctx();
        let handle = c.abort_handle();
        assert!(!c.aborted());
        handle.store(true, Ordering::Relaxed);
        assert!(c.aborted());
    }

    #[test]
    fn begin_clears_a_stale_abort() {
        let mut c = ctx();
        c.request_abort();
        c.begin();
        assert!(!c.aborted());
    }

    #[test]
    fn iteration_budget() {
        let mut c = ctx();
        c.limits.max_iterations = 2;
        c.begin();
        let probe = Expr::integer(0);
        assert!(c.bump_iteration(&probe).is_ok());
        assert!(c.bump_iteration(&probe).is_ok());
        assert!(matches!(
            c.bump_iteration(&probe),
            Err(EvalError::IterationLimit { limit: 2, .. })
        ));
    }
}
