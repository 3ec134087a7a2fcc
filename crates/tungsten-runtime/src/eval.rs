//! The rewrite engine: attribute-driven normalization plus rule search,
//! iterated to a fixed point.
//!
//! `evaluate` is the public entry point; it arms the resource budget,
//! catches limit unwinds and turns them into messages plus a partial
//! result. The recursive worker `eval_inner` polls the abort flag and the
//! deadline on entry and counts rewrite steps at every rule application.

use tungsten_core::{canonical_cmp, system, Expr};
use tungsten_rewrite::matcher::{match_rule, substitute, Bindings, MatchHost};
use tungsten_rewrite::{Attributes, PatternNet, RuleSet, Slot};

use crate::builtins::BuiltinResult;
use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult};

/// Evaluates to a fixed point under the context's definitions and limits.
///
/// Resource-limit overruns emit a message and yield the last-computed
/// form; an abort yields `$Aborted`.
pub fn evaluate(expr: Expr, ctx: &mut EvalContext) -> Expr {
    ctx.begin();
    match eval_inner(expr, ctx) {
        Ok(v) => v,
        Err(EvalError::Aborted) => {
            ctx.message(system::GENERAL, "abort", &[]);
            Expr::symbol(system::ABORTED)
        }
        Err(EvalError::RecursionLimit { limit, partial }) => {
            ctx.message(
                system::RECURSION_LIMIT,
                "reclim",
                &[Expr::integer(limit as i64)],
            );
            partial
        }
        Err(EvalError::IterationLimit { limit, partial }) => {
            ctx.message(
                system::ITERATION_LIMIT,
                "itlim",
                &[Expr::integer(limit as i64)],
            );
            partial
        }
        Err(EvalError::TimeLimit { partial }) => {
            ctx.message(system::GENERAL, "timelim", &[]);
            partial
        }
    }
}

/// Recursive worker; unwinds with `EvalError` on limits and aborts.
pub(crate) fn eval_inner(expr: Expr, ctx: &mut EvalContext) -> EvalResult<Expr> {
    ctx.poll(&expr)?;
    if ctx.depth >= ctx.limits.max_recursion {
        return Err(EvalError::RecursionLimit {
            limit: ctx.limits.max_recursion,
            partial: expr,
        });
    }
    ctx.depth += 1;
    let out = eval_dispatch(expr, ctx);
    ctx.depth -= 1;
    out
}

fn eval_dispatch(expr: Expr, ctx: &mut EvalContext) -> EvalResult<Expr> {
    match expr {
        Expr::Symbol(_) => eval_symbol(expr, ctx),
        Expr::Normal(_) => eval_normal(expr, ctx),
        e if e.is_numeric() => Ok(ctx.kernel.normalize(&e)),
        other => Ok(other),
    }
}

fn eval_symbol(expr: Expr, ctx: &mut EvalContext) -> EvalResult<Expr> {
    let rules = match expr.as_symbol() {
        Some(name) => ctx.defs.rules(Slot::Own, name).cloned(),
        None => None,
    };
    let Some(rules) = rules else { return Ok(expr) };
    for rule in rules.iter() {
        let binds = {
            let mut host = HostCtx { ctx: &mut *ctx };
            match_rule(rule, &expr, &mut host)
        };
        if let Some(b) = binds {
            ctx.bump_iteration(&expr)?;
            let next = substitute(&rule.rhs, &b);
            return eval_inner(next, ctx);
        }
    }
    Ok(expr)
}

fn eval_normal(mut expr: Expr, ctx: &mut EvalContext) -> EvalResult<Expr> {
    loop {
        ctx.poll(&expr)?;
        let node = match expr {
            Expr::Normal(n) => n,
            other => return eval_inner(other, ctx),
        };
        if node.is_evaluated() {
            return Ok(Expr::Normal(node));
        }

        let (head, leaves) = node.into_parts();
        let head = eval_inner(head, ctx)?;
        let attrs = head
            .as_symbol()
            .map(|s| ctx.attributes(s))
            .unwrap_or_default();

        let mut evaluated = Vec::with_capacity(leaves.len());
        for (i, leaf) in leaves.into_iter().enumerate() {
            let held = if i == 0 {
                attrs.holds_first()
            } else {
                attrs.holds_rest()
            };
            evaluated.push(if held { leaf } else { eval_inner(leaf, ctx)? });
        }

        let mut leaves = if attrs.holds_sequences() {
            evaluated
        } else {
            splice_sequences(evaluated)
        };
        if attrs.contains(Attributes::FLAT) {
            if let Some(h) = head.as_symbol() {
                leaves = flatten_same_head(h, leaves);
            }
        }
        if attrs.contains(Attributes::ORDERLESS) {
            leaves.sort_by(|a, b| canonical_cmp(a, b));
        }

        let rebuilt = Expr::normal(head, leaves);

        if attrs.contains(Attributes::LISTABLE) {
            match thread_listable(&rebuilt) {
                Thread::NoLists => {}
                Thread::Threaded(threaded) => {
                    expr = threaded;
                    continue;
                }
                Thread::Mismatch => {
                    let owner = rebuilt.head_symbol().unwrap_or(system::GENERAL).to_string();
                    ctx.message(&owner, "tdlen", &[rebuilt.clone()]);
                    if let Expr::Normal(n) = &rebuilt {
                        n.mark_evaluated();
                    }
                    return Ok(rebuilt);
                }
            }
        }

        match apply_rules(&rebuilt, attrs, ctx)? {
            Some(next) => {
                ctx.bump_iteration(&rebuilt)?;
                expr = next;
            }
            None => {
                if let Expr::Normal(n) = &rebuilt {
                    n.mark_evaluated();
                }
                return Ok(rebuilt);
            }
        }
    }
}

/// One rule-search pass over the slots in their fixed order. Returns the
/// substituted replacement of the first matching rule, not yet evaluated.
fn apply_rules(
    expr: &Expr,
    attrs: Attributes,
    ctx: &mut EvalContext,
) -> EvalResult<Option<Expr>> {
    let Expr::Normal(node) = expr else { return Ok(None) };

    // Up-values: triggered by a leaf symbol or a leaf's head symbol, one
    // level deep, in leaf order.
    if !attrs.contains(Attributes::HOLD_ALL_COMPLETE) {
        let mut triggers: Vec<String> = Vec::new();
        for leaf in node.leaves() {
            let sym = leaf
                .as_symbol()
                .or_else(|| leaf.as_normal().and_then(|m| m.head().as_symbol()));
            if let Some(s) = sym {
                if !triggers.iter().any(|t| t == s) {
                    triggers.push(s.to_string());
                }
            }
        }
        for sym in triggers {
            if let Some(rules) = ctx.defs.rules(Slot::Up, &sym).cloned() {
                if let Some(next) = try_rules(&rules, None, expr, ctx) {
                    return Ok(Some(next));
                }
            }
        }
    }

    let head = node.head().clone();
    if let Some(h) = head.as_symbol() {
        if let Some(rules) = ctx.defs.rules(Slot::Down, h).cloned() {
            let net = PatternNet::for_rules(&rules);
            if let Some(next) = try_rules(&rules, Some(&net), expr, ctx) {
                return Ok(Some(next));
            }
        }
    } else if let Some(g) = head.as_normal().and_then(|m| m.head().as_symbol()) {
        if let Some(rules) = ctx.defs.rules(Slot::Sub, g).cloned() {
            if let Some(next) = try_rules(&rules, None, expr, ctx) {
                return Ok(Some(next));
            }
        }
    }

    if let Some(h) = head.as_symbol() {
        if let Some(entry) = ctx.builtins.get(h) {
            let handler = entry.handler;
            let leaves: Vec<Expr> = node.leaves().to_vec();
            let name = h.to_string();
            if let BuiltinResult::Replaced(v) = handler(ctx, &name, &leaves)? {
                return Ok(Some(v));
            }
        }
        if let Some(rules) = ctx.defs.rules(Slot::Default, h).cloned() {
            if let Some(next) = try_rules(&rules, None, expr, ctx) {
                return Ok(Some(next));
            }
        }
    }

    Ok(None)
}

fn try_rules(
    rules: &RuleSet,
    net: Option<&PatternNet>,
    expr: &Expr,
    ctx: &mut EvalContext,
) -> Option<Expr> {
    let order: Vec<usize> = match net {
        Some(net) => net.candidates(expr),
        None => (0..rules.len()).collect(),
    };
    for i in order {
        let Some(rule) = rules.get(i) else { continue };
        let binds = {
            let mut host = HostCtx { ctx: &mut *ctx };
            match_rule(rule, expr, &mut host)
        };
        if let Some(b) = binds {
            log::trace!("applied {} -> {}", rule.pattern, rule.rhs);
            return Some(substitute(&rule.rhs, &b));
        }
    }
    None
}

/// Matcher capability backed by the live evaluator. A guard evaluation
/// that itself overruns a limit counts as a failed guard; a pending abort
/// is picked up again at the next poll.
struct HostCtx<'a> {
    ctx: &'a mut EvalContext,
}

impl MatchHost for HostCtx<'_> {
    fn pattern_test(&mut self, test: &Expr, candidate: &Expr) -> bool {
        let probe = Expr::normal(test.clone(), vec![candidate.clone()]);
        matches!(eval_inner(probe, self.ctx), Ok(v) if v.is_true())
    }

    fn condition(&mut self, guard: &Expr, binds: &Bindings) -> bool {
        let probe = substitute(guard, binds);
        matches!(eval_inner(probe, self.ctx), Ok(v) if v.is_true())
    }

    fn is_orderless(&self, symbol: &str) -> bool {
        self.ctx.attributes(symbol).contains(Attributes::ORDERLESS)
    }

    fn default_value(&self, symbol: &str) -> Option<Expr> {
        self.ctx.defs.default_value(symbol).cloned()
    }
}

fn splice_sequences(leaves: Vec<Expr>) -> Vec<Expr> {
    if !leaves.iter().any(|l| l.has_head(system::SEQUENCE)) {
        return leaves;
    }
    let mut out = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        if leaf.has_head(system::SEQUENCE) {
            if let Expr::Normal(n) = leaf {
                let (_, inner) = n.into_parts();
                out.extend(inner);
            }
        } else {
            out.push(leaf);
        }
    }
    out
}

fn flatten_same_head(head: &str, leaves: Vec<Expr>) -> Vec<Expr> {
    if !leaves.iter().any(|l| l.has_head(head)) {
        return leaves;
    }
    let mut out = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        if leaf.has_head(head) {
            if let Expr::Normal(n) = leaf {
                let (_, inner) = n.into_parts();
                out.extend(flatten_same_head(head, inner));
            }
        } else {
            out.push(leaf);
        }
    }
    out
}

enum Thread {
    NoLists,
    Threaded(Expr),
    Mismatch,
}

/// Element-wise threading of a Listable head across `List`-headed leaves.
fn thread_listable(expr: &Expr) -> Thread {
    let Expr::Normal(node) = expr else { return Thread::NoLists };
    let mut width: Option<usize> = None;
    for leaf in node.leaves() {
        if let Some(items) = leaf.leaves_of(system::LIST) {
            match width {
                None => width = Some(items.len()),
                Some(w) if w == items.len() => {}
                Some(_) => return Thread::Mismatch,
            }
        }
    }
    let Some(width) = width else { return Thread::NoLists };
    let mut rows = Vec::with_capacity(width);
    for i in 0..width {
        let leaves = node
            .leaves()
            .iter()
            .map(|leaf| match leaf.leaves_of(system::LIST) {
                Some(items) => items[i].clone(),
                None => leaf.clone(),
            })
            .collect();
        rows.push(Expr::normal(node.head().clone(), leaves));
    }
    Thread::Threaded(Expr::list(rows))
}
