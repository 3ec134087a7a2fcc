//! Builtin dispatch: native handlers keyed by qualified symbol name, each
//! carrying the attribute set the engine honors before dispatch.
//!
//! Handlers see leaves that are already evaluated (per hold attributes),
//! spliced, flattened and sorted. A handler either produces a replacement,
//! which re-enters evaluation, or reports `NotApplicable` and the expression
//! stays symbolic. Returning a replacement structurally equal to the input
//! would loop; handlers compare and bail out instead.

use std::collections::HashMap;

use tungsten_core::{system, Expr};
use tungsten_rewrite::Attributes;

use crate::context::EvalContext;
use crate::error::EvalResult;
use crate::eval::eval_inner;
use crate::numeric::ArithOp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinResult {
    Replaced(Expr),
    NotApplicable,
}

pub type NativeFn = fn(&mut EvalContext, &str, &[Expr]) -> EvalResult<BuiltinResult>;

pub struct BuiltinEntry {
    pub attributes: Attributes,
    pub handler: NativeFn,
}

#[derive(Default)]
pub struct BuiltinRegistry {
    entries: HashMap<String, BuiltinEntry>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, attributes: Attributes, handler: NativeFn) {
        self.entries
            .insert(name.to_string(), BuiltinEntry { attributes, handler });
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinEntry> {
        self.entries.get(name)
    }

    pub fn attributes(&self, name: &str) -> Attributes {
        self.entries
            .get(name)
            .map(|e| e.attributes)
            .unwrap_or_default()
    }
}

/// The shipped registry: arithmetic, structural predicates and sequencing.
pub fn standard_registry() -> BuiltinRegistry {
    let mut reg = BuiltinRegistry::new();
    let arith = Attributes::FLAT
        | Attributes::ORDERLESS
        | Attributes::LISTABLE
        | Attributes::ONE_IDENTITY
        | Attributes::PROTECTED;
    reg.register(system::PLUS, arith, plus);
    reg.register(system::TIMES, arith, times);
    reg.register(
        system::POWER,
        Attributes::LISTABLE | Attributes::ONE_IDENTITY | Attributes::PROTECTED,
        power,
    );
    reg.register(
        system::MINUS,
        Attributes::LISTABLE | Attributes::PROTECTED,
        minus,
    );
    reg.register(
        system::DIVIDE,
        Attributes::LISTABLE | Attributes::PROTECTED,
        divide,
    );
    reg.register(system::SAME_Q, Attributes::PROTECTED, same_q);
    reg.register(system::UNSAME_Q, Attributes::PROTECTED, unsame_q);
    reg.register(system::HEAD, Attributes::PROTECTED, head);
    reg.register(system::LENGTH, Attributes::PROTECTED, length);
    reg.register(
        system::COMPOUND_EXPRESSION,
        Attributes::HOLD_ALL | Attributes::PROTECTED,
        compound_expression,
    );
    // Attribute-only entries: no rewriting of their own.
    reg.register(
        system::LIST,
        Attributes::PROTECTED | Attributes::LOCKED,
        inert,
    );
    reg.register(system::SEQUENCE, Attributes::PROTECTED, inert);
    reg
}

fn inert(_ctx: &mut EvalContext, _name: &str, _leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    Ok(BuiltinResult::NotApplicable)
}

/// Folds the numeric leaves of an associative-commutative operation and
/// rebuilds with the symbolic remainder. `identity` is dropped from the
/// result; `absorbing`, when hit exactly, swallows everything.
fn fold_ac(
    ctx: &EvalContext,
    op: ArithOp,
    name: &str,
    leaves: &[Expr],
    identity: &Expr,
    absorbing: bool,
) -> EvalResult<BuiltinResult> {
    // OneIdentity: a lone operand is the value itself.
    if let [only] = leaves {
        return Ok(BuiltinResult::Replaced(only.clone()));
    }
    let (numeric, symbolic): (Vec<&Expr>, Vec<&Expr>) =
        leaves.iter().partition(|l| l.is_numeric());
    if numeric.is_empty() && !leaves.is_empty() {
        return Ok(BuiltinResult::NotApplicable);
    }
    let operands: Vec<Expr> = numeric.iter().map(|e| (*e).clone()).collect();
    let folded = match ctx.kernel.arith(op, &operands) {
        Some(v) => v,
        None => return Ok(BuiltinResult::NotApplicable),
    };
    if absorbing && folded == Expr::integer(0) {
        return Ok(BuiltinResult::Replaced(folded));
    }
    let mut out: Vec<Expr> = Vec::with_capacity(symbolic.len() + 1);
    if folded != *identity || symbolic.is_empty() {
        out.push(folded);
    }
    out.extend(symbolic.into_iter().cloned());
    let result = match out.len() {
        1 => out.pop().unwrap_or_else(|| identity.clone()),
        _ => Expr::call(name, out),
    };
    if result == Expr::call(name, leaves.to_vec()) {
        return Ok(BuiltinResult::NotApplicable);
    }
    Ok(BuiltinResult::Replaced(result))
}

fn plus(ctx: &mut EvalContext, name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    fold_ac(ctx, ArithOp::Plus, name, leaves, &Expr::integer(0), false)
}

fn times(ctx: &mut EvalContext, name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    fold_ac(ctx, ArithOp::Times, name, leaves, &Expr::integer(1), true)
}

fn power(ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    if let [only] = leaves {
        return Ok(BuiltinResult::Replaced(only.clone()));
    }
    let [base, exp] = leaves else {
        return Ok(BuiltinResult::NotApplicable);
    };
    if *exp == Expr::integer(1) {
        return Ok(BuiltinResult::Replaced(base.clone()));
    }
    if *exp == Expr::integer(0) && !base.is_zero() {
        return Ok(BuiltinResult::Replaced(Expr::integer(1)));
    }
    if base.is_numeric() && exp.is_numeric() {
        if let Some(v) = ctx
            .kernel
            .arith(ArithOp::Power, &[base.clone(), exp.clone()])
        {
            return Ok(BuiltinResult::Replaced(v));
        }
    }
    Ok(BuiltinResult::NotApplicable)
}

fn minus(_ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    let [x] = leaves else {
        return Ok(BuiltinResult::NotApplicable);
    };
    Ok(BuiltinResult::Replaced(Expr::call(
        system::TIMES,
        vec![Expr::integer(-1), x.clone()],
    )))
}

fn divide(_ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    let [a, b] = leaves else {
        return Ok(BuiltinResult::NotApplicable);
    };
    Ok(BuiltinResult::Replaced(Expr::call(
        system::TIMES,
        vec![
            a.clone(),
            Expr::call(system::POWER, vec![b.clone(), Expr::integer(-1)]),
        ],
    )))
}

fn same_q(_ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    let same = leaves.windows(2).all(|w| w[0] == w[1]);
    Ok(BuiltinResult::Replaced(Expr::bool(same)))
}

fn unsame_q(_ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    let mut distinct = true;
    for (i, a) in leaves.iter().enumerate() {
        for b in &leaves[i + 1..] {
            if a == b {
                distinct = false;
            }
        }
    }
    Ok(BuiltinResult::Replaced(Expr::bool(distinct)))
}

fn head(_ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    let [x] = leaves else {
        return Ok(BuiltinResult::NotApplicable);
    };
    Ok(BuiltinResult::Replaced(x.head_expr()))
}

fn length(_ctx: &mut EvalContext, _name: &str, leaves: &[Expr]) -> EvalResult<BuiltinResult> {
    let [x] = leaves else {
        return Ok(BuiltinResult::NotApplicable);
    };
    let n = x.as_normal().map(|n| n.len()).unwrap_or(0);
    Ok(BuiltinResult::Replaced(Expr::integer(n as i64)))
}

/// `expr1; expr2; ...` evaluates left to right, yields the last value.
fn compound_expression(
    ctx: &mut EvalContext,
    _name: &str,
    leaves: &[Expr],
) -> EvalResult<BuiltinResult> {
    let mut last = Expr::symbol(system::NULL);
    for leaf in leaves {
        last = eval_inner(leaf.clone(), ctx)?;
    }
    Ok(BuiltinResult::Replaced(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Limits, NullSink};
    use tungsten_rewrite::DefinitionStore;

    fn ctx() -> EvalContext {
        EvalContext::new(DefinitionStore::new(), Box::new(NullSink), Limits::default())
    }

    #[test]
    fn plus_folds_numerics_and_keeps_symbols() {
        let mut c = ctx();
        let leaves = [Expr::integer(1), Expr::integer(2), Expr::symbol("x")];
        let out = plus(&mut c, system::PLUS, &leaves).unwrap();
        assert_eq!(
            out,
            BuiltinResult::Replaced(Expr::call(
                system::PLUS,
                vec![Expr::integer(3), Expr::symbol("x")]
            ))
        );
    }

    #[test]
    fn plus_without_numeric_progress_is_not_applicable() {
        let mut c = ctx();
        let leaves = [Expr::symbol("x"), Expr::symbol("y")];
        assert_eq!(
            plus(&mut c, system::PLUS, &leaves).unwrap(),
            BuiltinResult::NotApplicable
        );
        // Already-folded form must not be "replaced" by itself.
        let leaves = [Expr::integer(3), Expr::symbol("x")];
        assert_eq!(
            plus(&mut c, system::PLUS, &leaves).unwrap(),
            BuiltinResult::NotApplicable
        );
    }

    #[test]
    fn plus_drops_the_identity() {
        let mut c = ctx();
        let leaves = [Expr::integer(0), Expr::symbol("x")];
        assert_eq!(
            plus(&mut c, system::PLUS, &leaves).unwrap(),
            BuiltinResult::Replaced(Expr::symbol("x"))
        );
    }

    #[test]
    fn times_zero_absorbs() {
        let mut c = ctx();
        let leaves = [Expr::integer(0), Expr::symbol("x"), Expr::symbol("y")];
        assert_eq!(
            times(&mut c, system::TIMES, &leaves).unwrap(),
            BuiltinResult::Replaced(Expr::integer(0))
        );
    }

    #[test]
    fn lone_operands_collapse() {
        let mut c = ctx();
        assert_eq!(
            plus(&mut c, system::PLUS, &[Expr::symbol("x")]).unwrap(),
            BuiltinResult::Replaced(Expr::symbol("x"))
        );
        assert_eq!(
            times(&mut c, system::TIMES, &[Expr::symbol("x")]).unwrap(),
            BuiltinResult::Replaced(Expr::symbol("x"))
        );
        assert_eq!(
            power(&mut c, system::POWER, &[Expr::symbol("x")]).unwrap(),
            BuiltinResult::Replaced(Expr::symbol("x"))
        );
    }

    #[test]
    fn power_identities() {
        let mut c = ctx();
        let x = Expr::symbol("x");
        assert_eq!(
            power(&mut c, system::POWER, &[x.clone(), Expr::integer(1)]).unwrap(),
            BuiltinResult::Replaced(x.clone())
        );
        assert_eq!(
            power(&mut c, system::POWER, &[x.clone(), Expr::integer(0)]).unwrap(),
            BuiltinResult::Replaced(Expr::integer(1))
        );
        // 0^0 stays put
        assert_eq!(
            power(&mut c, system::POWER, &[Expr::integer(0), Expr::integer(0)]).unwrap(),
            BuiltinResult::NotApplicable
        );
    }

    #[test]
    fn same_q_and_unsame_q() {
        let mut c = ctx();
        let a = [Expr::integer(1), Expr::integer(1)];
        let b = [Expr::integer(1), Expr::integer(2)];
        assert_eq!(
            same_q(&mut c, system::SAME_Q, &a).unwrap(),
            BuiltinResult::Replaced(Expr::bool(true))
        );
        assert_eq!(
            same_q(&mut c, system::SAME_Q, &b).unwrap(),
            BuiltinResult::Replaced(Expr::bool(false))
        );
        assert_eq!(
            unsame_q(&mut c, system::UNSAME_Q, &b).unwrap(),
            BuiltinResult::Replaced(Expr::bool(true))
        );
    }

    #[test]
    fn head_and_length() {
        let mut c = ctx();
        let f = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        assert_eq!(
            head(&mut c, system::HEAD, std::slice::from_ref(&f)).unwrap(),
            BuiltinResult::Replaced(Expr::symbol("f"))
        );
        assert_eq!(
            length(&mut c, system::LENGTH, std::slice::from_ref(&f)).unwrap(),
            BuiltinResult::Replaced(Expr::integer(2))
        );
        assert_eq!(
            length(&mut c, system::LENGTH, &[Expr::integer(7)]).unwrap(),
            BuiltinResult::Replaced(Expr::integer(0))
        );
    }
}
