//! Head/arity pre-filter over a rule slot.
//!
//! Before running the full matcher the engine narrows the candidate rules
//! by the expression's head symbol and leaf count. Patterns whose leaf
//! count is fixed go into an exact (head, arity) bucket; patterns with
//! sequence or optional elements can absorb any arity and land in the
//! per-head bucket. Candidate order follows the slot's specificity order.

use std::collections::HashMap;

use tungsten_core::{system, Expr};

use crate::rule::RuleSet;

#[derive(Debug, Default)]
pub struct PatternNet {
    by_head_arity: HashMap<(String, usize), Vec<usize>>,
    by_head_any: HashMap<String, Vec<usize>>,
    general: Vec<usize>,
    size: usize,
}

impl PatternNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_rules(rules: &RuleSet) -> Self {
        let mut net = Self::new();
        for (i, rule) in rules.iter().enumerate() {
            net.insert(&rule.pattern, i);
        }
        net
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn insert(&mut self, pattern: &Expr, id: usize) {
        self.size += 1;
        match bucket_shape(pattern) {
            Some((head, Some(arity))) => {
                self.by_head_arity.entry((head, arity)).or_default().push(id);
            }
            Some((head, None)) => {
                self.by_head_any.entry(head).or_default().push(id);
            }
            None => self.general.push(id),
        }
    }

    /// Rule indices worth trying against `expr`, in slot order.
    pub fn candidates(&self, expr: &Expr) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        if let Expr::Normal(n) = expr {
            if let Some(head) = n.head().as_symbol() {
                if let Some(ids) = self.by_head_arity.get(&(head.to_string(), n.len())) {
                    out.extend(ids);
                }
                if let Some(ids) = self.by_head_any.get(head) {
                    out.extend(ids);
                }
            }
        }
        out.extend(&self.general);
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// The only (head, arity) shape `pattern` can match, or `None` when the
/// pattern does not commit to a head. Wrappers that constrain but do not
/// reshape their subject (`Pattern`, `Condition`, `PatternTest`) are looked
/// through; pattern-construct heads themselves never describe a subject
/// shape and fall back to the general bucket.
fn bucket_shape(pattern: &Expr) -> Option<(String, Option<usize>)> {
    let n = pattern.as_normal()?;
    let head = n.head().as_symbol()?;
    match head {
        system::PATTERN if n.len() == 2 => bucket_shape(&n.leaves()[1]),
        system::CONDITION | system::PATTERN_TEST if n.len() == 2 => {
            bucket_shape(&n.leaves()[0])
        }
        system::BLANK
        | system::BLANK_SEQUENCE
        | system::BLANK_NULL_SEQUENCE
        | system::PATTERN
        | system::CONDITION
        | system::PATTERN_TEST
        | system::ALTERNATIVES
        | system::OPTIONAL
        | system::EXCEPT => None,
        _ => {
            if n.leaves().iter().any(is_variadic) {
                Some((head.to_string(), None))
            } else {
                Some((head.to_string(), Some(n.len())))
            }
        }
    }
}

/// Can this pattern element absorb other than exactly one candidate?
fn is_variadic(p: &Expr) -> bool {
    let Expr::Normal(n) = p else { return false };
    match n.head().as_symbol() {
        Some(system::BLANK_SEQUENCE)
        | Some(system::BLANK_NULL_SEQUENCE)
        | Some(system::OPTIONAL) => true,
        Some(system::PATTERN) if n.len() == 2 => is_variadic(&n.leaves()[1]),
        Some(system::CONDITION) | Some(system::PATTERN_TEST) if n.len() == 2 => {
            is_variadic(&n.leaves()[0])
        }
        Some(system::ALTERNATIVES) => n.leaves().iter().any(is_variadic),
        _ => false,
    }
}
