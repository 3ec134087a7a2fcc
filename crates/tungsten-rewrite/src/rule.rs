use serde::{Deserialize, Serialize};

use tungsten_core::Expr;

use crate::specificity::{generality_with, SpecificityWeights};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Delayed {
    No,
    Yes,
}

/// A rewrite rule: pattern, replacement, optional guard.
///
/// Immediate rules had their replacement evaluated at definition time (by
/// the assignment builtin, outside this core); delayed rules substitute the
/// raw right-hand side on every application. The engine treats both the
/// same way at application time, the flag survives for introspection and
/// persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub pattern: Expr,
    pub rhs: Expr,
    pub guard: Option<Expr>,
    pub delayed: Delayed,
    generality: u32,
}

impl Rule {
    pub fn immediate(pattern: Expr, rhs: Expr) -> Self {
        Self::build(pattern, rhs, None, Delayed::No, &SpecificityWeights::default())
    }

    pub fn delayed(pattern: Expr, rhs: Expr) -> Self {
        Self::build(pattern, rhs, None, Delayed::Yes, &SpecificityWeights::default())
    }

    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_weights(pattern: Expr, rhs: Expr, delayed: Delayed, weights: &SpecificityWeights) -> Self {
        Self::build(pattern, rhs, None, delayed, weights)
    }

    fn build(
        pattern: Expr,
        rhs: Expr,
        guard: Option<Expr>,
        delayed: Delayed,
        weights: &SpecificityWeights,
    ) -> Self {
        let generality = generality_with(&pattern, weights);
        Rule { pattern, rhs, guard, delayed, generality }
    }

    /// Ranking score: lower means more specific, tried earlier.
    pub fn generality(&self) -> u32 {
        self.generality
    }
}

/// An ordered rule sequence, kept ascending by generality. Insertion order
/// is preserved on ties, so repeated evaluation stays deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSet(Vec<Rule>);

impl RuleSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Ranked stable insert: after every existing rule of equal or lower
    /// generality score.
    pub fn insert(&mut self, rule: Rule) {
        let at = self
            .0
            .partition_point(|r| r.generality() <= rule.generality());
        self.0.insert(at, rule);
    }

    pub fn remove(&mut self, index: usize) -> Option<Rule> {
        if index < self.0.len() {
            Some(self.0.remove(index))
        } else {
            None
        }
    }

    /// Drops every rule whose pattern equals the given one structurally.
    pub fn remove_pattern(&mut self, pattern: &Expr) -> usize {
        let before = self.0.len();
        self.0.retain(|r| &r.pattern != pattern);
        before - self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tungsten_core::system;

    fn named_blank(name: &str) -> Expr {
        Expr::call(
            system::PATTERN,
            vec![Expr::symbol(name), Expr::call(system::BLANK, vec![])],
        )
    }

    #[test]
    fn specific_rules_rank_before_generic_ones() {
        let generic = Rule::delayed(
            Expr::call("f", vec![named_blank("x")]),
            Expr::string("generic"),
        );
        let specific = Rule::delayed(
            Expr::call("f", vec![Expr::integer(1)]),
            Expr::string("specific"),
        );

        // Insertion order must not matter.
        for rules in [
            vec![generic.clone(), specific.clone()],
            vec![specific.clone(), generic.clone()],
        ] {
            let mut set = RuleSet::new();
            for r in rules {
                set.insert(r);
            }
            assert_eq!(set.get(0).unwrap().rhs, Expr::string("specific"));
            assert_eq!(set.get(1).unwrap().rhs, Expr::string("generic"));
        }
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let a = Rule::delayed(Expr::call("f", vec![named_blank("x")]), Expr::integer(1));
        let b = Rule::delayed(Expr::call("f", vec![named_blank("y")]), Expr::integer(2));
        assert_eq!(a.generality(), b.generality());
        let mut set = RuleSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.get(0).unwrap().rhs, Expr::integer(1));
        assert_eq!(set.get(1).unwrap().rhs, Expr::integer(2));
    }

    #[test]
    fn remove_pattern_drops_matching_rules() {
        let mut set = RuleSet::new();
        let pat = Expr::call("f", vec![Expr::integer(1)]);
        set.insert(Rule::immediate(pat.clone(), Expr::integer(10)));
        set.insert(Rule::immediate(
            Expr::call("f", vec![Expr::integer(2)]),
            Expr::integer(20),
        ));
        assert_eq!(set.remove_pattern(&pat), 1);
        assert_eq!(set.len(), 1);
    }
}
