//! Pattern generality scoring.
//!
//! Rules within a slot are tried most-specific-first. Specificity is the
//! inverse of a generality score: each Blank-family node contributes a
//! weight damped by its depth, so shallow wildcards dominate. The exact
//! weighting is observable behavior but not canonical, hence the
//! caller-overridable [`SpecificityWeights`].

use tungsten_core::{system, Expr};

#[derive(Debug, Clone, Copy)]
pub struct SpecificityWeights {
    pub blank: u32,
    pub blank_sequence: u32,
    pub blank_null_sequence: u32,
    /// Divisor applied when the blank carries a head constraint.
    pub constrained_divisor: u32,
    /// Depth damping scale.
    pub scale: u32,
}

impl Default for SpecificityWeights {
    fn default() -> Self {
        SpecificityWeights {
            blank: 8,
            blank_sequence: 12,
            blank_null_sequence: 16,
            constrained_divisor: 2,
            scale: 1024,
        }
    }
}

/// Generality score with default weights; lower is more specific.
pub fn generality(pattern: &Expr) -> u32 {
    generality_with(pattern, &SpecificityWeights::default())
}

pub fn generality_with(pattern: &Expr, weights: &SpecificityWeights) -> u32 {
    score(pattern, 0, weights)
}

fn score(e: &Expr, depth: u32, w: &SpecificityWeights) -> u32 {
    let n = match e {
        Expr::Normal(n) => n,
        _ => return 0,
    };
    let damp = |base: u32| base * w.scale / (depth + 1);
    match n.head().as_symbol() {
        Some(system::BLANK) => {
            let base = if n.is_empty() { w.blank } else { w.blank / w.constrained_divisor };
            damp(base)
        }
        Some(system::BLANK_SEQUENCE) => {
            let base = if n.is_empty() {
                w.blank_sequence
            } else {
                w.blank_sequence / w.constrained_divisor
            };
            damp(base)
        }
        Some(system::BLANK_NULL_SEQUENCE) => {
            let base = if n.is_empty() {
                w.blank_null_sequence
            } else {
                w.blank_null_sequence / w.constrained_divisor
            };
            damp(base)
        }
        Some(system::PATTERN) if n.len() == 2 => score(&n.leaves()[1], depth, w),
        // Guarded patterns score as their subject; the guard does not make
        // the structural shape any narrower for ranking purposes.
        Some(system::PATTERN_TEST) | Some(system::CONDITION) if n.len() == 2 => {
            score(&n.leaves()[0], depth, w)
        }
        Some(system::ALTERNATIVES) => n
            .leaves()
            .iter()
            .map(|a| score(a, depth, w))
            .max()
            .unwrap_or(0),
        _ => {
            let mut total = score(n.head(), depth + 1, w);
            for leaf in n.leaves() {
                total = total.saturating_add(score(leaf, depth + 1, w));
            }
            total
        }
    }
}
