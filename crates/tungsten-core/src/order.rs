//! Canonical total order over expressions.
//!
//! Orderless sorting and matcher pruning both rely on this being a strict
//! total order: Integer < Rational < Real < Complex within numerics by
//! numeric value (exactness breaks value ties, exact before inexact), then
//! String < Symbol < compound expressions (head first, leaves
//! lexicographically, then leaf count).

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::expr::{Expr, Precision};

pub fn canonical_cmp(a: &Expr, b: &Expr) -> Ordering {
    let ra = class_rank(a);
    let rb = class_rank(b);
    if ra != rb {
        // Real-valued numerics inter-compare by value; everything else by class.
        if ra <= 2 && rb <= 2 {
            return numeric_cmp(a, b);
        }
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Expr::Integer(_), Expr::Integer(_))
        | (Expr::Rational(_), Expr::Rational(_))
        | (Expr::Real(_), Expr::Real(_)) => numeric_cmp(a, b),
        (Expr::Complex { re: ra, im: ia }, Expr::Complex { re: rb, im: ib }) => {
            canonical_cmp(ra, rb).then_with(|| canonical_cmp(ia, ib))
        }
        (Expr::Str(x), Expr::Str(y)) => x.cmp(y),
        (Expr::Symbol(x), Expr::Symbol(y)) => x.cmp(y),
        (Expr::Normal(x), Expr::Normal(y)) => canonical_cmp(x.head(), y.head())
            .then_with(|| {
                for (l, r) in x.leaves().iter().zip(y.leaves().iter()) {
                    let c = canonical_cmp(l, r);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                Ordering::Equal
            })
            .then_with(|| x.len().cmp(&y.len())),
        _ => unreachable!("class_rank separated the variants"),
    }
}

impl Expr {
    pub fn canonical_cmp(&self, other: &Expr) -> Ordering {
        canonical_cmp(self, other)
    }
}

fn class_rank(e: &Expr) -> u8 {
    match e {
        Expr::Integer(_) => 0,
        Expr::Rational(_) => 1,
        Expr::Real(_) => 2,
        Expr::Complex { .. } => 3,
        Expr::Str(_) => 4,
        Expr::Symbol(_) => 5,
        Expr::Normal(_) => 6,
    }
}

/// Exact numeric value of a real-valued numeric atom, totalized over the
/// non-finite floats so the order stays strict.
enum ValKey {
    NegInf,
    Finite(BigRational),
    PosInf,
    Nan,
}

fn val_key(e: &Expr) -> ValKey {
    match e {
        Expr::Integer(n) => ValKey::Finite(BigRational::from_integer(n.clone())),
        Expr::Rational(r) => ValKey::Finite(r.clone()),
        Expr::Real(r) => {
            if r.value.is_nan() {
                ValKey::Nan
            } else if r.value == f64::INFINITY {
                ValKey::PosInf
            } else if r.value == f64::NEG_INFINITY {
                ValKey::NegInf
            } else {
                ValKey::Finite(
                    BigRational::from_float(r.value)
                        .unwrap_or_else(|| BigRational::from_integer(BigInt::from(0))),
                )
            }
        }
        _ => ValKey::Nan,
    }
}

fn key_rank(k: &ValKey) -> u8 {
    match k {
        ValKey::NegInf => 0,
        ValKey::Finite(_) => 1,
        ValKey::PosInf => 2,
        ValKey::Nan => 3,
    }
}

fn numeric_cmp(a: &Expr, b: &Expr) -> Ordering {
    let ka = val_key(a);
    let kb = val_key(b);
    let by_value = match (&ka, &kb) {
        (ValKey::Finite(x), ValKey::Finite(y)) => x.cmp(y),
        _ => key_rank(&ka).cmp(&key_rank(&kb)),
    };
    by_value
        .then_with(|| class_rank(a).cmp(&class_rank(b)))
        .then_with(|| precision_cmp(a, b))
}

// Equal-value, equal-class reals still need a deterministic order.
fn precision_cmp(a: &Expr, b: &Expr) -> Ordering {
    let p = |e: &Expr| match e {
        Expr::Real(r) => match r.precision {
            Precision::Machine => 0u64,
            Precision::Digits(d) => 1 + d as u64,
        },
        _ => 0,
    };
    p(a).cmp(&p(b))
}
