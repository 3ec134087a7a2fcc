//! Numeric kernel adapter.
//!
//! The engine consults the kernel only for numeric atoms: canonical
//! normalization of freshly built atoms, folding for the arithmetic
//! builtins, and value comparison. [`BigKernel`] is the default backend on
//! the num stack; `arith` answers `None` whenever the result is better left
//! symbolic (fractional powers of negatives, division by zero, ...).

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use tungsten_core::{Expr, Precision, Real};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Plus,
    Times,
    Power,
}

pub trait NumericKernel {
    /// Canonical normal form of a numeric atom: rationals reduced and
    /// demoted, zero-imaginary complexes collapsed. Non-numeric input
    /// passes through unchanged.
    fn normalize(&self, atom: &Expr) -> Expr;

    /// Folds an arithmetic operation over numeric atoms. `None` means the
    /// operation has no numeric result and stays symbolic.
    fn arith(&self, op: ArithOp, operands: &[Expr]) -> Option<Expr>;

    /// Numeric value comparison; `None` for complexes and NaN.
    fn compare(&self, a: &Expr, b: &Expr) -> Option<Ordering>;

    fn to_precision(&self, real: &Expr, digits: u32) -> Expr;
}

#[derive(Debug, Default)]
pub struct BigKernel;

impl NumericKernel for BigKernel {
    fn normalize(&self, atom: &Expr) -> Expr {
        match atom {
            Expr::Rational(r) => scalar_expr(Scalar::Rat(r.clone())),
            Expr::Complex { re, im } => {
                let re = self.normalize(re);
                let im = self.normalize(im);
                if im.is_zero() {
                    re
                } else {
                    Expr::Complex { re: Box::new(re), im: Box::new(im) }
                }
            }
            other => other.clone(),
        }
    }

    fn arith(&self, op: ArithOp, operands: &[Expr]) -> Option<Expr> {
        match op {
            ArithOp::Plus => {
                let mut acc = CNum::zero();
                for e in operands {
                    acc = c_add(&acc, &cnum_of(e)?);
                }
                Some(cnum_expr(acc))
            }
            ArithOp::Times => {
                let mut acc = CNum::one();
                for e in operands {
                    acc = c_mul(&acc, &cnum_of(e)?);
                }
                Some(cnum_expr(acc))
            }
            ArithOp::Power => {
                let [base, exp] = operands else { return None };
                let base = cnum_of(base)?;
                let exp = scalar_of(exp)?;
                c_pow(&base, &exp).map(cnum_expr)
            }
        }
    }

    fn compare(&self, a: &Expr, b: &Expr) -> Option<Ordering> {
        let x = scalar_of(a)?;
        let y = scalar_of(b)?;
        scalar_cmp(&x, &y)
    }

    fn to_precision(&self, real: &Expr, digits: u32) -> Expr {
        match real {
            Expr::Real(r) => Expr::Real(Real::with_digits(r.value, digits)),
            Expr::Integer(n) => Expr::Real(Real::with_digits(
                n.to_f64().unwrap_or(f64::INFINITY),
                digits,
            )),
            Expr::Rational(r) => Expr::Real(Real::with_digits(
                r.to_f64().unwrap_or(f64::NAN),
                digits,
            )),
            other => other.clone(),
        }
    }
}

/// Real-valued numeric scalar.
#[derive(Debug, Clone)]
enum Scalar {
    Int(BigInt),
    Rat(BigRational),
    Real(f64, Precision),
}

/// Complex pair; purely real values carry a zero imaginary part.
#[derive(Debug, Clone)]
struct CNum {
    re: Scalar,
    im: Scalar,
}

impl CNum {
    fn zero() -> Self {
        CNum { re: Scalar::Int(BigInt::from(0)), im: Scalar::Int(BigInt::from(0)) }
    }

    fn one() -> Self {
        CNum { re: Scalar::Int(BigInt::from(1)), im: Scalar::Int(BigInt::from(0)) }
    }

    fn is_real(&self) -> bool {
        scalar_is_zero(&self.im)
    }
}

fn scalar_of(e: &Expr) -> Option<Scalar> {
    match e {
        Expr::Integer(n) => Some(Scalar::Int(n.clone())),
        Expr::Rational(r) => Some(Scalar::Rat(r.clone())),
        Expr::Real(r) => Some(Scalar::Real(r.value, r.precision)),
        _ => None,
    }
}

fn cnum_of(e: &Expr) -> Option<CNum> {
    match e {
        Expr::Complex { re, im } => Some(CNum { re: scalar_of(re)?, im: scalar_of(im)? }),
        other => Some(CNum {
            re: scalar_of(other)?,
            im: Scalar::Int(BigInt::from(0)),
        }),
    }
}

fn scalar_expr(s: Scalar) -> Expr {
    match s {
        Scalar::Int(n) => Expr::Integer(n),
        Scalar::Rat(r) => {
            if r.is_integer() {
                Expr::Integer(r.to_integer())
            } else {
                Expr::Rational(r)
            }
        }
        Scalar::Real(v, p) => Expr::Real(Real { value: v, precision: p }),
    }
}

fn cnum_expr(c: CNum) -> Expr {
    if c.is_real() {
        scalar_expr(c.re)
    } else {
        Expr::Complex {
            re: Box::new(scalar_expr(c.re)),
            im: Box::new(scalar_expr(c.im)),
        }
    }
}

fn scalar_is_zero(s: &Scalar) -> bool {
    match s {
        Scalar::Int(n) => n.is_zero(),
        Scalar::Rat(r) => r.is_zero(),
        Scalar::Real(v, _) => *v == 0.0,
    }
}

/// Machine precision is contagious; two tracked precisions keep the lower.
fn prec_combine(a: Precision, b: Precision) -> Precision {
    match (a, b) {
        (Precision::Digits(x), Precision::Digits(y)) => Precision::Digits(x.min(y)),
        _ => Precision::Machine,
    }
}

fn to_f64(s: &Scalar) -> f64 {
    match s {
        Scalar::Int(n) => n.to_f64().unwrap_or(f64::INFINITY),
        Scalar::Rat(r) => r.to_f64().unwrap_or(f64::NAN),
        Scalar::Real(v, _) => *v,
    }
}

fn to_rat(s: &Scalar) -> BigRational {
    match s {
        Scalar::Int(n) => BigRational::from_integer(n.clone()),
        Scalar::Rat(r) => r.clone(),
        Scalar::Real(v, _) => BigRational::from_float(*v)
            .unwrap_or_else(|| BigRational::from_integer(BigInt::from(0))),
    }
}

fn s_add(a: &Scalar, b: &Scalar) -> Scalar {
    match (a, b) {
        (Scalar::Real(x, pa), _) => Scalar::Real(x + to_f64(b), real_prec(*pa, b)),
        (_, Scalar::Real(y, pb)) => Scalar::Real(to_f64(a) + y, real_prec(*pb, a)),
        (Scalar::Int(x), Scalar::Int(y)) => Scalar::Int(x + y),
        _ => Scalar::Rat(to_rat(a) + to_rat(b)),
    }
}

fn s_mul(a: &Scalar, b: &Scalar) -> Scalar {
    match (a, b) {
        (Scalar::Real(x, pa), _) => Scalar::Real(x * to_f64(b), real_prec(*pa, b)),
        (_, Scalar::Real(y, pb)) => Scalar::Real(to_f64(a) * y, real_prec(*pb, a)),
        (Scalar::Int(x), Scalar::Int(y)) => Scalar::Int(x * y),
        _ => Scalar::Rat(to_rat(a) * to_rat(b)),
    }
}

fn s_neg(a: &Scalar) -> Scalar {
    match a {
        Scalar::Int(n) => Scalar::Int(-n),
        Scalar::Rat(r) => Scalar::Rat(-r),
        Scalar::Real(v, p) => Scalar::Real(-v, *p),
    }
}

fn s_sub(a: &Scalar, b: &Scalar) -> Scalar {
    s_add(a, &s_neg(b))
}

fn real_prec(p: Precision, other: &Scalar) -> Precision {
    match other {
        Scalar::Real(_, q) => prec_combine(p, *q),
        // Exact operands do not lower a real's precision.
        _ => p,
    }
}

fn c_add(a: &CNum, b: &CNum) -> CNum {
    CNum { re: s_add(&a.re, &b.re), im: s_add(&a.im, &b.im) }
}

fn c_mul(a: &CNum, b: &CNum) -> CNum {
    CNum {
        re: s_sub(&s_mul(&a.re, &b.re), &s_mul(&a.im, &b.im)),
        im: s_add(&s_mul(&a.re, &b.im), &s_mul(&a.im, &b.re)),
    }
}

fn c_pow(base: &CNum, exp: &Scalar) -> Option<CNum> {
    if let Scalar::Int(e) = exp {
        if base.is_real() {
            return scalar_pow(&base.re, e).map(|re| CNum {
                re,
                im: Scalar::Int(BigInt::from(0)),
            });
        }
        // Complex base: small non-negative integer exponents only.
        let e = e.to_u32().filter(|e| *e <= 1024)?;
        let mut acc = CNum::one();
        for _ in 0..e {
            acc = c_mul(&acc, base);
        }
        return Some(acc);
    }
    // Fractional or real exponent over the reals.
    if !base.is_real() {
        return None;
    }
    let b = to_f64(&base.re);
    let x = to_f64(exp);
    if b == 0.0 && x == 0.0 {
        return None;
    }
    if b < 0.0 && x.fract() != 0.0 {
        // Would leave the reals.
        return None;
    }
    let p = match (&base.re, exp) {
        (Scalar::Real(_, pa), Scalar::Real(_, pb)) => prec_combine(*pa, *pb),
        (Scalar::Real(_, pa), _) => *pa,
        (_, Scalar::Real(_, pb)) => *pb,
        // Exact base with exact non-integer exponent: only fold when the
        // result is representable, which we approximate via machine floats.
        _ => return None,
    };
    Some(CNum {
        re: Scalar::Real(b.powf(x), p),
        im: Scalar::Int(BigInt::from(0)),
    })
}

fn scalar_pow(base: &Scalar, exp: &BigInt) -> Option<Scalar> {
    match base {
        Scalar::Real(v, p) => {
            if *v == 0.0 && exp.is_zero() {
                // 0^0 is indeterminate.
                return None;
            }
            let e = exp.to_i32()?;
            Some(Scalar::Real(v.powi(e), *p))
        }
        Scalar::Int(n) => {
            if n.is_zero() && exp.is_zero() {
                return None;
            }
            if exp.is_negative() {
                if n.is_zero() {
                    return None;
                }
                let e = (-exp).to_u32()?;
                Some(Scalar::Rat(BigRational::new(
                    BigInt::from(1),
                    n.pow(e),
                )))
            } else {
                let e = exp.to_u32()?;
                Some(Scalar::Int(n.pow(e)))
            }
        }
        Scalar::Rat(r) => {
            if r.is_zero() && (exp.is_negative() || exp.is_zero()) {
                return None;
            }
            let e = exp.to_i32()?;
            Some(Scalar::Rat(r.pow(e)))
        }
    }
}

fn scalar_cmp(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    let nan = |s: &Scalar| matches!(s, Scalar::Real(v, _) if v.is_nan());
    if nan(a) || nan(b) {
        return None;
    }
    let inf_rank = |s: &Scalar| match s {
        Scalar::Real(v, _) if *v == f64::INFINITY => 1i8,
        Scalar::Real(v, _) if *v == f64::NEG_INFINITY => -1,
        _ => 0,
    };
    let (ra, rb) = (inf_rank(a), inf_rank(b));
    if ra != 0 || rb != 0 {
        return Some(ra.cmp(&rb));
    }
    Some(to_rat(a).cmp(&to_rat(b)))
}
