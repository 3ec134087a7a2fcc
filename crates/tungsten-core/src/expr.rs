use std::cell::Cell;
use std::hash::{Hash, Hasher};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::system;

/// Tracked precision of a real atom. Machine reals carry the platform f64
/// semantics; `Digits` marks a value that originated from arbitrary-precision
/// input and remembers its significant decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    Machine,
    Digits(u32),
}

/// A real atom: value plus tracked precision.
///
/// Equality and hashing go through the bit pattern so that `Expr` stays a
/// well-behaved `Eq + Hash` key even in the presence of NaN payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Real {
    pub value: f64,
    pub precision: Precision,
}

impl Real {
    pub fn machine(value: f64) -> Self {
        Real { value, precision: Precision::Machine }
    }

    pub fn with_digits(value: f64, digits: u32) -> Self {
        Real { value, precision: Precision::Digits(digits) }
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits() && self.precision == other.precision
    }
}

impl Eq for Real {}

impl Hash for Real {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.to_bits().hash(state);
        self.precision.hash(state);
    }
}

/// The universal term representation: atoms plus one compound variant.
///
/// Atoms are immutable value types compared by value. Compound nodes
/// (`Normal`) carry a transient evaluated-flag cache, see [`Normal`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Integer(BigInt),
    Rational(BigRational),
    Real(Real),
    Complex { re: Box<Expr>, im: Box<Expr> },
    Str(String),
    Symbol(String),
    Normal(Normal),
}

/// A compound node: head applied to an ordered sequence of leaves.
///
/// The evaluated flag is a memoization hint only: it is set once the rewrite
/// loop reaches a fixed point for this node and cleared by every structural
/// write. It never participates in equality, hashing or serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normal {
    head: Box<Expr>,
    leaves: Vec<Expr>,
    #[serde(skip)]
    evaluated: Cell<bool>,
}

impl PartialEq for Normal {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.leaves == other.leaves
    }
}

impl Eq for Normal {}

impl Hash for Normal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.head.hash(state);
        self.leaves.hash(state);
    }
}

impl Normal {
    pub fn new(head: Expr, leaves: Vec<Expr>) -> Self {
        Normal { head: Box::new(head), leaves, evaluated: Cell::new(false) }
    }

    pub fn head(&self) -> &Expr {
        &self.head
    }

    pub fn leaves(&self) -> &[Expr] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Replaces the head, invalidating the evaluation cache.
    pub fn set_head(&mut self, head: Expr) {
        self.head = Box::new(head);
        self.evaluated.set(false);
    }

    /// Replaces a single leaf in place, invalidating the evaluation cache.
    pub fn set_leaf(&mut self, index: usize, leaf: Expr) {
        self.leaves[index] = leaf;
        self.evaluated.set(false);
    }

    /// Replaces the whole leaf list, invalidating the evaluation cache.
    pub fn set_leaves(&mut self, leaves: Vec<Expr>) {
        self.leaves = leaves;
        self.evaluated.set(false);
    }

    pub fn into_parts(self) -> (Expr, Vec<Expr>) {
        (*self.head, self.leaves)
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated.get()
    }

    pub fn mark_evaluated(&self) {
        self.evaluated.set(true);
    }

    pub fn clear_evaluated(&self) {
        self.evaluated.set(false);
    }
}

impl Expr {
    pub fn integer(n: i64) -> Self {
        Expr::Integer(BigInt::from(n))
    }

    pub fn big_integer(n: BigInt) -> Self {
        Expr::Integer(n)
    }

    /// Builds a rational atom. Reduced on construction; the numeric kernel
    /// owns demotion of `n/1` forms. Panics on a zero denominator, use
    /// [`Expr::try_rational`] for unvetted input.
    pub fn rational(num: i64, den: i64) -> Self {
        Expr::Rational(BigRational::new(BigInt::from(num), BigInt::from(den)))
    }

    pub fn try_rational(num: BigInt, den: BigInt) -> crate::Result<Self> {
        if den.is_zero() {
            return Err(crate::CoreError::NotNumeric(format!("{}/0", num)));
        }
        Ok(Expr::Rational(BigRational::new(num, den)))
    }

    pub fn real(value: f64) -> Self {
        Expr::Real(Real::machine(value))
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Expr::Str(s.into())
    }

    pub fn symbol<S: Into<String>>(s: S) -> Self {
        Expr::Symbol(s.into())
    }

    pub fn normal(head: Expr, leaves: Vec<Expr>) -> Self {
        Expr::Normal(Normal::new(head, leaves))
    }

    /// `head[leaves...]` with a symbol head.
    pub fn call<S: Into<String>>(head: S, leaves: Vec<Expr>) -> Self {
        Expr::normal(Expr::symbol(head), leaves)
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::call(system::LIST, items)
    }

    pub fn sequence(items: Vec<Expr>) -> Self {
        Expr::call(system::SEQUENCE, items)
    }

    pub fn bool(b: bool) -> Self {
        Expr::symbol(if b { system::TRUE } else { system::FALSE })
    }

    pub fn is_atom(&self) -> bool {
        !matches!(self, Expr::Normal(_))
    }

    /// Numeric atoms, the ones the numeric kernel understands.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Expr::Integer(_) | Expr::Rational(_) | Expr::Real(_) | Expr::Complex { .. }
        )
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Symbol(s) if s == system::TRUE)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Expr::Integer(n) => n.is_zero(),
            Expr::Rational(r) => r.is_zero(),
            Expr::Real(r) => r.value == 0.0,
            _ => false,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_normal(&self) -> Option<&Normal> {
        match self {
            Expr::Normal(n) => Some(n),
            _ => None,
        }
    }

    /// The symbol name of this expression's head, if the head is a symbol.
    /// Atoms report their type head (`System`Integer`, `System`Symbol`, ...).
    pub fn head_symbol(&self) -> Option<&str> {
        match self {
            Expr::Integer(_) => Some(system::INTEGER),
            Expr::Rational(_) => Some(system::RATIONAL),
            Expr::Real(_) => Some(system::REAL),
            Expr::Complex { .. } => Some(system::COMPLEX),
            Expr::Str(_) => Some(system::STRING),
            Expr::Symbol(_) => Some(system::SYMBOL),
            Expr::Normal(n) => n.head().as_symbol(),
        }
    }

    /// The head as an owned expression (type heads for atoms).
    pub fn head_expr(&self) -> Expr {
        match self {
            Expr::Normal(n) => n.head().clone(),
            other => Expr::symbol(
                other.head_symbol().unwrap_or(system::SYMBOL),
            ),
        }
    }

    /// True if this is a compound expression headed by the given symbol.
    pub fn has_head(&self, name: &str) -> bool {
        match self {
            Expr::Normal(n) => matches!(n.head().as_symbol(), Some(s) if s == name),
            _ => false,
        }
    }

    /// Leaves of a compound headed by `name`, if so shaped.
    pub fn leaves_of(&self, name: &str) -> Option<&[Expr]> {
        match self {
            Expr::Normal(n) if self.has_head(name) => Some(n.leaves()),
            _ => None,
        }
    }

    /// Clears the evaluation cache on this node only (leaves keep theirs).
    pub fn clear_evaluated(&self) {
        if let Expr::Normal(n) = self {
            n.clear_evaluated();
        }
    }
}
