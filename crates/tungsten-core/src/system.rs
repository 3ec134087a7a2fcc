//! Well-known `System`` symbol names.
//!
//! The core treats symbol names as opaque resolved strings; the ones it has
//! to recognize structurally (pattern heads, `Sequence`, `List`, truth
//! values) are collected here so there is one place to look them up.

pub const TRUE: &str = "System`True";
pub const FALSE: &str = "System`False";

pub const LIST: &str = "System`List";
pub const SEQUENCE: &str = "System`Sequence";

// Atom type heads.
pub const INTEGER: &str = "System`Integer";
pub const RATIONAL: &str = "System`Rational";
pub const REAL: &str = "System`Real";
pub const COMPLEX: &str = "System`Complex";
pub const STRING: &str = "System`String";
pub const SYMBOL: &str = "System`Symbol";

// Pattern vocabulary.
pub const BLANK: &str = "System`Blank";
pub const BLANK_SEQUENCE: &str = "System`BlankSequence";
pub const BLANK_NULL_SEQUENCE: &str = "System`BlankNullSequence";
pub const PATTERN: &str = "System`Pattern";
pub const PATTERN_TEST: &str = "System`PatternTest";
pub const CONDITION: &str = "System`Condition";
pub const ALTERNATIVES: &str = "System`Alternatives";
pub const OPTIONAL: &str = "System`Optional";
pub const EXCEPT: &str = "System`Except";

// Arithmetic heads wired into the shipped builtin registry.
pub const PLUS: &str = "System`Plus";
pub const TIMES: &str = "System`Times";
pub const POWER: &str = "System`Power";
pub const MINUS: &str = "System`Minus";
pub const DIVIDE: &str = "System`Divide";

// Structural builtins.
pub const SAME_Q: &str = "System`SameQ";
pub const UNSAME_Q: &str = "System`UnsameQ";
pub const HEAD: &str = "System`Head";
pub const LENGTH: &str = "System`Length";
pub const COMPOUND_EXPRESSION: &str = "System`CompoundExpression";

// Defaults participate both as a rule slot and in Optional resolution.
pub const DEFAULT: &str = "System`Default";

// Session markers.
pub const ABORTED: &str = "System`$Aborted";
pub const FAILED: &str = "System`$Failed";
pub const NULL: &str = "System`Null";

// Message plumbing.
pub const GENERAL: &str = "System`General";
pub const RECURSION_LIMIT: &str = "System`$RecursionLimit";
pub const ITERATION_LIMIT: &str = "System`$IterationLimit";
