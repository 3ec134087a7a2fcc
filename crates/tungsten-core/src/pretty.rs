use std::fmt;

use crate::expr::{Expr, Precision};
use crate::system;

/// Renders an expression in FullForm-like notation. Lists get the `{...}`
/// shorthand; symbol names drop the `System`` context prefix for readability.
pub fn format_expr(e: &Expr) -> String {
    match e {
        Expr::Integer(n) => n.to_string(),
        Expr::Rational(r) => format!("{}/{}", r.numer(), r.denom()),
        Expr::Real(r) => match r.precision {
            Precision::Machine => {
                if r.value.fract() == 0.0 && r.value.is_finite() {
                    format!("{:.1}", r.value)
                } else {
                    r.value.to_string()
                }
            }
            Precision::Digits(d) => format!("{}`{}", r.value, d),
        },
        Expr::Complex { re, im } => {
            format!("Complex[{}, {}]", format_expr(re), format_expr(im))
        }
        Expr::Str(s) => format!("\"{}\"", s),
        Expr::Symbol(s) => short_name(s).to_string(),
        Expr::Normal(n) => {
            if e.has_head(system::LIST) {
                let inner: Vec<String> = n.leaves().iter().map(format_expr).collect();
                format!("{{{}}}", inner.join(", "))
            } else {
                let inner: Vec<String> = n.leaves().iter().map(format_expr).collect();
                format!("{}[{}]", format_expr(n.head()), inner.join(", "))
            }
        }
    }
}

fn short_name(qualified: &str) -> &str {
    qualified.strip_prefix("System`").unwrap_or(qualified)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_expr(self))
    }
}
