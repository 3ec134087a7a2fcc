pub mod error;
pub mod expr;
pub mod order;
pub mod pretty;
pub mod system;

pub use error::{CoreError, Result};
pub use expr::{Expr, Normal, Precision, Real};
pub use order::canonical_cmp;
pub use pretty::format_expr;
