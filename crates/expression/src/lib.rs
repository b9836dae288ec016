//! The safe expression sandbox (§4.2) and condition evaluator (§4.3).
//!
//! Parses and evaluates a restricted expression language over a whitelist
//! of bound names (`context`, `body`, `headers`). No identifier outside the
//! whitelist, no attribute starting with `_`, and no call to a
//! non-whitelisted function can ever reach evaluation — both are rejected
//! at parse time.

pub mod ast;
pub mod condition;
pub mod error;
pub mod eval;
pub mod parser;
pub mod value;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use condition::{evaluate, evaluate_safe};
pub use error::{ExpressionError, ExpressionSecurityError};
pub use eval::{eval as eval_expr, Bindings};
pub use parser::parse;
pub use value::Value;
