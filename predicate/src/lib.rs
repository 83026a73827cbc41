#![deny(missing_docs)]
//! Stratus predicate facade crate.
//!
//! Predicates are explicit expression trees over a single lambda parameter:
//! field reads, literals, captured values, comparisons and AND/OR logic, plus
//! a few string methods. Trees are immutable once built. Consumers walk them
//! with [`ExprVisitor`] to translate into native filter dialects, and
//! [`compile`] lowers them into closures for client-side evaluation.

mod core;

pub use self::core::{
    capture, compare_scalars, compile, lit, parse_filter, replace_parameter, BinaryOp,
    CompileError, CompiledPredicate, EvalError, Expr, ExprVisitor, FieldSource, Lambda, Method,
    Param, ParamId, ParseError, ScalarValue,
};
