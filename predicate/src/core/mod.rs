#![deny(missing_docs)]
//! Core predicate structures shared by the table and blob query layers.

mod builder;
mod compile;
mod node;
mod operand;
mod parse;
mod value;
mod visitor;

pub use builder::{capture, lit, Param};
pub use compile::{
    compare_scalars, compile, CompileError, CompiledPredicate, EvalError, FieldSource,
};
pub use node::{Expr, Lambda, ParamId};
pub use operand::{BinaryOp, Method};
pub use parse::{parse_filter, ParseError};
pub use value::ScalarValue;
pub use visitor::{replace_parameter, ExprVisitor};
