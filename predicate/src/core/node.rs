use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering as AtomicOrdering},
        Arc,
    },
};

use super::{compile, visitor::replace_parameter, BinaryOp, Method, ScalarValue};

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a lambda parameter.
///
/// Every [`Lambda`] owns a fresh id, so two predicates built independently never
/// share a parameter until one is rewritten onto the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

impl ParamId {
    /// Id that no lambda ever binds; expressions lowered against it must be parameter free.
    pub(crate) const DETACHED: ParamId = ParamId(0);

    /// Allocates a process-unique parameter id.
    #[must_use]
    pub fn fresh() -> Self {
        ParamId(NEXT_PARAM_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Expression tree node of a `T -> bool` predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Reference to a lambda parameter.
    Parameter(ParamId),
    /// Field read on `target`.
    Member {
        /// Object the field is read from.
        target: Box<Expr>,
        /// Field name as declared on the model.
        field: Arc<str>,
    },
    /// Literal value.
    Constant(ScalarValue),
    /// Value captured from the caller's environment.
    Capture {
        /// Name of the captured binding, kept for diagnostics.
        name: Arc<str>,
        /// Captured value.
        value: ScalarValue,
    },
    /// Binary comparison or logical combination.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// String method call on `target`.
    Call {
        /// Receiver.
        target: Box<Expr>,
        /// Method.
        method: Method,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Invocation of another lambda with the given arguments.
    Invoke {
        /// Invoked lambda.
        lambda: Box<Lambda>,
        /// Arguments bound to the lambda parameter.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Returns the field name when this node reads a field directly off `param`.
    #[must_use]
    pub fn member_of(&self, param: ParamId) -> Option<&str> {
        match self {
            Expr::Member { target, field } if **target == Expr::Parameter(param) => {
                Some(field.as_ref())
            }
            _ => None,
        }
    }

    /// Evaluates the node when it does not depend on any parameter.
    ///
    /// Literals, captured values and comparisons or logic over them are
    /// constant-evaluable; anything reading a parameter is not.
    #[must_use]
    pub fn try_constant(&self) -> Option<ScalarValue> {
        match self {
            Expr::Constant(value) | Expr::Capture { value, .. } => Some(value.clone()),
            Expr::Parameter(_) | Expr::Member { .. } => None,
            _ => compile::evaluate_constant(self),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(id) => write!(f, "{id}"),
            Expr::Member { target, field } => write!(f, "{target}.{field}"),
            Expr::Constant(ScalarValue::Utf8(value)) => write!(f, "{value:?}"),
            Expr::Constant(ScalarValue::Null) => f.write_str("null"),
            Expr::Constant(value) => write!(f, "{value}"),
            Expr::Capture { name, .. } => write!(f, "{name}"),
            Expr::Binary { op, left, right } => {
                let symbol = match op {
                    BinaryOp::Equal => "==",
                    BinaryOp::And => "&",
                    BinaryOp::AndAlso => "&&",
                    BinaryOp::Or => "|",
                    BinaryOp::OrElse => "||",
                    other => other.symbol(),
                };
                write!(f, "({left} {symbol} {right})")
            }
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::Call {
                target,
                method,
                args,
            } => {
                write!(f, "{target}.{}(", method.name())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Invoke { lambda, args } => {
                write!(f, "({lambda})(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Single-parameter predicate `param => body`.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    param: ParamId,
    body: Expr,
}

impl Lambda {
    /// Assembles a lambda from an explicit parameter and body.
    #[must_use]
    pub fn from_parts(param: ParamId, body: Expr) -> Self {
        Self { param, body }
    }

    /// Lambda that ignores its parameter and returns `value`.
    #[must_use]
    pub fn constant(value: bool) -> Self {
        Self::from_parts(ParamId::fresh(), Expr::Constant(ScalarValue::Boolean(value)))
    }

    /// Parameter bound by this lambda.
    #[must_use]
    pub fn param(&self) -> ParamId {
        self.param
    }

    /// Lambda body.
    #[must_use]
    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Consumes the lambda and returns its body.
    #[must_use]
    pub fn into_body(self) -> Expr {
        self.body
    }

    /// Combines two predicates with `AndAlso` over a single shared parameter.
    ///
    /// `other`'s parameter is replaced by this lambda's parameter; the result
    /// is one flat conjunction rather than an invocation of `other`.
    #[must_use]
    pub fn and_also(self, other: Lambda) -> Lambda {
        self.combine(BinaryOp::AndAlso, other)
    }

    /// Combines two predicates with `OrElse` over a single shared parameter.
    #[must_use]
    pub fn or_else(self, other: Lambda) -> Lambda {
        self.combine(BinaryOp::OrElse, other)
    }

    fn combine(self, op: BinaryOp, other: Lambda) -> Lambda {
        let param = self.param;
        let right = other.rebind(param);
        Lambda::from_parts(
            param,
            Expr::Binary {
                op,
                left: Box::new(self.body),
                right: Box::new(right),
            },
        )
    }

    /// Returns this lambda's body with its parameter replaced by `param`.
    #[must_use]
    pub fn rebind(&self, param: ParamId) -> Expr {
        replace_parameter(&self.body, self.param, &Expr::Parameter(param))
    }

    /// Builds an invocation node applying this lambda to `arg`.
    #[must_use]
    pub fn invoke(self, arg: Expr) -> Expr {
        Expr::Invoke {
            lambda: Box::new(self),
            args: vec![arg],
        }
    }

    /// Inlines an invocation with `args`; only single-argument calls inline.
    #[must_use]
    pub fn inline(&self, args: &[Expr]) -> Option<Expr> {
        match args {
            [arg] => Some(replace_parameter(&self.body, self.param, arg)),
            _ => None,
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.param, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::lit;

    #[test]
    fn fresh_params_are_distinct() {
        let a = ParamId::fresh();
        let b = ParamId::fresh();
        assert_ne!(a, b);
        assert_ne!(a, ParamId::DETACHED);
    }

    #[test]
    fn and_also_shares_one_parameter() {
        let a = Lambda::new(|x| x.field("Owner").equals("alice"));
        let b = Lambda::new(|y| y.field("Status").equals("active"));
        let param = a.param();
        let combined = a.and_also(b);
        assert_eq!(combined.param(), param);
        let Expr::Binary { op, right, .. } = combined.body() else {
            panic!("expected binary body");
        };
        assert_eq!(*op, BinaryOp::AndAlso);
        let Expr::Binary { left, .. } = right.as_ref() else {
            panic!("expected comparison");
        };
        assert_eq!(left.member_of(param), Some("Status"));
    }

    #[test]
    fn member_of_ignores_foreign_parameters() {
        let lambda = Lambda::new(|x| x.field("Id").equals(1i64));
        let other = ParamId::fresh();
        let Expr::Binary { left, .. } = lambda.body() else {
            panic!("expected comparison");
        };
        assert_eq!(left.member_of(lambda.param()), Some("Id"));
        assert_eq!(left.member_of(other), None);
    }

    #[test]
    fn constant_folding_over_captures() {
        let expr = crate::core::builder::capture("limit", 10i64).greater_than(lit(3i64));
        assert_eq!(expr.try_constant(), Some(ScalarValue::Boolean(true)));
        let lambda = Lambda::new(|x| x.field("Id").equals(1i64));
        assert_eq!(lambda.body().try_constant(), None);
    }

    #[test]
    fn inline_replaces_the_invoked_parameter() {
        let inner = Lambda::new(|x| x.field("Status").equals("active"));
        let outer = ParamId::fresh();
        let inlined = inner
            .inline(&[Expr::Parameter(outer)])
            .expect("single argument inlines");
        let Expr::Binary { left, .. } = inlined else {
            panic!("expected comparison");
        };
        assert_eq!(left.member_of(outer), Some("Status"));
    }

    #[test]
    fn display_renders_readable_trees() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .or_else(x.field("Age").greater_than(3i64))
        });
        let rendered = lambda.to_string();
        assert!(rendered.contains(".Owner == \"alice\""), "{rendered}");
        assert!(rendered.contains("||"), "{rendered}");
    }
}
