//! Small embedded DSL for composing predicate trees.

use std::sync::Arc;

use super::{BinaryOp, Expr, Lambda, Method, ParamId, ScalarValue};

/// Handle to the parameter of a lambda under construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Param {
    id: ParamId,
}

impl Param {
    /// Handle for an existing parameter id.
    #[must_use]
    pub fn from_id(id: ParamId) -> Self {
        Self { id }
    }

    /// Parameter id.
    #[must_use]
    pub fn id(self) -> ParamId {
        self.id
    }

    /// Parameter as an expression node.
    #[must_use]
    pub fn expr(self) -> Expr {
        Expr::Parameter(self.id)
    }

    /// Reads `name` off the parameter.
    #[must_use]
    pub fn field<N>(self, name: N) -> Expr
    where
        N: Into<Arc<str>>,
    {
        Expr::Member {
            target: Box::new(self.expr()),
            field: name.into(),
        }
    }
}

impl Lambda {
    /// Builds a lambda over a fresh parameter.
    #[must_use]
    pub fn new<F>(build: F) -> Self
    where
        F: FnOnce(Param) -> Expr,
    {
        let id = ParamId::fresh();
        let body = build(Param { id });
        Lambda::from_parts(id, body)
    }
}

/// Literal node.
#[must_use]
pub fn lit<V>(value: V) -> Expr
where
    V: Into<ScalarValue>,
{
    Expr::Constant(value.into())
}

/// Captured-variable node; constant-evaluable like a literal.
#[must_use]
pub fn capture<N, V>(name: N, value: V) -> Expr
where
    N: Into<Arc<str>>,
    V: Into<ScalarValue>,
{
    Expr::Capture {
        name: name.into(),
        value: value.into(),
    }
}

impl Expr {
    fn binary<R>(self, op: BinaryOp, right: R) -> Expr
    where
        R: Into<Expr>,
    {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    /// `self == right`.
    #[must_use]
    pub fn equals<R: Into<Expr>>(self, right: R) -> Expr {
        self.binary(BinaryOp::Equal, right)
    }

    /// `self != right`.
    #[must_use]
    pub fn not_equals<R: Into<Expr>>(self, right: R) -> Expr {
        self.binary(BinaryOp::NotEqual, right)
    }

    /// `self > right`.
    #[must_use]
    pub fn greater_than<R: Into<Expr>>(self, right: R) -> Expr {
        self.binary(BinaryOp::GreaterThan, right)
    }

    /// `self >= right`.
    #[must_use]
    pub fn greater_than_or_equal<R: Into<Expr>>(self, right: R) -> Expr {
        self.binary(BinaryOp::GreaterThanOrEqual, right)
    }

    /// `self < right`.
    #[must_use]
    pub fn less_than<R: Into<Expr>>(self, right: R) -> Expr {
        self.binary(BinaryOp::LessThan, right)
    }

    /// `self <= right`.
    #[must_use]
    pub fn less_than_or_equal<R: Into<Expr>>(self, right: R) -> Expr {
        self.binary(BinaryOp::LessThanOrEqual, right)
    }

    /// Applies an arbitrary binary operator.
    #[must_use]
    pub fn compare<R: Into<Expr>>(self, op: BinaryOp, right: R) -> Expr {
        self.binary(op, right)
    }

    /// Non short-circuiting `self & right`.
    #[must_use]
    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    /// Short-circuiting `self && right`.
    #[must_use]
    pub fn and_also(self, right: Expr) -> Expr {
        self.binary(BinaryOp::AndAlso, right)
    }

    /// Non short-circuiting `self | right`.
    #[must_use]
    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    /// Short-circuiting `self || right`.
    #[must_use]
    pub fn or_else(self, right: Expr) -> Expr {
        self.binary(BinaryOp::OrElse, right)
    }

    /// `!self`.
    #[must_use]
    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    fn call<A: Into<Expr>>(self, method: Method, arg: A) -> Expr {
        Expr::Call {
            target: Box::new(self),
            method,
            args: vec![arg.into()],
        }
    }

    /// `self.contains(arg)`.
    #[must_use]
    pub fn contains<A: Into<Expr>>(self, arg: A) -> Expr {
        self.call(Method::Contains, arg)
    }

    /// `self.starts_with(arg)`.
    #[must_use]
    pub fn starts_with<A: Into<Expr>>(self, arg: A) -> Expr {
        self.call(Method::StartsWith, arg)
    }

    /// `self.ends_with(arg)`.
    #[must_use]
    pub fn ends_with<A: Into<Expr>>(self, arg: A) -> Expr {
        self.call(Method::EndsWith, arg)
    }
}

macro_rules! expr_from_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Expr::Constant(ScalarValue::from(value))
                }
            }
        )*
    };
}

expr_from_literal!(bool, i32, i64, u32, u64, f64, String, &str, &String);

impl From<ScalarValue> for Expr {
    fn from(value: ScalarValue) -> Self {
        Expr::Constant(value)
    }
}
