//! Lowers predicate trees into nested closures.
//!
//! The tree is walked once at compile time; evaluation only runs the closures.

use std::{fmt, sync::Arc};

use thiserror::Error;

use super::{visitor::replace_parameter, BinaryOp, Expr, Lambda, Method, ParamId, ScalarValue};

/// Anything a compiled predicate can read fields from.
pub trait FieldSource {
    /// Returns the value of `name`, or `None` when the field is absent.
    fn field(&self, name: &str) -> Option<ScalarValue>;
}

/// Source without any fields; used to fold parameter-free expressions.
struct NoFields;

impl FieldSource for NoFields {
    fn field(&self, _name: &str) -> Option<ScalarValue> {
        None
    }
}

/// Errors raised while lowering an expression tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The tree reads a parameter the lambda does not bind.
    #[error("parameter {0} is not bound by the compiled lambda")]
    UnboundParameter(ParamId),
    /// The lambda parameter is used as a value rather than through a field read.
    #[error("the lambda parameter cannot be used as a value")]
    BareParameter,
    /// A field is read off something other than the lambda parameter.
    #[error("field '{field}' is not read from the lambda parameter")]
    UnsupportedMember {
        /// Field name.
        field: String,
    },
    /// A method call has the wrong number of arguments.
    #[error("method {method} expects {expected} argument(s), got {got}")]
    MethodArity {
        /// Method name.
        method: &'static str,
        /// Expected count.
        expected: usize,
        /// Supplied count.
        got: usize,
    },
    /// An invocation does not pass exactly one argument.
    #[error("invoked lambdas take exactly one argument, got {0}")]
    InvokeArity(usize),
}

/// Errors raised while evaluating a compiled predicate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    /// A logical operand or the predicate result was not a boolean.
    #[error("expected a boolean, found {found}")]
    NotBoolean {
        /// Kind of the offending value.
        found: &'static str,
    },
}

type Evaluated = Result<ScalarValue, EvalError>;
type ValueFn = Box<dyn Fn(&dyn FieldSource) -> Evaluated + Send + Sync>;

/// Predicate lowered into closures, ready to run against any [`FieldSource`].
pub struct CompiledPredicate {
    root: ValueFn,
    source: Arc<str>,
}

impl CompiledPredicate {
    /// Evaluates the predicate.
    pub fn evaluate(&self, source: &dyn FieldSource) -> Result<bool, EvalError> {
        expect_bool((self.root)(source)?)
    }
}

impl fmt::Debug for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("source", &self.source)
            .finish()
    }
}

/// Compiles `lambda` into a [`CompiledPredicate`].
pub fn compile(lambda: &Lambda) -> Result<CompiledPredicate, CompileError> {
    let root = lower(lambda.body(), lambda.param())?;
    Ok(CompiledPredicate {
        root,
        source: Arc::from(lambda.to_string()),
    })
}

/// Folds a parameter-free expression to its value.
pub(crate) fn evaluate_constant(expr: &Expr) -> Option<ScalarValue> {
    let lowered = lower(expr, ParamId::DETACHED).ok()?;
    lowered(&NoFields).ok()
}

/// Comparison semantics shared by compiled predicates and constant folding.
///
/// Equality is value equality (numeric across widths, `Null == Null`); ordering
/// against `Null` or a value of another kind is false.
#[must_use]
pub fn compare_scalars(op: BinaryOp, left: &ScalarValue, right: &ScalarValue) -> bool {
    match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        _ => left
            .compare(right)
            .is_some_and(|ordering| op.test_ordering(ordering)),
    }
}

fn kind_of(value: &ScalarValue) -> &'static str {
    match value {
        ScalarValue::Null => "null",
        ScalarValue::Boolean(_) => "boolean",
        ScalarValue::Int64(_) => "int64",
        ScalarValue::UInt64(_) => "uint64",
        ScalarValue::Float64(_) => "float64",
        ScalarValue::Utf8(_) => "utf8",
    }
}

fn expect_bool(value: ScalarValue) -> Result<bool, EvalError> {
    match value {
        ScalarValue::Boolean(value) => Ok(value),
        other => Err(EvalError::NotBoolean {
            found: kind_of(&other),
        }),
    }
}

fn apply_method(method: Method, target: &str, arg: &str) -> bool {
    match method {
        Method::Contains => target.contains(arg),
        Method::StartsWith => target.starts_with(arg),
        Method::EndsWith => target.ends_with(arg),
    }
}

fn lower(expr: &Expr, param: ParamId) -> Result<ValueFn, CompileError> {
    match expr {
        Expr::Constant(value) | Expr::Capture { value, .. } => {
            let value = value.clone();
            Ok(Box::new(move |_: &dyn FieldSource| -> Evaluated {
                Ok(value.clone())
            }))
        }
        Expr::Parameter(id) if *id == param => Err(CompileError::BareParameter),
        Expr::Parameter(id) => Err(CompileError::UnboundParameter(*id)),
        Expr::Member { target, field } => match target.as_ref() {
            Expr::Parameter(id) if *id == param => {
                let field = Arc::clone(field);
                Ok(Box::new(move |source: &dyn FieldSource| -> Evaluated {
                    Ok(source.field(&field).unwrap_or(ScalarValue::Null))
                }))
            }
            Expr::Parameter(id) => Err(CompileError::UnboundParameter(*id)),
            _ => Err(CompileError::UnsupportedMember {
                field: field.to_string(),
            }),
        },
        Expr::Binary { op, left, right } => {
            let left = lower(left, param)?;
            let right = lower(right, param)?;
            let op = *op;
            let lowered: ValueFn = match op {
                BinaryOp::AndAlso => Box::new(move |source: &dyn FieldSource| -> Evaluated {
                    if !expect_bool(left(source)?)? {
                        return Ok(ScalarValue::Boolean(false));
                    }
                    Ok(ScalarValue::Boolean(expect_bool(right(source)?)?))
                }),
                BinaryOp::OrElse => Box::new(move |source: &dyn FieldSource| -> Evaluated {
                    if expect_bool(left(source)?)? {
                        return Ok(ScalarValue::Boolean(true));
                    }
                    Ok(ScalarValue::Boolean(expect_bool(right(source)?)?))
                }),
                BinaryOp::And => Box::new(move |source: &dyn FieldSource| -> Evaluated {
                    let lhs = expect_bool(left(source)?)?;
                    let rhs = expect_bool(right(source)?)?;
                    Ok(ScalarValue::Boolean(lhs & rhs))
                }),
                BinaryOp::Or => Box::new(move |source: &dyn FieldSource| -> Evaluated {
                    let lhs = expect_bool(left(source)?)?;
                    let rhs = expect_bool(right(source)?)?;
                    Ok(ScalarValue::Boolean(lhs | rhs))
                }),
                _ => Box::new(move |source: &dyn FieldSource| -> Evaluated {
                    let lhs = left(source)?;
                    let rhs = right(source)?;
                    Ok(ScalarValue::Boolean(compare_scalars(op, &lhs, &rhs)))
                }),
            };
            Ok(lowered)
        }
        Expr::Not(inner) => {
            let inner = lower(inner, param)?;
            Ok(Box::new(move |source: &dyn FieldSource| -> Evaluated {
                Ok(ScalarValue::Boolean(!expect_bool(inner(source)?)?))
            }))
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            if args.len() != method.arity() {
                return Err(CompileError::MethodArity {
                    method: method.name(),
                    expected: method.arity(),
                    got: args.len(),
                });
            }
            let target = lower(target, param)?;
            let arg = lower(&args[0], param)?;
            let method = *method;
            Ok(Box::new(move |source: &dyn FieldSource| -> Evaluated {
                let target = target(source)?;
                let arg = arg(source)?;
                let matched = match (target.as_str(), arg.as_str()) {
                    (Some(target), Some(arg)) => apply_method(method, target, arg),
                    _ => false,
                };
                Ok(ScalarValue::Boolean(matched))
            }))
        }
        Expr::Invoke { lambda, args } => match args.as_slice() {
            [arg] => lower(&replace_parameter(lambda.body(), lambda.param(), arg), param),
            _ => Err(CompileError::InvokeArity(args.len())),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::core::builder::{capture, lit};

    struct Row(HashMap<&'static str, ScalarValue>);

    impl FieldSource for Row {
        fn field(&self, name: &str) -> Option<ScalarValue> {
            self.0.get(name).cloned()
        }
    }

    fn row() -> Row {
        Row(HashMap::from([
            ("Owner", ScalarValue::from("alice")),
            ("Age", ScalarValue::from(42i64)),
            ("Active", ScalarValue::from(true)),
        ]))
    }

    #[test]
    fn compiled_comparisons_follow_value_semantics() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .and_also(x.field("Age").greater_than_or_equal(40u64))
        });
        let compiled = compile(&lambda).expect("compiles");
        assert!(compiled.evaluate(&row()).expect("evaluates"));

        let mismatch =
            compile(&Lambda::new(|x| x.field("Age").greater_than("40"))).expect("compiles");
        assert!(!mismatch.evaluate(&row()).expect("evaluates"));
    }

    #[test]
    fn missing_fields_read_as_null() {
        let lambda = Lambda::new(|x| x.field("Missing").equals(ScalarValue::Null));
        assert!(compile(&lambda).expect("compiles").evaluate(&row()).expect("evaluates"));
        let ordered = Lambda::new(|x| x.field("Missing").less_than(1i64));
        assert!(!compile(&ordered).expect("compiles").evaluate(&row()).expect("evaluates"));
    }

    #[test]
    fn short_circuit_skips_the_right_side() {
        // Right side is not boolean; AndAlso must not reach it.
        let lambda = Lambda::new(|x| x.field("Active").equals(false).and_also(x.field("Age")));
        assert!(!compile(&lambda).expect("compiles").evaluate(&row()).expect("evaluates"));

        let eager = Lambda::new(|x| x.field("Active").equals(false).and(x.field("Age")));
        assert_eq!(
            compile(&eager).expect("compiles").evaluate(&row()),
            Err(EvalError::NotBoolean { found: "int64" })
        );
    }

    #[test]
    fn string_methods_and_negation() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .starts_with("al")
                .and_also(x.field("Owner").contains("zz").negate())
        });
        assert!(compile(&lambda).expect("compiles").evaluate(&row()).expect("evaluates"));
        let on_number = Lambda::new(|x| x.field("Age").ends_with("2"));
        assert!(!compile(&on_number).expect("compiles").evaluate(&row()).expect("evaluates"));
    }

    #[test]
    fn invocations_compile_by_inlining() {
        let inner = Lambda::new(|y| y.field("Owner").equals(capture("who", "alice")));
        let outer = Lambda::new(|x| inner.invoke(x.expr()));
        assert!(compile(&outer).expect("compiles").evaluate(&row()).expect("evaluates"));
    }

    #[test]
    fn unsupported_shapes_fail_to_compile() {
        let foreign = ParamId::fresh();
        let unbound = Lambda::new(|_| {
            Expr::Member {
                target: Box::new(Expr::Parameter(foreign)),
                field: "Owner".into(),
            }
            .equals("alice")
        });
        assert_eq!(
            compile(&unbound).map(|_| ()),
            Err(CompileError::UnboundParameter(foreign))
        );

        let bare = Lambda::new(|x| x.expr().equals("alice"));
        assert_eq!(compile(&bare).map(|_| ()), Err(CompileError::BareParameter));

        let on_constant = Lambda::new(|_| {
            Expr::Member {
                target: Box::new(lit("x")),
                field: "Len".into(),
            }
            .equals(1i64)
        });
        assert_eq!(
            compile(&on_constant).map(|_| ()),
            Err(CompileError::UnsupportedMember {
                field: "Len".to_owned()
            })
        );

        let arity = Lambda::new(|x| Expr::Call {
            target: Box::new(x.field("Owner")),
            method: Method::Contains,
            args: Vec::new(),
        });
        assert_eq!(
            compile(&arity).map(|_| ()),
            Err(CompileError::MethodArity {
                method: "contains",
                expected: 1,
                got: 0
            })
        );
    }

    #[test]
    fn non_boolean_results_are_rejected() {
        let lambda = Lambda::new(|x| x.field("Age"));
        assert_eq!(
            compile(&lambda).expect("compiles").evaluate(&row()),
            Err(EvalError::NotBoolean { found: "int64" })
        );
    }

    #[test]
    fn constant_folding_rejects_parameters() {
        assert_eq!(
            evaluate_constant(&lit(2i64).less_than(lit(3i64))),
            Some(ScalarValue::Boolean(true))
        );
        let lambda = Lambda::new(|x| x.field("Age").equals(1i64));
        assert_eq!(evaluate_constant(lambda.body()), None);
    }
}
