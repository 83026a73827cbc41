use super::{BinaryOp, Expr, ParamId};

/// Visitor that walks predicate trees bottom-up.
///
/// Logical nodes visit both children before handing the results to
/// `combine_and`/`combine_or`; comparisons are leaves. Invocations are inlined
/// by parameter replacement before visiting, so visitors only ever see one
/// parameter.
pub trait ExprVisitor {
    /// Concrete value type produced while walking the predicate.
    type Value;

    /// Evaluates a comparison node.
    fn visit_compare(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Self::Value;

    /// Evaluates any node that is neither a comparison nor a logical combination.
    fn visit_other(&mut self, expr: &Expr) -> Self::Value;

    /// Combines an `And`/`AndAlso` node from its children's results.
    fn combine_and(&mut self, op: BinaryOp, left: Self::Value, right: Self::Value) -> Self::Value;

    /// Combines an `Or`/`OrElse` node from its children's results.
    fn combine_or(&mut self, op: BinaryOp, left: Self::Value, right: Self::Value) -> Self::Value;

    /// Visits the supplied expression by walking the tree.
    fn visit_expr(&mut self, expr: &Expr) -> Self::Value {
        match expr {
            Expr::Binary { op, left, right } if op.is_conjunction() => {
                let left = self.visit_expr(left);
                let right = self.visit_expr(right);
                self.combine_and(*op, left, right)
            }
            Expr::Binary { op, left, right } if op.is_disjunction() => {
                let left = self.visit_expr(left);
                let right = self.visit_expr(right);
                self.combine_or(*op, left, right)
            }
            Expr::Binary { op, left, right } => self.visit_compare(*op, left, right),
            Expr::Invoke { lambda, args } => match lambda.inline(args) {
                Some(inlined) => self.visit_expr(&inlined),
                None => self.visit_other(expr),
            },
            other => self.visit_other(other),
        }
    }
}

/// Returns a copy of `expr` with every `Parameter(from)` replaced by `to`.
#[must_use]
pub fn replace_parameter(expr: &Expr, from: ParamId, to: &Expr) -> Expr {
    match expr {
        Expr::Parameter(id) if *id == from => to.clone(),
        Expr::Parameter(_) | Expr::Constant(_) | Expr::Capture { .. } => expr.clone(),
        Expr::Member { target, field } => Expr::Member {
            target: Box::new(replace_parameter(target, from, to)),
            field: field.clone(),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(replace_parameter(left, from, to)),
            right: Box::new(replace_parameter(right, from, to)),
        },
        Expr::Not(inner) => Expr::Not(Box::new(replace_parameter(inner, from, to))),
        Expr::Call {
            target,
            method,
            args,
        } => Expr::Call {
            target: Box::new(replace_parameter(target, from, to)),
            method: *method,
            args: args
                .iter()
                .map(|arg| replace_parameter(arg, from, to))
                .collect(),
        },
        Expr::Invoke { lambda, args } => {
            let body = replace_parameter(lambda.body(), from, to);
            Expr::Invoke {
                lambda: Box::new(super::Lambda::from_parts(lambda.param(), body)),
                args: args
                    .iter()
                    .map(|arg| replace_parameter(arg, from, to))
                    .collect(),
            }
        }
    }
}
