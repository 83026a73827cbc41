//! Rewrites entity predicates into predicates over blob tags.
//!
//! The rewritten lambda reads every classified field through its canonical
//! tag name, so it can be evaluated against a [`TagAccessor`] without
//! downloading the blob body. Clauses that cannot be decided from tags are
//! replaced by `true` at the nearest enclosing `and`/`or` operand, which makes
//! the tag-level predicate a superset filter; [`TagRewrite::exact`] tells the
//! caller whether a full-entity check must follow.
//!
//! [`TagAccessor`]: crate::entity::TagAccessor

use std::sync::Arc;

use stratus_predicate::{BinaryOp, Expr, Lambda, ParamId, ScalarValue};

use crate::{classify::Classifier, entity::EntityConfig};

/// Tag-level form of an entity predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct TagRewrite {
    /// Predicate over a tag accessor.
    pub lambda: Lambda,
    /// No clause was relaxed; a tag-level match is a full match.
    pub exact: bool,
}

/// Rewrites `lambda` so it reads tags instead of entity fields.
#[must_use]
pub fn rewrite_for_tags(lambda: &Lambda, config: &EntityConfig) -> TagRewrite {
    let mut rewriter = TagRewriter {
        classifier: Classifier::new(config, lambda.param()),
        param: ParamId::fresh(),
        relaxed: false,
    };
    let body = match rewriter.rewrite(lambda.body()) {
        Some(body) => body,
        None => rewriter.relax(),
    };
    TagRewrite {
        lambda: Lambda::from_parts(rewriter.param, body),
        exact: !rewriter.relaxed,
    }
}

struct TagRewriter<'a> {
    classifier: Classifier<'a>,
    param: ParamId,
    relaxed: bool,
}

impl TagRewriter<'_> {
    /// Rewritten node, or `None` when the node cannot be decided from tags.
    fn rewrite(&mut self, expr: &Expr) -> Option<Expr> {
        if let Some(value) = expr.try_constant() {
            return Some(Expr::Constant(value));
        }
        match expr {
            Expr::Binary { op, left, right } if op.is_logical() => {
                let left = self.operand(left);
                let right = self.operand(right);
                Some(Expr::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Binary { op, left, right } => self.comparison(*op, left, right),
            Expr::Not(inner) => {
                // A relaxed clause under `not` would turn into a narrowing one.
                let outer = std::mem::replace(&mut self.relaxed, false);
                let rewritten = self.rewrite(inner);
                let inner_relaxed = self.relaxed;
                self.relaxed |= outer;
                if inner_relaxed {
                    return None;
                }
                rewritten.map(|inner| Expr::Not(Box::new(inner)))
            }
            Expr::Invoke { lambda, args } => {
                let inlined = lambda.inline(args)?;
                self.rewrite(&inlined)
            }
            Expr::Parameter(_)
            | Expr::Member { .. }
            | Expr::Constant(_)
            | Expr::Capture { .. }
            | Expr::Call { .. } => None,
        }
    }

    fn operand(&mut self, expr: &Expr) -> Expr {
        match self.rewrite(expr) {
            Some(rewritten) => rewritten,
            None => self.relax(),
        }
    }

    fn relax(&mut self) -> Expr {
        self.relaxed = true;
        Expr::Constant(ScalarValue::Boolean(true))
    }

    fn comparison(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Option<Expr> {
        let (member, value, op) = match (left.try_constant(), right.try_constant()) {
            (None, Some(value)) => (left, value, op),
            (Some(value), None) => (right, value, op.flipped()),
            _ => return None,
        };
        let classification = self.classifier.classify(member)?;
        let tag = classification.tag_name()?;
        let value = match (op, value) {
            (_, value @ (ScalarValue::Utf8(_) | ScalarValue::Null)) => value,
            (BinaryOp::Equal | BinaryOp::NotEqual, value) => {
                ScalarValue::Utf8(value.to_string())
            }
            // Tags compare as strings; numeric order would not survive.
            _ => return None,
        };
        Some(Expr::Binary {
            op,
            left: Box::new(Expr::Member {
                target: Box::new(Expr::Parameter(self.param)),
                field: Arc::from(tag),
            }),
            right: Box::new(Expr::Constant(value)),
        })
    }
}
