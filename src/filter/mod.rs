//! Translation of predicates into native backend filters.
//!
//! [`FilterVisitor`] walks a predicate bottom-up and assembles the native
//! filter string inline, one fragment per subtree. Alongside the string it
//! reports whether the whole predicate made it into the filter
//! (`simple_filter`), whether translation had to be abandoned (`error`,
//! `operand_error`), and whether only keys and tags were read
//! (`tag_only_filter`). The native filter is an optimization only: callers
//! must still run the original predicate client-side whenever the result is
//! not simple.

pub mod dialect;
pub mod rewrite;

use std::collections::BTreeMap;

use stratus_predicate::{BinaryOp, Expr, ExprVisitor, Lambda, ScalarValue};

use self::dialect::{Dialect, TableDialect, TagDialect};
use crate::{
    classify::{Classification, Classifier},
    entity::{EntityConfig, PARTITION_TAG, ROW_TAG},
    observability::log_debug,
};

/// Observed comparisons per classified field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagCollection {
    entries: BTreeMap<String, Vec<(String, BinaryOp)>>,
}

impl TagCollection {
    /// Records that `name` was compared against `value` with `op`.
    pub fn insert(&mut self, name: &str, value: String, op: BinaryOp) {
        let observations = self.entries.entry(name.to_owned()).or_default();
        if !observations
            .iter()
            .any(|(seen, seen_op)| *seen == value && *seen_op == op)
        {
            observations.push((value, op));
        }
    }

    /// True when every name maps to exactly one `(value, op)` observation.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.entries.values().all(|observations| observations.len() == 1)
    }

    /// True when a name other than the key tags was observed, or more than two names were.
    #[must_use]
    pub fn has_others_than_default_keys(&self) -> bool {
        self.entries.len() > 2
            || self
                .entries
                .keys()
                .any(|name| name != PARTITION_TAG && name != ROW_TAG)
    }

    /// Value `name` is compared to when its only observation is an equality.
    #[must_use]
    pub fn equality(&self, name: &str) -> Option<&str> {
        match self.entries.get(name).map(Vec::as_slice) {
            Some([(value, BinaryOp::Equal)]) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Observations recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> &[(String, BinaryOp)] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Observed names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of observed names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of translating one predicate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitorResult {
    /// Native filter for the translatable part, if any. Always `None` on error.
    pub filter_string: Option<String>,
    /// The whole predicate is expressed by `filter_string`.
    pub simple_filter: bool,
    /// Some subtree could not be resolved; native filtering is abandoned.
    pub error: bool,
    /// The dialect cannot express an operator that was used on classified fields.
    pub operand_error: bool,
    /// Every field read addresses a key or a declared tag.
    pub tag_only_filter: bool,
    /// Comparisons observed per classified field.
    pub tags: TagCollection,
}

/// Translation state of one subtree.
#[derive(Clone, Debug, Default)]
pub struct Fragment {
    text: Option<String>,
    simple: bool,
    error: bool,
    disjunctive: bool,
}

impl Fragment {
    fn empty() -> Self {
        Self::default()
    }

    fn error() -> Self {
        Self {
            error: true,
            ..Self::default()
        }
    }

    fn filter(text: String) -> Self {
        Self {
            text: Some(text),
            simple: true,
            error: false,
            disjunctive: false,
        }
    }

    /// Text ready to sit inside a conjunction.
    fn conjunct(&self, text: String) -> String {
        if self.disjunctive {
            format!("({text})")
        } else {
            text
        }
    }
}

/// Bottom-up visitor assembling a native filter in dialect `D`.
pub struct FilterVisitor<'a, D> {
    dialect: D,
    classifier: Classifier<'a>,
    tags: TagCollection,
    operand_error: bool,
    tag_only: bool,
}

impl<'a, D> FilterVisitor<'a, D>
where
    D: Dialect,
{
    /// Visitor for predicates over `lambda`'s parameter.
    pub fn new(dialect: D, config: &'a EntityConfig, lambda: &Lambda) -> Self {
        Self {
            dialect,
            classifier: Classifier::new(config, lambda.param()),
            tags: TagCollection::default(),
            operand_error: false,
            tag_only: true,
        }
    }

    /// Translates `lambda` and consumes the visitor.
    pub fn translate(mut self, lambda: &Lambda) -> VisitorResult {
        let root = self.visit_expr(lambda.body());
        log_debug!(
            component = "filter",
            event = "filter_translated",
            dialect = self.dialect.name(),
            filter = ?root.text,
            simple = root.simple,
            error = root.error,
            operand_error = self.operand_error,
            tag_only = self.tag_only,
        );
        VisitorResult {
            filter_string: if root.error { None } else { root.text },
            simple_filter: root.simple && !root.error,
            error: root.error,
            operand_error: self.operand_error,
            tag_only_filter: self.tag_only,
            tags: self.tags,
        }
    }

    /// Clears `tag_only` when `expr` reads anything other than keys and tags.
    fn note_fields(&mut self, expr: &Expr) {
        match expr {
            Expr::Member { target, .. } => match self.classifier.classify(expr) {
                Some(classification) if self.dialect_sees(&classification) => {}
                Some(_) => self.tag_only = false,
                None => {
                    self.tag_only = false;
                    self.note_fields(target);
                }
            },
            Expr::Binary { left, right, .. } => {
                self.note_fields(left);
                self.note_fields(right);
            }
            Expr::Not(inner) => self.note_fields(inner),
            Expr::Call { target, args, .. } => {
                self.note_fields(target);
                for arg in args {
                    self.note_fields(arg);
                }
            }
            Expr::Invoke { lambda, args } => match lambda.inline(args) {
                Some(inlined) => self.note_fields(&inlined),
                None => self.tag_only = false,
            },
            Expr::Parameter(_) | Expr::Constant(_) | Expr::Capture { .. } => {}
        }
    }

    fn dialect_sees(&self, classification: &Classification) -> bool {
        self.dialect.field_name(classification).is_some()
    }
}

impl<D> ExprVisitor for FilterVisitor<'_, D>
where
    D: Dialect,
{
    type Value = Fragment;

    fn visit_compare(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Fragment {
        let (member, value, op) = if let Some(value) = right.try_constant() {
            (left, value, op)
        } else if let Some(value) = left.try_constant() {
            (right, value, op.flipped())
        } else {
            self.note_fields(left);
            self.note_fields(right);
            return Fragment::error();
        };
        self.note_fields(member);

        let Some(field) = self
            .classifier
            .classify(member)
            .and_then(|classification| self.dialect.field_name(&classification))
        else {
            return Fragment::empty();
        };
        // Recorded even when nothing is emitted: tag metadata listings rely on
        // every name the client-side predicate reads.
        self.tags.insert(&field.key, native_value(&value), op);
        // Keys and tags are stored as strings; numeric order would not survive.
        if value.is_null()
            || (!value.is_string() && !matches!(op, BinaryOp::Equal | BinaryOp::NotEqual))
        {
            return Fragment::empty();
        }
        if self.dialect.rejects(op) {
            self.operand_error = true;
            return Fragment::empty();
        }
        Fragment::filter(self.dialect.comparison(&field, op, &value))
    }

    fn visit_other(&mut self, expr: &Expr) -> Fragment {
        if let Expr::Constant(ScalarValue::Boolean(_)) = expr {
            return Fragment::empty();
        }
        self.note_fields(expr);
        Fragment::error()
    }

    fn combine_and(&mut self, op: BinaryOp, left: Fragment, right: Fragment) -> Fragment {
        if left.error || right.error {
            return Fragment::error();
        }
        let simple = left.simple && right.simple;
        match (left.text.clone(), right.text.clone()) {
            (Some(l), Some(r)) => Fragment {
                text: Some(
                    self.dialect
                        .join(op, &left.conjunct(l), &right.conjunct(r)),
                ),
                simple,
                error: false,
                disjunctive: false,
            },
            // One side stays client-side only; the other still narrows natively.
            (Some(_), None) => Fragment {
                simple: false,
                ..left
            },
            (None, Some(_)) => Fragment {
                simple: false,
                ..right
            },
            (None, None) => Fragment::empty(),
        }
    }

    fn combine_or(&mut self, op: BinaryOp, left: Fragment, right: Fragment) -> Fragment {
        if self.dialect.rejects(op) {
            self.operand_error = true;
        }
        if left.error || right.error {
            return Fragment::error();
        }
        if self.dialect.rejects(op) {
            return Fragment::empty();
        }
        match (left.text, right.text) {
            (Some(l), Some(r)) => Fragment {
                text: Some(self.dialect.join(op, &l, &r)),
                simple: false,
                error: false,
                disjunctive: true,
            },
            // Narrowing by one side of a disjunction would drop the other side's matches.
            _ => Fragment::empty(),
        }
    }
}

fn native_value(value: &ScalarValue) -> String {
    value.to_string()
}

/// Translates `lambda` into the table service filter dialect.
#[must_use]
pub fn table_filter(lambda: &Lambda, config: &EntityConfig) -> VisitorResult {
    FilterVisitor::new(TableDialect, config, lambda).translate(lambda)
}

/// Translates `lambda` into the blob tag-query dialect.
#[must_use]
pub fn tag_filter(lambda: &Lambda, config: &EntityConfig) -> VisitorResult {
    FilterVisitor::new(TagDialect, config, lambda).translate(lambda)
}
