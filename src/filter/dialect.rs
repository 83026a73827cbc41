//! Native filter dialects and the string assembly they share.

use stratus_predicate::{BinaryOp, ScalarValue};

use crate::{
    classify::Classification,
    entity::{PARTITION_KEY, PARTITION_TAG, ROW_KEY, ROW_TAG},
};

/// A classified field as one dialect names it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldName {
    /// Unquoted name; the key observations are recorded under.
    pub key: String,
    /// Name as it appears in the filter string.
    pub rendered: String,
}

/// Backend filter syntax.
pub trait Dialect {
    /// Dialect name used in logs.
    fn name(&self) -> &'static str;

    /// Names a classified field, or `None` when the dialect cannot address it.
    fn field_name(&self, classification: &Classification) -> Option<FieldName>;

    /// True when the dialect cannot express `op`.
    fn rejects(&self, op: BinaryOp) -> bool;

    /// Renders one comparison: `{field} {op} '{value}'`.
    fn comparison(&self, field: &FieldName, op: BinaryOp, value: &ScalarValue) -> String {
        format!("{} {} {}", field.rendered, op.symbol(), quote_value(value))
    }

    /// Joins two fragments with a combinator, separated by single spaces.
    fn join(&self, op: BinaryOp, left: &str, right: &str) -> String {
        format!("{left} {} {right}", op.symbol())
    }
}

/// Wraps a value in single quotes, doubling embedded quotes.
#[must_use]
pub fn quote_value(value: &ScalarValue) -> String {
    format!("'{}'", value.to_string().replace('\'', "''"))
}

/// Wraps a custom tag name in double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_tag_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// OData-like filter of the table service.
///
/// Only the partition key and row key are addressable; every comparison and
/// both combinators are expressible.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableDialect;

impl Dialect for TableDialect {
    fn name(&self) -> &'static str {
        "table"
    }

    fn field_name(&self, classification: &Classification) -> Option<FieldName> {
        let name = match classification {
            Classification::PartitionKey => PARTITION_KEY,
            Classification::RowKey => ROW_KEY,
            Classification::Tag(_) | Classification::Unclassified => return None,
        };
        Some(FieldName {
            key: name.to_owned(),
            rendered: name.to_owned(),
        })
    }

    fn rejects(&self, _op: BinaryOp) -> bool {
        false
    }
}

/// Tag-query filter of the blob service.
///
/// Keys use the built-in `partition`/`row` identifiers, custom tags are
/// double-quoted. Neither `!=` nor `or` can be expressed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TagDialect;

impl Dialect for TagDialect {
    fn name(&self) -> &'static str {
        "tag"
    }

    fn field_name(&self, classification: &Classification) -> Option<FieldName> {
        let (key, rendered) = match classification {
            Classification::PartitionKey => (PARTITION_TAG.to_owned(), PARTITION_TAG.to_owned()),
            Classification::RowKey => (ROW_TAG.to_owned(), ROW_TAG.to_owned()),
            Classification::Tag(name) => (name.clone(), quote_tag_name(name)),
            Classification::Unclassified => return None,
        };
        Some(FieldName { key, rendered })
    }

    fn rejects(&self, op: BinaryOp) -> bool {
        matches!(op, BinaryOp::NotEqual) || op.is_disjunction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_single_quoted_and_escaped() {
        assert_eq!(quote_value(&ScalarValue::from("alice")), "'alice'");
        assert_eq!(quote_value(&ScalarValue::from("o'brien")), "'o''brien'");
        assert_eq!(quote_value(&ScalarValue::from(42i64)), "'42'");
        assert_eq!(quote_value(&ScalarValue::from(true)), "'true'");
    }

    #[test]
    fn tag_dialect_quotes_custom_names_only() {
        let dialect = TagDialect;
        let partition = dialect
            .field_name(&Classification::PartitionKey)
            .expect("addressable");
        assert_eq!(partition.rendered, "partition");
        let status = dialect
            .field_name(&Classification::Tag("Status".into()))
            .expect("addressable");
        assert_eq!(status.key, "Status");
        assert_eq!(status.rendered, "\"Status\"");
        assert_eq!(
            dialect.comparison(&status, BinaryOp::GreaterThanOrEqual, &"b".into()),
            "\"Status\" >= 'b'"
        );
    }

    #[test]
    fn table_dialect_addresses_keys_only() {
        let dialect = TableDialect;
        assert_eq!(
            dialect
                .field_name(&Classification::RowKey)
                .map(|name| name.rendered),
            Some("RowKey".to_owned())
        );
        assert_eq!(dialect.field_name(&Classification::Tag("Status".into())), None);
        assert_eq!(dialect.join(BinaryOp::OrElse, "a", "b"), "a or b");
    }

    #[test]
    fn only_tag_dialect_rejects_not_equal_and_or() {
        for op in [BinaryOp::NotEqual, BinaryOp::Or, BinaryOp::OrElse] {
            assert!(TagDialect.rejects(op));
            assert!(!TableDialect.rejects(op));
        }
        for op in [
            BinaryOp::Equal,
            BinaryOp::GreaterThan,
            BinaryOp::LessThanOrEqual,
            BinaryOp::And,
            BinaryOp::AndAlso,
        ] {
            assert!(!TagDialect.rejects(op));
        }
    }
}
