//! Key/tag classification of member accesses.

use stratus_predicate::{Expr, ParamId};

use crate::entity::{EntityConfig, PARTITION_TAG, ROW_TAG};

/// What a member access addresses on the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The backend partition key.
    PartitionKey,
    /// The backend row key.
    RowKey,
    /// A declared blob tag.
    Tag(String),
    /// Any other field; only client-side evaluation can see it.
    Unclassified,
}

impl Classification {
    /// True for partition key, row key and declared tags.
    #[must_use]
    pub fn is_classified(&self) -> bool {
        !matches!(self, Classification::Unclassified)
    }

    /// Name the classified field carries in the blob tag index.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Classification::PartitionKey => Some(PARTITION_TAG),
            Classification::RowKey => Some(ROW_TAG),
            Classification::Tag(name) => Some(name),
            Classification::Unclassified => None,
        }
    }
}

/// Classifies member accesses of one predicate against one model layout.
///
/// Classification is purely by name: the partition key field
/// (`PartitionKeyProxy ?? "PartitionKey"`) wins over the row key field, which
/// wins over declared tags.
#[derive(Clone, Copy, Debug)]
pub struct Classifier<'a> {
    config: &'a EntityConfig,
    param: ParamId,
}

impl<'a> Classifier<'a> {
    /// Classifier for predicates whose lambda binds `param`.
    #[must_use]
    pub fn new(config: &'a EntityConfig, param: ParamId) -> Self {
        Self { config, param }
    }

    /// Classifies a field name read off the predicate's parameter.
    #[must_use]
    pub fn classify_field(&self, field: &str) -> Classification {
        if field == self.config.partition_key_field() {
            Classification::PartitionKey
        } else if field == self.config.row_key_field() {
            Classification::RowKey
        } else if self.config.declared_tags().contains(field) {
            Classification::Tag(field.to_owned())
        } else {
            Classification::Unclassified
        }
    }

    /// Classifies an expression node.
    ///
    /// Returns `None` when the node is not a field read on the predicate's own
    /// parameter; such nodes are never keys or tags.
    #[must_use]
    pub fn classify(&self, expr: &Expr) -> Option<Classification> {
        expr.member_of(self.param)
            .map(|field| self.classify_field(field))
    }
}
