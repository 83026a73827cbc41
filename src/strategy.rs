//! Execution strategy selection.
//!
//! A strategy is picked once per query from the visitor result. Whenever the
//! native filter does not express the whole predicate, the strategy carries a
//! client-side predicate built from the original, untouched lambda.

use std::fmt;

use stratus_predicate::Lambda;

use crate::{
    compile::{EntityPredicate, TagPredicate},
    entity::{Entity, EntityConfig, PARTITION_KEY, ROW_KEY},
    filter::{rewrite::rewrite_for_tags, table_filter, tag_filter, VisitorResult},
    option::QueryOptions,
};

/// How a blob query runs.
#[derive(Debug)]
pub enum BlobStrategy<T> {
    /// List every blob, no filtering.
    EnumerateAll,
    /// List every blob, download each body and filter with the full predicate.
    ClientFilter {
        /// Original predicate.
        predicate: EntityPredicate<T>,
    },
    /// Exact tag-equality lookup; every returned blob matches.
    NativeTagEquality {
        /// Tag-query filter.
        filter: String,
    },
    /// Tag-query lookup that over-selects, narrowed with the full predicate.
    NativeTagFilter {
        /// Tag-query filter.
        filter: String,
        /// Original predicate.
        predicate: EntityPredicate<T>,
    },
    /// List tag metadata, pre-filter on tags, download survivors only.
    TagMetadata {
        /// Request custom tags along with the key tags.
        include_tags: bool,
        /// Predicate rewritten over tags.
        tag_predicate: TagPredicate,
        /// Original predicate, present when tag-level matches need a re-check.
        full_check: Option<EntityPredicate<T>>,
    },
}

impl<T> BlobStrategy<T> {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            BlobStrategy::EnumerateAll => "enumerate_all",
            BlobStrategy::ClientFilter { .. } => "client_filter",
            BlobStrategy::NativeTagEquality { .. } => "native_tag_equality",
            BlobStrategy::NativeTagFilter { .. } => "native_tag_filter",
            BlobStrategy::TagMetadata { .. } => "tag_metadata",
        }
    }

    /// Native tag-query filter sent to the backend, if any.
    pub fn native_filter(&self) -> Option<&str> {
        match self {
            BlobStrategy::NativeTagEquality { filter }
            | BlobStrategy::NativeTagFilter { filter, .. } => Some(filter),
            _ => None,
        }
    }

    /// True when items are checked against the full predicate after download.
    pub fn has_client_filter(&self) -> bool {
        match self {
            BlobStrategy::ClientFilter { .. } | BlobStrategy::NativeTagFilter { .. } => true,
            BlobStrategy::TagMetadata { full_check, .. } => full_check.is_some(),
            BlobStrategy::EnumerateAll | BlobStrategy::NativeTagEquality { .. } => false,
        }
    }
}

impl<T> fmt::Display for BlobStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a table query runs.
#[derive(Debug)]
pub enum TableStrategy<T> {
    /// Scan every row.
    EnumerateAll,
    /// Fetch one row by its full key.
    PointLookup {
        /// Partition key value.
        partition_key: String,
        /// Row key value.
        row_key: String,
    },
    /// Server-side filter, optionally narrowed client-side.
    Native {
        /// Table filter.
        filter: String,
        /// Original predicate, present when the filter does not express all of it.
        post_filter: Option<EntityPredicate<T>>,
    },
    /// Scan every row and filter with the full predicate.
    ClientFilter {
        /// Original predicate.
        predicate: EntityPredicate<T>,
    },
}

impl<T> TableStrategy<T> {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            TableStrategy::EnumerateAll => "enumerate_all",
            TableStrategy::PointLookup { .. } => "point_lookup",
            TableStrategy::Native { .. } => "native",
            TableStrategy::ClientFilter { .. } => "client_filter",
        }
    }

    /// Table filter sent to the backend, if any.
    pub fn native_filter(&self) -> Option<&str> {
        match self {
            TableStrategy::Native { filter, .. } => Some(filter),
            _ => None,
        }
    }

    /// True when rows are checked against the full predicate client-side.
    pub fn has_client_filter(&self) -> bool {
        match self {
            TableStrategy::Native { post_filter, .. } => post_filter.is_some(),
            TableStrategy::ClientFilter { .. } => true,
            TableStrategy::EnumerateAll | TableStrategy::PointLookup { .. } => false,
        }
    }
}

impl<T> fmt::Display for TableStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Picks the blob strategy for `predicate` over `T`.
pub fn select_blob_strategy<T>(
    predicate: Option<&Lambda>,
    options: &QueryOptions,
) -> BlobStrategy<T>
where
    T: Entity,
{
    let Some(lambda) = predicate else {
        return BlobStrategy::EnumerateAll;
    };
    let config = T::entity_config();
    let result = tag_filter(lambda, config);
    blob_strategy_from(lambda, config, result, options)
}

fn blob_strategy_from<T>(
    lambda: &Lambda,
    config: &EntityConfig,
    result: VisitorResult,
    options: &QueryOptions,
) -> BlobStrategy<T> {
    let client_filter = || BlobStrategy::ClientFilter {
        predicate: EntityPredicate::new(lambda.clone()),
    };
    if result.error || !options.use_tags {
        return client_filter();
    }
    if result.simple_filter {
        let Some(filter) = result.filter_string else {
            return client_filter();
        };
        return if result.tags.is_unique() {
            BlobStrategy::NativeTagEquality { filter }
        } else {
            BlobStrategy::NativeTagFilter {
                filter,
                predicate: EntityPredicate::new(lambda.clone()),
            }
        };
    }
    if result.operand_error {
        if !result.tag_only_filter {
            return client_filter();
        }
        let rewrite = rewrite_for_tags(lambda, config);
        let full_check = (!rewrite.exact || options.verify_tag_matches)
            .then(|| EntityPredicate::new(lambda.clone()));
        return BlobStrategy::TagMetadata {
            include_tags: result.tags.has_others_than_default_keys(),
            tag_predicate: TagPredicate::new(rewrite.lambda),
            full_check,
        };
    }
    match result.filter_string {
        // Partial conjunction: the native fragment only narrows.
        Some(filter) => BlobStrategy::NativeTagFilter {
            filter,
            predicate: EntityPredicate::new(lambda.clone()),
        },
        None => client_filter(),
    }
}

/// Picks the table strategy for `predicate` over `T`.
pub fn select_table_strategy<T>(predicate: Option<&Lambda>) -> TableStrategy<T>
where
    T: Entity,
{
    let Some(lambda) = predicate else {
        return TableStrategy::EnumerateAll;
    };
    let result = table_filter(lambda, T::entity_config());
    table_strategy_from(lambda, result)
}

fn table_strategy_from<T>(lambda: &Lambda, result: VisitorResult) -> TableStrategy<T> {
    if result.error {
        return TableStrategy::ClientFilter {
            predicate: EntityPredicate::new(lambda.clone()),
        };
    }
    if result.simple_filter && result.tags.is_unique() && result.tags.len() == 2 {
        if let (Some(partition_key), Some(row_key)) = (
            result.tags.equality(PARTITION_KEY),
            result.tags.equality(ROW_KEY),
        ) {
            return TableStrategy::PointLookup {
                partition_key: partition_key.to_owned(),
                row_key: row_key.to_owned(),
            };
        }
    }
    match result.filter_string {
        Some(filter) => TableStrategy::Native {
            filter,
            post_filter: (!result.simple_filter).then(|| EntityPredicate::new(lambda.clone())),
        },
        None => TableStrategy::ClientFilter {
            predicate: EntityPredicate::new(lambda.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;
    use stratus_predicate::{FieldSource, Lambda, ScalarValue};

    use super::*;

    struct Order;

    static ORDER_CONFIG: Lazy<EntityConfig> = Lazy::new(|| {
        EntityConfig::builder()
            .partition_key_proxy("Owner")
            .row_key_proxy("Id")
            .tag("Status")
            .build()
            .expect("valid config")
    });

    impl FieldSource for Order {
        fn field(&self, _name: &str) -> Option<ScalarValue> {
            None
        }
    }

    impl Entity for Order {
        fn entity_config() -> &'static EntityConfig {
            &ORDER_CONFIG
        }
    }

    fn blob(lambda: &Lambda) -> BlobStrategy<Order> {
        select_blob_strategy::<Order>(Some(lambda), &QueryOptions::default())
    }

    #[test]
    fn missing_predicate_enumerates_everything() {
        assert!(matches!(
            select_blob_strategy::<Order>(None, &QueryOptions::default()),
            BlobStrategy::EnumerateAll
        ));
        assert!(matches!(
            select_table_strategy::<Order>(None),
            TableStrategy::EnumerateAll
        ));
    }

    #[test]
    fn tag_conjunction_uses_native_equality() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .and_also(x.field("Status").equals("active"))
        });
        let strategy = blob(&lambda);
        assert_eq!(
            strategy.native_filter(),
            Some("partition = 'alice' and \"Status\" = 'active'")
        );
        assert!(matches!(strategy, BlobStrategy::NativeTagEquality { .. }));
        assert!(!strategy.has_client_filter());
    }

    #[test]
    fn tag_disjunction_uses_tag_metadata_without_download_check() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .or_else(x.field("Status").equals("active"))
        });
        match blob(&lambda) {
            BlobStrategy::TagMetadata {
                include_tags,
                full_check,
                ..
            } => {
                assert!(include_tags);
                assert!(full_check.is_none());
            }
            other => panic!("unexpected strategy {other}"),
        }
    }

    #[test]
    fn key_only_disjunction_skips_custom_tags() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .or_else(x.field("Id").equals("7"))
        });
        match blob(&lambda) {
            BlobStrategy::TagMetadata { include_tags, .. } => assert!(!include_tags),
            other => panic!("unexpected strategy {other}"),
        }
    }

    #[test]
    fn verification_forces_full_check() {
        let lambda = Lambda::new(|x| x.field("Status").not_equals("closed"));
        let options = QueryOptions::default().verify_tag_matches(true);
        match select_blob_strategy::<Order>(Some(&lambda), &options) {
            BlobStrategy::TagMetadata { full_check, .. } => assert!(full_check.is_some()),
            other => panic!("unexpected strategy {other}"),
        }
    }

    #[test]
    fn method_calls_fall_back_to_client_filtering() {
        let lambda = Lambda::new(|x| x.field("Notes").contains("x"));
        let strategy = blob(&lambda);
        assert!(matches!(strategy, BlobStrategy::ClientFilter { .. }));
        assert!(strategy.has_client_filter());
        assert!(matches!(
            select_table_strategy::<Order>(Some(&lambda)),
            TableStrategy::ClientFilter { .. }
        ));
    }

    #[test]
    fn duplicate_tags_narrow_client_side() {
        let lambda = Lambda::new(|x| {
            x.field("Status")
                .equals("a")
                .and_also(x.field("Status").equals("b"))
        });
        let strategy = blob(&lambda);
        assert!(matches!(strategy, BlobStrategy::NativeTagFilter { .. }));
        assert!(strategy.has_client_filter());
    }

    #[test]
    fn partial_conjunction_narrows_natively_and_client_side() {
        let lambda = Lambda::new(|x| {
            x.field("Status")
                .equals("x")
                .and_also(x.field("Total").equals(3i64))
        });
        let strategy = blob(&lambda);
        assert_eq!(strategy.native_filter(), Some("\"Status\" = 'x'"));
        assert!(strategy.has_client_filter());

        let table = select_table_strategy::<Order>(Some(
            &Lambda::new(|x| x.field("Owner").equals("a").and_also(x.field("Total").equals(3i64))),
        ));
        assert_eq!(table.native_filter(), Some("PartitionKey = 'a'"));
        assert!(table.has_client_filter());
    }

    #[test]
    fn disabled_tags_always_filter_client_side() {
        let lambda = Lambda::new(|x| x.field("Owner").equals("alice"));
        let options = QueryOptions::default().use_tags(false);
        assert!(matches!(
            select_blob_strategy::<Order>(Some(&lambda), &options),
            BlobStrategy::ClientFilter { .. }
        ));
    }

    #[test]
    fn full_key_equality_is_a_point_lookup() {
        let lambda = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .and_also(x.field("Id").equals(7u64))
        });
        match select_table_strategy::<Order>(Some(&lambda)) {
            TableStrategy::PointLookup {
                partition_key,
                row_key,
            } => {
                assert_eq!(partition_key, "alice");
                assert_eq!(row_key, "7");
            }
            other => panic!("unexpected strategy {other}"),
        }

        let range = Lambda::new(|x| {
            x.field("Owner")
                .equals("alice")
                .and_also(x.field("Id").greater_than("7"))
        });
        let strategy = select_table_strategy::<Order>(Some(&range));
        assert_eq!(
            strategy.native_filter(),
            Some("PartitionKey = 'alice' and RowKey > '7'")
        );
        assert!(!strategy.has_client_filter());
    }

    #[test]
    fn unclassified_only_predicates_filter_client_side() {
        let lambda = Lambda::new(|x| x.field("Total").greater_than(3i64));
        assert!(matches!(
            select_table_strategy::<Order>(Some(&lambda)),
            TableStrategy::ClientFilter { .. }
        ));
    }
}
