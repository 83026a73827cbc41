//! Per-model key and tag layout.
//!
//! Every persisted model carries one immutable [`EntityConfig`], normally held
//! in a `once_cell::sync::Lazy` static by the model's [`Entity`] impl. The
//! configuration names the fields bound to the backend partition key and row
//! key, and the fields mirrored into blob tags.

use std::{collections::BTreeMap, collections::BTreeSet, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use stratus_predicate::{FieldSource, ScalarValue};
use thiserror::Error;

/// Literal field name of the backend partition key.
pub const PARTITION_KEY: &str = "PartitionKey";
/// Literal field name of the backend row key.
pub const ROW_KEY: &str = "RowKey";
/// Canonical tag name the partition key is stored under.
pub const PARTITION_TAG: &str = "partition";
/// Canonical tag name the row key is stored under.
pub const ROW_TAG: &str = "row";

static TAG_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9 +\-./:=_]{1,128}$").expect("tag name pattern is valid")
});

/// Errors raised while building an [`EntityConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Partition and row key proxies name the same field.
    #[error("partition key and row key proxies both name '{0}'")]
    DuplicateProxy(String),
    /// A proxy name is empty.
    #[error("key proxy names must not be empty")]
    EmptyProxy,
    /// A declared tag name violates the backend tag-key grammar.
    #[error("invalid tag name '{0}'")]
    InvalidTagName(String),
    /// A declared tag reuses a canonical key tag name.
    #[error("tag name '{0}' is reserved for the key tags")]
    ReservedTagName(String),
}

/// Key/tag layout of one model type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityConfig {
    partition_key_proxy: Option<String>,
    row_key_proxy: Option<String>,
    declared_tags: BTreeSet<String>,
}

impl EntityConfig {
    /// Starts a configuration with no proxies and no declared tags.
    #[must_use]
    pub fn builder() -> EntityConfigBuilder {
        EntityConfigBuilder::default()
    }

    /// Field bound to the partition key when it is renamed.
    #[must_use]
    pub fn partition_key_proxy(&self) -> Option<&str> {
        self.partition_key_proxy.as_deref()
    }

    /// Field bound to the row key when it is renamed.
    #[must_use]
    pub fn row_key_proxy(&self) -> Option<&str> {
        self.row_key_proxy.as_deref()
    }

    /// Field that addresses the partition key in predicates.
    #[must_use]
    pub fn partition_key_field(&self) -> &str {
        self.partition_key_proxy().unwrap_or(PARTITION_KEY)
    }

    /// Field that addresses the row key in predicates.
    #[must_use]
    pub fn row_key_field(&self) -> &str {
        self.row_key_proxy().unwrap_or(ROW_KEY)
    }

    /// Fields materialized as blob tags, excluding the implicit key tags.
    #[must_use]
    pub fn declared_tags(&self) -> &BTreeSet<String> {
        &self.declared_tags
    }

    /// All tag names a blob of this model carries, key tags included.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        [PARTITION_TAG, ROW_TAG]
            .into_iter()
            .chain(self.declared_tags.iter().map(String::as_str))
    }
}

/// Builder for [`EntityConfig`].
#[derive(Clone, Debug, Default)]
pub struct EntityConfigBuilder {
    partition_key_proxy: Option<String>,
    row_key_proxy: Option<String>,
    declared_tags: BTreeSet<String>,
}

impl EntityConfigBuilder {
    /// Binds the partition key to `field`.
    #[must_use]
    pub fn partition_key_proxy(self, field: impl Into<String>) -> Self {
        EntityConfigBuilder {
            partition_key_proxy: Some(field.into()),
            ..self
        }
    }

    /// Binds the row key to `field`.
    #[must_use]
    pub fn row_key_proxy(self, field: impl Into<String>) -> Self {
        EntityConfigBuilder {
            row_key_proxy: Some(field.into()),
            ..self
        }
    }

    /// Declares `field` as a blob tag.
    #[must_use]
    pub fn tag(mut self, field: impl Into<String>) -> Self {
        self.declared_tags.insert(field.into());
        self
    }

    /// Validates and freezes the configuration.
    pub fn build(self) -> Result<EntityConfig, ConfigError> {
        for proxy in [&self.partition_key_proxy, &self.row_key_proxy]
            .into_iter()
            .flatten()
        {
            if proxy.is_empty() {
                return Err(ConfigError::EmptyProxy);
            }
        }
        let partition = self.partition_key_proxy.as_deref().unwrap_or(PARTITION_KEY);
        let row = self.row_key_proxy.as_deref().unwrap_or(ROW_KEY);
        if partition == row {
            return Err(ConfigError::DuplicateProxy(partition.to_owned()));
        }
        for tag in &self.declared_tags {
            if tag == PARTITION_TAG || tag == ROW_TAG {
                return Err(ConfigError::ReservedTagName(tag.clone()));
            }
            if !TAG_NAME.is_match(tag) {
                return Err(ConfigError::InvalidTagName(tag.clone()));
            }
        }
        Ok(EntityConfig {
            partition_key_proxy: self.partition_key_proxy,
            row_key_proxy: self.row_key_proxy,
            declared_tags: self.declared_tags,
        })
    }
}

/// A persisted model.
///
/// Field reads go through [`FieldSource`], so predicates never need
/// reflection over the model.
pub trait Entity: FieldSource + Send + Sync + 'static {
    /// The model's key/tag layout.
    fn entity_config() -> &'static EntityConfig;

    /// Current partition key value, in its string form.
    fn partition_key(&self) -> String {
        self.field(Self::entity_config().partition_key_field())
            .and_then(|value| value.to_tag_string())
            .unwrap_or_default()
    }

    /// Current row key value, in its string form.
    fn row_key(&self) -> String {
        self.field(Self::entity_config().row_key_field())
            .and_then(|value| value.to_tag_string())
            .unwrap_or_default()
    }

    /// Tags a blob holding this entity carries.
    fn tags(&self) -> Tags {
        let config = Self::entity_config();
        let mut tags = Tags::new();
        tags.insert(PARTITION_TAG, self.partition_key());
        tags.insert(ROW_TAG, self.row_key());
        for name in config.declared_tags() {
            if let Some(value) = self.field(name).and_then(|value| value.to_tag_string()) {
                tags.insert(name.as_str(), value);
            }
        }
        tags
    }
}

/// Ordered `name -> value` map of blob tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no tag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keeps only the tags whose name satisfies `keep`.
    #[must_use]
    pub fn retain_names(mut self, mut keep: impl FnMut(&str) -> bool) -> Self {
        self.0.retain(|name, _| keep(name));
        self
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

/// Read view over one blob's tags, evaluated by tag-level predicates.
///
/// Every tag reads as a string; absent tags read as `Null`.
#[derive(Clone, Debug)]
pub struct TagAccessor<'a> {
    tags: &'a Tags,
}

impl<'a> TagAccessor<'a> {
    /// Wraps `tags`.
    #[must_use]
    pub fn new(tags: &'a Tags) -> Self {
        Self { tags }
    }
}

impl FieldSource for TagAccessor<'_> {
    fn field(&self, name: &str) -> Option<ScalarValue> {
        self.tags.get(name).map(ScalarValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order {
        owner: String,
        id: u64,
        status: Option<String>,
    }

    static ORDER_CONFIG: Lazy<EntityConfig> = Lazy::new(|| {
        EntityConfig::builder()
            .partition_key_proxy("Owner")
            .row_key_proxy("Id")
            .tag("Status")
            .build()
            .expect("valid config")
    });

    impl FieldSource for Order {
        fn field(&self, name: &str) -> Option<ScalarValue> {
            match name {
                "Owner" => Some(self.owner.as_str().into()),
                "Id" => Some(self.id.into()),
                "Status" => Some(self.status.clone().into()),
                _ => None,
            }
        }
    }

    impl Entity for Order {
        fn entity_config() -> &'static EntityConfig {
            &ORDER_CONFIG
        }
    }

    #[test]
    fn key_fields_fall_back_to_literal_names() {
        let plain = EntityConfig::builder().build().expect("valid");
        assert_eq!(plain.partition_key_field(), PARTITION_KEY);
        assert_eq!(plain.row_key_field(), ROW_KEY);
        assert_eq!(ORDER_CONFIG.partition_key_field(), "Owner");
        assert_eq!(ORDER_CONFIG.row_key_field(), "Id");
    }

    #[test]
    fn tag_names_always_include_keys() {
        let names: Vec<_> = ORDER_CONFIG.tag_names().collect();
        assert_eq!(names, vec!["partition", "row", "Status"]);
    }

    #[test]
    fn builder_rejects_invalid_layouts() {
        assert_eq!(
            EntityConfig::builder()
                .partition_key_proxy("Id")
                .row_key_proxy("Id")
                .build(),
            Err(ConfigError::DuplicateProxy("Id".to_owned()))
        );
        assert_eq!(
            EntityConfig::builder().row_key_proxy("PartitionKey").build(),
            Err(ConfigError::DuplicateProxy("PartitionKey".to_owned()))
        );
        assert_eq!(
            EntityConfig::builder().tag("partition").build(),
            Err(ConfigError::ReservedTagName("partition".to_owned()))
        );
        assert_eq!(
            EntityConfig::builder().tag("bad\"name").build(),
            Err(ConfigError::InvalidTagName("bad\"name".to_owned()))
        );
        assert_eq!(
            EntityConfig::builder().partition_key_proxy("").build(),
            Err(ConfigError::EmptyProxy)
        );
        // A tag named like a proxy is how a key becomes queryable as a tag.
        assert!(EntityConfig::builder()
            .partition_key_proxy("Owner")
            .tag("Owner")
            .build()
            .is_ok());
    }

    #[test]
    fn entity_tags_use_canonical_key_names() {
        let order = Order {
            owner: "alice".into(),
            id: 7,
            status: Some("active".into()),
        };
        let tags = order.tags();
        assert_eq!(tags.get(PARTITION_TAG), Some("alice"));
        assert_eq!(tags.get(ROW_TAG), Some("7"));
        assert_eq!(tags.get("Status"), Some("active"));

        let untagged = Order {
            status: None,
            ..order
        };
        assert_eq!(untagged.tags().get("Status"), None);
    }

    #[test]
    fn tag_accessor_reads_strings() {
        let tags: Tags = [("partition", "alice"), ("Status", "active")]
            .into_iter()
            .collect();
        let accessor = TagAccessor::new(&tags);
        assert_eq!(accessor.field("Status"), Some(ScalarValue::from("active")));
        assert_eq!(accessor.field("Missing"), None);
    }
}
