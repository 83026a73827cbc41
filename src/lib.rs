#![deny(missing_docs)]
//! Predicate translation and lazy query execution over table and blob storage.
//!
//! Models implement [`Entity`] to describe which fields back the partition
//! key, the row key and the blob tags. Callers build typed predicates with the
//! [`predicate`] DSL; stratus translates what it can into the backend's native
//! filter, picks an execution strategy, and evaluates the rest client-side
//! while streaming results page by page.
//!
//! ```
//! use once_cell::sync::Lazy;
//! use stratus::{
//!     predicate::{FieldSource, Lambda, ScalarValue},
//!     strategy::BlobStrategy,
//!     Entity, EntityConfig, Query,
//! };
//!
//! struct Order {
//!     owner: String,
//!     id: String,
//!     status: String,
//! }
//!
//! static ORDER: Lazy<EntityConfig> = Lazy::new(|| {
//!     EntityConfig::builder()
//!         .partition_key_proxy("Owner")
//!         .row_key_proxy("Id")
//!         .tag("Status")
//!         .build()
//!         .expect("valid layout")
//! });
//!
//! impl FieldSource for Order {
//!     fn field(&self, name: &str) -> Option<ScalarValue> {
//!         match name {
//!             "Owner" => Some(self.owner.as_str().into()),
//!             "Id" => Some(self.id.as_str().into()),
//!             "Status" => Some(self.status.as_str().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Entity for Order {
//!     fn entity_config() -> &'static EntityConfig {
//!         &ORDER
//!     }
//! }
//!
//! let query = Query::<Order>::new().filter(Lambda::new(|x| {
//!     x.field("Owner")
//!         .equals("alice")
//!         .and_also(x.field("Status").equals("active"))
//! }));
//! let strategy = stratus::strategy::select_blob_strategy::<Order>(
//!     query.predicate(),
//!     &stratus::QueryOptions::default(),
//! );
//! assert!(matches!(strategy, BlobStrategy::NativeTagEquality { .. }));
//! ```

pub mod backend;
pub mod classify;
pub mod compile;
pub mod entity;
pub mod filter;
mod observability;
mod option;
pub mod query;
pub mod strategy;

pub use stratus_predicate as predicate;

pub use crate::{
    entity::{ConfigError, Entity, EntityConfig, TagAccessor, Tags},
    option::QueryOptions,
    query::{BlobClient, Query, QueryError, TableClient},
};
