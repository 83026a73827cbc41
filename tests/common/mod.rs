//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use once_cell::sync::Lazy;
use stratus::{
    backend::memory::{MemoryBlobStore, MemoryTable},
    predicate::{FieldSource, ScalarValue},
    Entity, EntityConfig,
};

/// Order model keyed by owner and id, tagged with its status.
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub owner: String,
    pub id: String,
    pub status: String,
    pub total: i64,
    pub notes: String,
}

static ORDER_CONFIG: Lazy<EntityConfig> = Lazy::new(|| {
    EntityConfig::builder()
        .partition_key_proxy("Owner")
        .row_key_proxy("Id")
        .tag("Status")
        .build()
        .expect("order layout should be valid")
});

impl FieldSource for Order {
    fn field(&self, name: &str) -> Option<ScalarValue> {
        match name {
            "Owner" => Some(self.owner.as_str().into()),
            "Id" => Some(self.id.as_str().into()),
            "Status" => Some(self.status.as_str().into()),
            "Total" => Some(self.total.into()),
            "Notes" => Some(self.notes.as_str().into()),
            _ => None,
        }
    }
}

impl Entity for Order {
    fn entity_config() -> &'static EntityConfig {
        &ORDER_CONFIG
    }
}

pub fn order(owner: &str, id: &str, status: &str, total: i64, notes: &str) -> Order {
    Order {
        owner: owner.to_string(),
        id: id.to_string(),
        status: status.to_string(),
        total,
        notes: notes.to_string(),
    }
}

/// Six orders across three owners, in key order.
pub fn orders() -> Vec<Order> {
    vec![
        order("alice", "01", "active", 10, "first"),
        order("alice", "02", "closed", 25, "urgent"),
        order("alice", "03", "active", 40, ""),
        order("bob", "01", "active", 5, "urgent delivery"),
        order("bob", "02", "pending", 70, ""),
        order("carol", "01", "closed", 15, "gift"),
    ]
}

pub async fn seeded_table(page_size: usize) -> Arc<MemoryTable<Order>> {
    let table = MemoryTable::new().with_default_page_size(page_size);
    for order in orders() {
        table.upsert(order).await;
    }
    Arc::new(table)
}

pub async fn seeded_store(page_size: usize) -> Arc<MemoryBlobStore<Order>> {
    let store = MemoryBlobStore::new().with_default_page_size(page_size);
    for order in orders() {
        store.upload(order).await;
    }
    Arc::new(store)
}

pub fn keys(orders: &[Order]) -> Vec<(String, String)> {
    orders
        .iter()
        .map(|order| (order.owner.clone(), order.id.clone()))
        .collect()
}

pub fn expected<F>(keep: F) -> Vec<(String, String)>
where
    F: Fn(&Order) -> bool,
{
    keys(
        &orders()
            .into_iter()
            .filter(|order| keep(order))
            .collect::<Vec<_>>(),
    )
}
