mod common;

use std::sync::Arc;

use common::{expected, keys, seeded_store, Order};
use futures::{StreamExt, TryStreamExt};
use stratus::{
    backend::memory::MemoryBlobStore,
    predicate::{Lambda, ScalarValue},
    strategy::BlobStrategy,
    BlobClient, Query, QueryError, QueryOptions,
};
use tokio_util::sync::CancellationToken;

type Client = BlobClient<Order, Arc<MemoryBlobStore<Order>>>;

async fn run(client: &Client, query: Query<Order>) -> Vec<(String, String)> {
    let found: Vec<Order> = client
        .query(query, CancellationToken::new())
        .try_collect()
        .await
        .expect("query should succeed");
    keys(&found)
}

#[tokio::test]
async fn tag_equality_needs_no_client_filtering() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());
    let query = Query::new().filter(Lambda::new(|x| {
        x.field("Owner")
            .equals("alice")
            .and_also(x.field("Status").equals("active"))
    }));

    let strategy = client.plan(&query);
    assert!(matches!(strategy, BlobStrategy::NativeTagEquality { .. }));
    assert!(!strategy.has_client_filter());

    assert_eq!(
        run(&client, query).await,
        expected(|o| o.owner == "alice" && o.status == "active")
    );
    let stats = store.stats().await;
    assert_eq!(
        stats.filters,
        vec!["partition = 'alice' and \"Status\" = 'active'".to_string()]
    );
    assert_eq!(stats.downloads, 2);
}

#[tokio::test]
async fn tag_disjunction_prefilters_on_metadata() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());
    let query = Query::new().filter(Lambda::new(|x| {
        x.field("Owner")
            .equals("alice")
            .or_else(x.field("Status").equals("active"))
    }));

    match client.plan(&query) {
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

    let found = run(&client, query).await;
    assert_eq!(found, expected(|o| o.owner == "alice" || o.status == "active"));
    let stats = store.stats().await;
    assert!(stats.filters.is_empty());
    assert_eq!(stats.tag_listings, 1);
    // Only tag-level matches are downloaded.
    assert_eq!(stats.downloads, found.len());
}

#[tokio::test]
async fn null_tag_comparisons_list_the_tag_they_read() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());

    let is_null = Query::new().filter(Lambda::new(|x| {
        x.field("Owner")
            .not_equals("bob")
            .or_else(x.field("Status").equals(ScalarValue::Null))
    }));
    match client.plan(&is_null) {
        BlobStrategy::TagMetadata { include_tags, .. } => assert!(include_tags),
        other => panic!("unexpected strategy {other}"),
    }
    assert_eq!(run(&client, is_null).await, expected(|o| o.owner != "bob"));

    let not_null = Query::new().filter(Lambda::new(|x| {
        x.field("Owner")
            .equals("alice")
            .or_else(x.field("Status").not_equals(ScalarValue::Null))
    }));
    assert_eq!(run(&client, not_null).await, expected(|_| true));
    assert_eq!(store.stats().await.tag_listings, 2);
}

#[tokio::test]
async fn method_calls_download_and_filter_everything() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());
    let query = Query::new().filter(Lambda::new(|x| x.field("Notes").contains("urgent")));

    assert!(matches!(client.plan(&query), BlobStrategy::ClientFilter { .. }));
    assert_eq!(
        run(&client, query).await,
        expected(|o| o.notes.contains("urgent"))
    );
    assert_eq!(store.stats().await.downloads, 6);
}

#[tokio::test]
async fn partial_conjunction_narrows_with_tags_first() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());
    let query = Query::new().filter(Lambda::new(|x| {
        x.field("Status")
            .equals("active")
            .and_also(x.field("Total").greater_than(8i64))
    }));

    assert_eq!(
        run(&client, query).await,
        expected(|o| o.status == "active" && o.total > 8)
    );
    let stats = store.stats().await;
    assert_eq!(stats.filters, vec!["\"Status\" = 'active'".to_string()]);
    assert_eq!(stats.downloads, 3);
}

#[tokio::test]
async fn contradictory_tags_are_narrowed_client_side() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store, QueryOptions::default());
    let query = Query::new().filter(Lambda::new(|x| {
        x.field("Status")
            .equals("active")
            .and_also(x.field("Status").equals("closed"))
    }));

    let strategy = client.plan(&query);
    assert!(matches!(strategy, BlobStrategy::NativeTagFilter { .. }));
    assert!(strategy.has_client_filter());
    assert!(run(&client, query).await.is_empty());
}

#[tokio::test]
async fn verification_rechecks_exact_tag_matches() {
    let store = seeded_store(100).await;
    let options = QueryOptions::default().verify_tag_matches(true);
    let client = BlobClient::new(store.clone(), options);
    let query = Query::new().filter(Lambda::new(|x| x.field("Status").not_equals("closed")));

    assert!(client.plan(&query).has_client_filter());
    let found = run(&client, query).await;
    assert_eq!(found, expected(|o| o.status != "closed"));
    assert_eq!(store.stats().await.downloads, found.len());
}

#[tokio::test]
async fn disabled_tags_refuse_tag_operations() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default().use_tags(false));

    assert!(matches!(
        client.find_by_tags("\"Status\" = 'active'", CancellationToken::new()),
        Err(QueryError::TagsDisabled { operation: "find_by_tags" })
    ));
    assert!(matches!(
        client.enumerate_tags(CancellationToken::new()),
        Err(QueryError::TagsDisabled { operation: "enumerate_tags" })
    ));

    // Plain queries still work, without touching the tag index.
    let query = Query::new().filter(Lambda::new(|x| x.field("Owner").equals("bob")));
    assert_eq!(run(&client, query).await, expected(|o| o.owner == "bob"));
    let stats = store.stats().await;
    assert!(stats.filters.is_empty());
    assert_eq!(stats.downloads, 6);
}

#[tokio::test]
async fn raw_tag_queries_and_tag_enumeration() {
    let store = seeded_store(4).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());

    let pending: Vec<Order> = client
        .find_by_tags("\"Status\" = 'pending'", CancellationToken::new())
        .expect("tags enabled")
        .try_collect()
        .await
        .expect("query should succeed");
    assert_eq!(keys(&pending), expected(|o| o.status == "pending"));

    let items: Vec<_> = client
        .enumerate_tags(CancellationToken::new())
        .expect("tags enabled")
        .try_collect()
        .await
        .expect("listing should succeed");
    assert_eq!(items.len(), 6);
    assert!(items.iter().all(|item| item.tags.get("Status").is_some()));
    assert_eq!(store.stats().await.downloads, 1);
}

#[tokio::test]
async fn bodies_are_downloaded_on_demand() {
    let store = seeded_store(2).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());

    let first = client
        .first(Query::new(), CancellationToken::new())
        .await
        .expect("query should succeed");
    assert_eq!(first.map(|o| o.id), Some("01".to_string()));
    let stats = store.stats().await;
    assert_eq!(stats.downloads, 1);
    assert_eq!(stats.page_requests, 1);
}

#[tokio::test]
async fn cancellation_aborts_before_the_next_download() {
    let store = seeded_store(100).await;
    let client = BlobClient::new(store.clone(), QueryOptions::default());
    let cancel = CancellationToken::new();
    let mut stream = client.query(Query::new(), cancel.clone());

    assert!(stream.next().await.expect("first item").is_ok());
    cancel.cancel();
    assert!(matches!(
        stream.next().await,
        Some(Err(QueryError::Cancelled))
    ));
    assert!(stream.next().await.is_none());
    assert_eq!(store.stats().await.downloads, 1);
}
