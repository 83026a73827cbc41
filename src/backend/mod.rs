//! Storage adapter boundary.
//!
//! Adapters own the wire protocol; the query layer only sees pages of items
//! and per-item body downloads. Every call receives the query's cancellation
//! token so adapters can abort in-flight requests. The query layer also races
//! each call against the token and never retries a cancelled call.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::entity::{Entity, Tags};

/// Errors reported by storage adapters.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The named blob does not exist.
    #[error("blob '{0}' not found")]
    BlobNotFound(String),
    /// The adapter rejected a native filter.
    #[error("invalid filter '{filter}': {source}")]
    InvalidFilter {
        /// Offending filter.
        filter: String,
        /// Why it was rejected.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The continuation token was not issued by this adapter.
    #[error("invalid continuation token '{0}'")]
    InvalidContinuation(String),
    /// Transport or service failure.
    #[error("backend request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// One page of backend results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    /// Items in backend order.
    pub items: Vec<R>,
    /// Token for the next page; `None` on the last page.
    pub continuation: Option<String>,
}

impl<R> Page<R> {
    /// Final page holding `items`.
    pub fn last(items: Vec<R>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }
}

/// Blob listing entry; the body is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    /// Blob name.
    pub name: String,
    /// Tags returned with the listing. `partition` and `row` are always
    /// present; other tags only when they were requested.
    pub tags: Tags,
}

/// Table service adapter.
#[async_trait]
pub trait TableBackend<T>: Send + Sync
where
    T: Entity,
{
    /// Fetches one page of rows, filtered server-side by `filter` when given.
    async fn query_page(
        &self,
        filter: Option<&str>,
        continuation: Option<String>,
        page_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, BackendError>;

    /// Fetches one row by its full key.
    async fn get_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, BackendError>;
}

/// Blob service adapter.
#[async_trait]
pub trait BlobBackend<T>: Send + Sync
where
    T: Entity,
{
    /// Runs a tag query.
    async fn find_blobs_by_tags(
        &self,
        filter: &str,
        continuation: Option<String>,
        page_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Page<BlobItem>, BackendError>;

    /// Lists blobs with their key tags, plus every other tag when `include_tags` is set.
    async fn list_blobs(
        &self,
        include_tags: bool,
        continuation: Option<String>,
        page_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Page<BlobItem>, BackendError>;

    /// Downloads and deserializes one blob body.
    async fn download(&self, name: &str, cancel: &CancellationToken) -> Result<T, BackendError>;
}

#[async_trait]
impl<T, B> TableBackend<T> for Arc<B>
where
    T: Entity,
    B: TableBackend<T> + ?Sized,
{
    async fn query_page(
        &self,
        filter: Option<&str>,
        continuation: Option<String>,
        page_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, BackendError> {
        (**self)
            .query_page(filter, continuation, page_size, cancel)
            .await
    }

    async fn get_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, BackendError> {
        (**self).get_entity(partition_key, row_key, cancel).await
    }
}

#[async_trait]
impl<T, B> BlobBackend<T> for Arc<B>
where
    T: Entity,
    B: BlobBackend<T> + ?Sized,
{
    async fn find_blobs_by_tags(
        &self,
        filter: &str,
        continuation: Option<String>,
        page_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Page<BlobItem>, BackendError> {
        (**self)
            .find_blobs_by_tags(filter, continuation, page_size, cancel)
            .await
    }

    async fn list_blobs(
        &self,
        include_tags: bool,
        continuation: Option<String>,
        page_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Page<BlobItem>, BackendError> {
        (**self)
            .list_blobs(include_tags, continuation, page_size, cancel)
            .await
    }

    async fn download(&self, name: &str, cancel: &CancellationToken) -> Result<T, BackendError> {
        (**self).download(name, cancel).await
    }
}
