use std::marker::PhantomData;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{
    stream::{cancellable, EntityStream, PostFilter},
    Query, QueryError,
};
use crate::{
    backend::TableBackend,
    entity::Entity,
    observability::log_info,
    option::QueryOptions,
    strategy::{select_table_strategy, TableStrategy},
};

const COMPONENT: &str = "table_query";

/// Runs queries against a table service adapter.
pub struct TableClient<T, B> {
    backend: B,
    options: QueryOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T, B> TableClient<T, B>
where
    T: Entity,
    B: TableBackend<T>,
{
    /// Client over `backend`.
    pub fn new(backend: B, options: QueryOptions) -> Self {
        Self {
            backend,
            options,
            _entity: PhantomData,
        }
    }

    /// Underlying adapter.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Client settings.
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Strategy [`query`](Self::query) would run.
    pub fn plan(&self, query: &Query<T>) -> TableStrategy<T> {
        select_table_strategy(query.predicate())
    }

    /// Streams entities matching `query`.
    ///
    /// Nothing is requested until the stream is polled; dropping the stream
    /// stops paging.
    pub fn query(&self, query: Query<T>, cancel: CancellationToken) -> EntityStream<'_, T> {
        let strategy = self.plan(&query);
        log_info!(
            component = COMPONENT,
            event = "strategy_selected",
            strategy = %strategy,
            client_filter = strategy.has_client_filter(),
        );
        match strategy {
            TableStrategy::EnumerateAll => Box::pin(PostFilter::new(
                self.pages(None, cancel),
                None,
                COMPONENT,
            )),
            TableStrategy::PointLookup {
                partition_key,
                row_key,
            } => Box::pin(PostFilter::new(
                self.lookup(partition_key, row_key, cancel),
                None,
                COMPONENT,
            )),
            TableStrategy::Native {
                filter,
                post_filter,
            } => Box::pin(PostFilter::new(
                self.pages(Some(filter), cancel),
                post_filter,
                COMPONENT,
            )),
            TableStrategy::ClientFilter { predicate } => Box::pin(PostFilter::new(
                self.pages(None, cancel),
                Some(predicate),
                COMPONENT,
            )),
        }
    }

    /// First entity matching `query`, fetching no further than needed.
    pub async fn first(
        &self,
        query: Query<T>,
        cancel: CancellationToken,
    ) -> Result<Option<T>, QueryError> {
        self.query(query, cancel).next().await.transpose()
    }

    fn pages(
        &self,
        filter: Option<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<T, QueryError>> + Send + '_ {
        let backend = &self.backend;
        let page_size = self.options.page_size;
        try_stream! {
            let mut continuation: Option<String> = None;
            loop {
                let page = cancellable(
                    &cancel,
                    backend.query_page(filter.as_deref(), continuation.take(), page_size, &cancel),
                )
                .await?;
                for entity in page.items {
                    yield entity;
                }
                match page.continuation {
                    Some(next) => continuation = Some(next),
                    None => break,
                }
            }
        }
    }

    fn lookup(
        &self,
        partition_key: String,
        row_key: String,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<T, QueryError>> + Send + '_ {
        let backend = &self.backend;
        try_stream! {
            let found = cancellable(
                &cancel,
                backend.get_entity(&partition_key, &row_key, &cancel),
            )
            .await?;
            if let Some(entity) = found {
                yield entity;
            }
        }
    }
}
