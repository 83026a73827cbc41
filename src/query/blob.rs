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
    backend::{BlobBackend, BlobItem},
    compile::TagPredicate,
    entity::{Entity, TagAccessor},
    observability::{log_info, log_warn},
    option::QueryOptions,
    strategy::{select_blob_strategy, BlobStrategy},
};

const COMPONENT: &str = "blob_query";

/// Where blob listings come from.
enum Listing {
    /// Server-side tag query.
    TagQuery(String),
    /// Plain listing, optionally with every tag.
    All { include_tags: bool },
}

/// Runs queries against a blob service adapter.
pub struct BlobClient<T, B> {
    backend: B,
    options: QueryOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T, B> BlobClient<T, B>
where
    T: Entity,
    B: BlobBackend<T>,
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
    pub fn plan(&self, query: &Query<T>) -> BlobStrategy<T> {
        select_blob_strategy(query.predicate(), &self.options)
    }

    /// Streams entities matching `query`.
    ///
    /// Bodies are downloaded one at a time as the consumer pulls, and only
    /// for blobs that passed every tag-level check.
    pub fn query(&self, query: Query<T>, cancel: CancellationToken) -> EntityStream<'_, T> {
        let strategy = self.plan(&query);
        log_info!(
            component = COMPONENT,
            event = "strategy_selected",
            strategy = %strategy,
            native_filter = strategy.native_filter().is_some(),
            client_filter = strategy.has_client_filter(),
        );
        let (listing, tag_predicate, predicate) = match strategy {
            BlobStrategy::EnumerateAll => (Listing::All { include_tags: false }, None, None),
            BlobStrategy::ClientFilter { predicate } => {
                (Listing::All { include_tags: false }, None, Some(predicate))
            }
            BlobStrategy::NativeTagEquality { filter } => (Listing::TagQuery(filter), None, None),
            BlobStrategy::NativeTagFilter { filter, predicate } => {
                (Listing::TagQuery(filter), None, Some(predicate))
            }
            BlobStrategy::TagMetadata {
                include_tags,
                tag_predicate,
                full_check,
            } => (
                Listing::All { include_tags },
                Some(tag_predicate),
                full_check,
            ),
        };
        Box::pin(PostFilter::new(
            self.bodies(listing, tag_predicate, cancel),
            predicate,
            COMPONENT,
        ))
    }

    /// First entity matching `query`, downloading no further than needed.
    pub async fn first(
        &self,
        query: Query<T>,
        cancel: CancellationToken,
    ) -> Result<Option<T>, QueryError> {
        self.query(query, cancel).next().await.transpose()
    }

    /// Streams entities of blobs matching a raw tag-query filter.
    ///
    /// Fails immediately when the tag index is disabled.
    pub fn find_by_tags(
        &self,
        filter: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<EntityStream<'_, T>, QueryError> {
        self.require_tags("find_by_tags")?;
        Ok(Box::pin(PostFilter::new(
            self.bodies(Listing::TagQuery(filter.into()), None, cancel),
            None,
            COMPONENT,
        )))
    }

    /// Streams every blob with all of its tags, without downloading bodies.
    ///
    /// Fails immediately when the tag index is disabled.
    pub fn enumerate_tags(
        &self,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = Result<BlobItem, QueryError>> + Send + '_, QueryError> {
        self.require_tags("enumerate_tags")?;
        Ok(self.items(Listing::All { include_tags: true }, cancel))
    }

    fn require_tags(&self, operation: &'static str) -> Result<(), QueryError> {
        if self.options.use_tags {
            return Ok(());
        }
        log_warn!(
            component = COMPONENT,
            event = "capability_refused",
            operation,
        );
        Err(QueryError::TagsDisabled { operation })
    }

    fn items(
        &self,
        listing: Listing,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<BlobItem, QueryError>> + Send + '_ {
        let backend = &self.backend;
        let page_size = self.options.page_size;
        try_stream! {
            let mut continuation: Option<String> = None;
            loop {
                let page = match &listing {
                    Listing::TagQuery(filter) => {
                        cancellable(
                            &cancel,
                            backend.find_blobs_by_tags(
                                filter,
                                continuation.take(),
                                page_size,
                                &cancel,
                            ),
                        )
                        .await?
                    }
                    Listing::All { include_tags } => {
                        cancellable(
                            &cancel,
                            backend.list_blobs(
                                *include_tags,
                                continuation.take(),
                                page_size,
                                &cancel,
                            ),
                        )
                        .await?
                    }
                };
                for item in page.items {
                    yield item;
                }
                match page.continuation {
                    Some(next) => continuation = Some(next),
                    None => break,
                }
            }
        }
    }

    fn bodies(
        &self,
        listing: Listing,
        tag_predicate: Option<TagPredicate>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<T, QueryError>> + Send + '_ {
        let backend = &self.backend;
        let items = self.items(listing, cancel.clone());
        try_stream! {
            futures_util::pin_mut!(items);
            while let Some(item) = items.next().await {
                let item = item?;
                if let Some(tag_predicate) = &tag_predicate {
                    if !tag_predicate.matches_tags(&TagAccessor::new(&item.tags))? {
                        continue;
                    }
                }
                let entity = cancellable(&cancel, backend.download(&item.name, &cancel)).await?;
                yield entity;
            }
        }
    }
}
