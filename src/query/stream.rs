//! Result streaming.
//!
//! Streams are lazy and forward-only: a backend page is requested only when
//! the consumer pulls past the previous one, and every backend call is raced
//! against the query's cancellation token.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use futures_util::ready;
use pin_project_lite::pin_project;
use stratus_predicate::FieldSource;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::BackendError, compile::EntityPredicate, observability::log_info, query::QueryError,
};

/// Boxed stream of query results.
pub type EntityStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T, QueryError>> + Send + 'a>>;

/// Awaits `call` unless `cancel` fires first.
///
/// Cancellation wins ties, so a token cancelled before the call is polled
/// never reaches the backend.
pub(crate) async fn cancellable<F, R>(cancel: &CancellationToken, call: F) -> Result<R, QueryError>
where
    F: Future<Output = Result<R, BackendError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(QueryError::Cancelled),
        result = call => result.map_err(QueryError::from),
    }
}

pin_project! {
    /// Stream adapter that drops items rejected by a client-side predicate.
    ///
    /// The predicate compiles on the first item. Without a predicate items
    /// pass through; either way the adapter logs how many items it scanned
    /// and yielded once the inner stream ends.
    pub struct PostFilter<S, T> {
        #[pin]
        inner: S,
        predicate: Option<EntityPredicate<T>>,
        component: &'static str,
        scanned: usize,
        yielded: usize,
    }
}

impl<S, T> PostFilter<S, T> {
    pub(crate) fn new(
        inner: S,
        predicate: Option<EntityPredicate<T>>,
        component: &'static str,
    ) -> Self {
        Self {
            inner,
            predicate,
            component,
            scanned: 0,
            yielded: 0,
        }
    }
}

impl<S, T> Stream for PostFilter<S, T>
where
    S: Stream<Item = Result<T, QueryError>>,
    T: FieldSource,
{
    type Item = Result<T, QueryError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(item)) => {
                    *this.scanned += 1;
                    if let Some(predicate) = this.predicate.as_ref() {
                        match predicate.matches(&item) {
                            Ok(true) => {}
                            Ok(false) => continue,
                            Err(err) => return Poll::Ready(Some(Err(err))),
                        }
                    }
                    *this.yielded += 1;
                    return Poll::Ready(Some(Ok(item)));
                }
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => {
                    log_info!(
                        component = *this.component,
                        event = "enumeration_finished",
                        scanned = *this.scanned,
                        yielded = *this.yielded,
                    );
                    return Poll::Ready(None);
                }
            }
        }
    }
}
