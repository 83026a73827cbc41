//! Lazily compiled client-side predicates.

use std::{fmt, marker::PhantomData};

use once_cell::sync::OnceCell;
use stratus_predicate::{compile, CompiledPredicate, FieldSource, Lambda};

use crate::{
    entity::TagAccessor,
    observability::log_debug,
    query::QueryError,
};

/// Predicate compiled on first use, at most once.
///
/// Compilation failures surface from the first [`matches`](Self::matches)
/// call; concurrent first calls race on a single initialization.
pub struct LazyPredicate<S> {
    lambda: Lambda,
    compiled: OnceCell<CompiledPredicate>,
    _source: PhantomData<fn(&S)>,
}

/// Full-entity post-filter.
pub type EntityPredicate<T> = LazyPredicate<T>;

/// Tag-level pre-filter evaluated before any body download.
pub type TagPredicate = LazyPredicate<TagAccessor<'static>>;

impl<S> LazyPredicate<S> {
    /// Wraps `lambda` without compiling it.
    pub fn new(lambda: Lambda) -> Self {
        Self {
            lambda,
            compiled: OnceCell::new(),
            _source: PhantomData,
        }
    }

    /// The uncompiled predicate.
    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    /// True once compilation has run successfully.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn compiled(&self) -> Result<&CompiledPredicate, QueryError> {
        self.compiled
            .get_or_try_init(|| {
                log_debug!(
                    component = "compile",
                    event = "predicate_compiled",
                    predicate = %self.lambda,
                );
                compile(&self.lambda)
            })
            .map_err(QueryError::from)
    }

    fn evaluate(&self, source: &dyn FieldSource) -> Result<bool, QueryError> {
        Ok(self.compiled()?.evaluate(source)?)
    }
}

impl<S> LazyPredicate<S>
where
    S: FieldSource,
{
    /// Evaluates the predicate against `source`, compiling it first if needed.
    pub fn matches(&self, source: &S) -> Result<bool, QueryError> {
        self.evaluate(source)
    }
}

impl TagPredicate {
    /// Evaluates the tag-level predicate against one blob's tags.
    pub fn matches_tags(&self, tags: &TagAccessor<'_>) -> Result<bool, QueryError> {
        self.evaluate(tags)
    }
}

impl<S> Clone for LazyPredicate<S> {
    fn clone(&self) -> Self {
        Self::new(self.lambda.clone())
    }
}

impl<S> fmt::Debug for LazyPredicate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPredicate")
            .field("lambda", &self.lambda.to_string())
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl<S> PartialEq for LazyPredicate<S> {
    fn eq(&self, other: &Self) -> bool {
        self.lambda == other.lambda
    }
}
