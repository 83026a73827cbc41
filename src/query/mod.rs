//! Query builder and execution against the table and blob services.
//!
//! A [`Query`] accumulates one conjunctive predicate. Clients plan it into a
//! strategy and stream matching entities lazily, one backend page at a time.

mod blob;
mod error;
pub mod stream;
mod table;

use std::{fmt, marker::PhantomData};

use stratus_predicate::{Expr, Lambda, Param, ScalarValue};

pub use self::{blob::BlobClient, error::QueryError, table::TableClient};
use crate::entity::Entity;

/// Accumulated predicate over entities of type `T`.
pub struct Query<T> {
    predicate: Option<Lambda>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Query<T>
where
    T: Entity,
{
    /// Query matching every entity.
    pub fn new() -> Self {
        Self {
            predicate: None,
            _entity: PhantomData,
        }
    }

    /// Adds `predicate` to the query.
    ///
    /// Repeated calls AND-combine into one flat conjunction over a single
    /// parameter, so `filter(a).filter(b)` plans exactly like
    /// `filter(a.and_also(b))`.
    pub fn filter(self, predicate: Lambda) -> Self {
        let predicate = match self.predicate {
            Some(current) => current.and_also(predicate),
            None => predicate,
        };
        Self {
            predicate: Some(predicate),
            _entity: PhantomData,
        }
    }

    /// Keeps entities whose selected field equals one of `values`.
    ///
    /// An empty `values` matches nothing.
    pub fn exists_in<F, I, V>(self, selector: F, values: I) -> Result<Self, QueryError>
    where
        F: FnOnce(Param) -> Expr,
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        let membership = membership(selector, values, Membership::AnyOf)?;
        Ok(self.filter(membership))
    }

    /// Keeps entities whose selected field equals none of `values`.
    ///
    /// An empty `values` matches everything.
    pub fn not_exists_in<F, I, V>(self, selector: F, values: I) -> Result<Self, QueryError>
    where
        F: FnOnce(Param) -> Expr,
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        let membership = membership(selector, values, Membership::NoneOf)?;
        Ok(self.filter(membership))
    }

    /// The accumulated predicate; `None` when no filter was added.
    pub fn predicate(&self) -> Option<&Lambda> {
        self.predicate.as_ref()
    }
}

impl<T> Default for Query<T>
where
    T: Entity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(predicate) => write!(f, "Query({predicate})"),
            None => f.write_str("Query(*)"),
        }
    }
}

#[derive(Clone, Copy)]
enum Membership {
    AnyOf,
    NoneOf,
}

fn membership<F, I, V>(selector: F, values: I, mode: Membership) -> Result<Lambda, QueryError>
where
    F: FnOnce(Param) -> Expr,
    I: IntoIterator<Item = V>,
    V: Into<ScalarValue>,
{
    let selected = Lambda::new(selector);
    let param = selected.param();
    if selected.body().member_of(param).is_none() {
        return Err(QueryError::InvalidArgument(format!(
            "selector must read a field of its parameter, got {}",
            selected.body()
        )));
    }
    let field = selected.into_body();
    let body = values
        .into_iter()
        .map(|value| {
            let value = Expr::Constant(value.into());
            match mode {
                Membership::AnyOf => field.clone().equals(value),
                Membership::NoneOf => field.clone().not_equals(value),
            }
        })
        .reduce(|acc, clause| match mode {
            Membership::AnyOf => acc.or_else(clause),
            Membership::NoneOf => acc.and_also(clause),
        })
        .unwrap_or(Expr::Constant(ScalarValue::Boolean(matches!(
            mode,
            Membership::NoneOf
        ))));
    Ok(Lambda::from_parts(param, body))
}
