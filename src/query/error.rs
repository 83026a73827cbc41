use stratus_predicate::{CompileError, EvalError};
use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by query planning and result streams.
///
/// Unsupported predicate shapes never show up here: they degrade to
/// client-side filtering. What remains are caller mistakes and failures with
/// no fallback beneath them.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A tag-dependent operation was requested while the tag index is disabled.
    #[error("{operation} requires the blob tag index, which is disabled")]
    TagsDisabled {
        /// Refused operation.
        operation: &'static str,
    },
    /// A helper received an argument it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The client-side predicate could not be lowered.
    #[error("predicate compilation failed: {0}")]
    Compile(#[from] CompileError),
    /// The client-side predicate failed on an item.
    #[error("predicate evaluation failed: {0}")]
    Eval(#[from] EvalError),
    /// The backend adapter failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The cancellation token fired before the pending backend call finished.
    #[error("query cancelled")]
    Cancelled,
}
