//! Logging infrastructure for stratus query planning and execution.
//!
//! stratus uses `tracing` for structured logging. All events use target
//! "stratus" and include an `event` field for filtering.
//!
//! ## Library Integration
//!
//! stratus never initializes a global subscriber. Applications configure
//! tracing via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (e.g., "table_query", "blob_query")
//! - Use `%` for Display, `?` for Debug formatting
//! - Never log filter values above debug level; they carry user data

/// Target for all stratus log events.
pub(crate) const STRATUS_TARGET: &str = "stratus";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "blob_query",
///     event = "strategy_selected",
///     strategy = %strategy,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::STRATUS_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::STRATUS_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::STRATUS_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
