//! Error types for livequery.
//!
//! The live layer performs no I/O of its own, so the taxonomy is narrow:
//! failures to attach to the index, failures reported by the index while
//! executing a query, and a closed observation channel.

use thiserror::Error;

/// Main error type for the livequery library.
#[derive(Debug, Error)]
pub enum LiveQueryError {
    // Binding setup errors
    #[error("Failed to subscribe to index updates: {message}")]
    Subscription { message: String },

    #[error("Debounced watcher requires a tokio runtime: {message}")]
    Runtime { message: String },

    // Query execution errors
    #[error("Invalid query {query}: {message}")]
    InvalidQuery { query: String, message: String },

    // Observation errors
    #[error("Revision watcher closed")]
    WatcherClosed,

    // Index backend errors
    #[error("Index failed to execute query: {message}")]
    Index { message: String },
}

/// Result type alias for livequery operations.
pub type Result<T> = std::result::Result<T, LiveQueryError>;

impl From<tokio::sync::watch::error::RecvError> for LiveQueryError {
    fn from(_: tokio::sync::watch::error::RecvError) -> Self {
        LiveQueryError::WatcherClosed
    }
}

impl LiveQueryError {
    /// Create an invalid query error for the given descriptor.
    pub fn invalid_query(query: impl std::fmt::Display, message: impl Into<String>) -> Self {
        LiveQueryError::InvalidQuery {
            query: query.to_string(),
            message: message.into(),
        }
    }

    /// Check whether re-running on the next revision change could succeed.
    ///
    /// A rejected descriptor stays rejected no matter how the index changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LiveQueryError::InvalidQuery { .. }
                | LiveQueryError::Runtime { .. }
                | LiveQueryError::WatcherClosed
        )
    }
}
