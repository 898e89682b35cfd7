//! Error types for feedmon.

use thiserror::Error;

/// Common error type for feedmon.
#[derive(Error, Debug)]
pub enum FeedmonError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telegram API transport error.
    #[error("telegram API error: {0}")]
    Api(String),

    /// Persistent store error.
    #[error("store error: {0}")]
    Store(String),

    /// Feed fetch or parse error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Validation error for user input or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal bookkeeping reached an impossible state.
    ///
    /// Treated as fatal by the owning task: continuing after one of these
    /// risks silent state corruption, so the process is allowed to die.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for FeedmonError {
    fn from(e: serde_json::Error) -> Self {
        FeedmonError::Store(e.to_string())
    }
}

/// Result type alias for feedmon operations.
pub type Result<T> = std::result::Result<T, FeedmonError>;
