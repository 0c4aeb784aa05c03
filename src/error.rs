//! Error types for eventstate.

use std::io;
use thiserror::Error;

/// Boxed error returned by an async fetcher.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure a store operation can report.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The store was destroyed; it rejects every further read, write and
    /// subscription.
    #[error("store has been destroyed")]
    Destroyed,

    /// A required argument was missing or of the wrong shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The path cannot be written into the current tree.
    #[error("cannot write '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// An async operation was superseded by a newer one at the same path or
    /// cancelled explicitly.
    #[error("async operation at '{path}' was cancelled")]
    Cancelled { path: String },

    /// The fetcher of an async operation failed. `source` is the fetcher's
    /// own error, unchanged.
    #[error("async operation at '{path}' failed: {source}")]
    Fetch {
        path: String,
        #[source]
        source: BoxError,
    },

    /// A typed write would leave the tree in a shape that no longer
    /// deserializes into the state type.
    #[error("value at '{path}' does not fit the state shape: {source}")]
    Shape {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for [`Error::Cancelled`].
    ///
    /// Callers of `set_async` usually ignore cancellations: they only mean a
    /// newer request took over.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
