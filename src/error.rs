use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by [`QueryCache::query`](crate::QueryCache::query) and
/// surfaced through a binding's `error` state.
///
/// Fetcher failures are carried behind an `Arc` so the error clones cheaply:
/// the same failure may be handed to the `query` caller and retained in a
/// binding's state at the same time.
///
/// The cache never adds context of its own around a fetcher failure; what the
/// fetcher produced is what the caller sees.
///
/// # Examples
///
/// ```
/// use requery::QueryError;
///
/// let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "backend timed out");
/// let err = QueryError::fetch(io);
/// assert!(err.to_string().contains("fetch failed"));
///
/// // Non-error failure values are normalized into a message.
/// let err = QueryError::message("profile service returned 503");
/// assert_eq!(err.to_string(), "profile service returned 503");
/// ```
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The fetcher itself failed with a typed error.
    #[error("fetch failed: {0}")]
    Fetch(#[source] Arc<dyn StdError + Send + Sync>),

    /// A failure that did not come with a typed error, normalized to text.
    #[error("{0}")]
    Message(Arc<str>),
}

impl QueryError {
    /// Wraps any error type into a `QueryError`.
    pub fn fetch<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        QueryError::Fetch(Arc::new(source))
    }

    /// Normalizes an arbitrary failure description into a `QueryError`.
    pub fn message(msg: impl Into<String>) -> Self {
        QueryError::Message(Arc::from(msg.into().into_boxed_str()))
    }
}
