//! Write-back cache error types

use thiserror::Error;

/// Error returned by an [`Evictor`](crate::Evictor) that could not persist a
/// dirty entry to the backing store.
#[derive(Error, Debug)]
pub enum PersistError {
    /// Local I/O failure while talking to the backing store
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing store rejected or failed the write
    #[error("backend error: {0}")]
    Backend(String),

    /// The backing store could not be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl PersistError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Check if retrying the write later could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_))
    }
}

/// Error raised to callers of [`WriteBackCache::lock`](crate::WriteBackCache::lock)
/// and [`WriteBackCache::flush`](crate::WriteBackCache::flush).
#[derive(Error, Debug)]
pub enum CacheError {
    /// A synchronous flush of `key` failed
    #[error("cache {cache}: flush of key {key} failed: {source}")]
    Flush {
        cache: String,
        key: String,
        #[source]
        source: PersistError,
    },

    /// A background eviction of `key` failed earlier and is being reported
    /// to the next caller of the cache
    #[error("cache {cache}: background eviction of key {key} failed: {source}")]
    AsyncFlush {
        cache: String,
        key: String,
        #[source]
        source: PersistError,
    },

    /// Invalid cache configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The scavenger thread could not be started
    #[error("scavenger error: {0}")]
    Scavenger(String),
}

impl CacheError {
    /// The key whose persistence failed, if this error is about one
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Flush { key, .. } | Self::AsyncFlush { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The underlying evictor failure, if any
    #[must_use]
    pub fn persist_error(&self) -> Option<&PersistError> {
        match self {
            Self::Flush { source, .. } | Self::AsyncFlush { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True if the failure happened on the background eviction path rather
    /// than during the caller's own operation
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::AsyncFlush { .. })
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
