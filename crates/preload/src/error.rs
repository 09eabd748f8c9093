//! Preload Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Background preloading never
//! surfaces errors; these only come out of foreground session operations.

use derive_more::{Display, Error};
use quire_cache::error::{Error as CacheError, ErrorKind as CacheErrorKind};
use quire_storage::error::Error as StorageError;

/// A session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The book has not been extracted (or has no spine items).
    #[display("book has no chapters")]
    EmptyBook,
    /// Navigation target doesn't exist in this book.
    #[display("chapter {index} is outside the book ({total} chapters)")]
    OutOfRange { index: usize, total: usize },
    /// The chapter store could not be queried while opening the book.
    #[display("chapter storage unavailable")]
    Storage,
    /// Foreground chapter load failed.
    #[display("cache error: {_0}")]
    Cache(CacheErrorKind),
}

impl ErrorKind {
    /// Convert a cache error into a session error, keeping the cache
    /// crate's `Exn` frame (error tree) as a child in its own error tree.
    #[track_caller]
    pub fn cache(err: CacheError) -> Error {
        let inner = *err;
        err.raise(ErrorKind::Cache(inner))
    }

    #[track_caller]
    pub(crate) fn storage(err: StorageError) -> Error {
        err.raise(ErrorKind::Storage)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cache(inner) => inner.is_retryable(),
            Self::Storage => true,
            Self::EmptyBook | Self::OutOfRange { .. } => false,
        }
    }
}
