//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The storage error that caused a
//! failure is kept as a child frame.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The chapter was never extracted (or has since been cleared).
    #[display("chapter {_0} not found")]
    NotFound(#[error(not(source))] usize),
    /// Reading the extracted chapter failed.
    #[display("I/O failure loading chapter {_0}")]
    Io(#[error(not(source))] usize),
    /// The extracted chapter exists but cannot be used as text.
    #[display("chapter {_0} has invalid content")]
    InvalidContent(#[error(not(source))] usize),
    /// A book-level storage operation (clearing, counting) failed.
    #[display("chapter storage unavailable")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Storage)
    }

    /// Chapter index the error is about, if it is about a single chapter.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::NotFound(index) | Self::Io(index) | Self::InvalidContent(index) => Some(*index),
            Self::Storage => None,
        }
    }
}
