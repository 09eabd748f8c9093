//! Book identifiers.
//!
//! A book id doubles as the name of the book's directory under the library
//! root, so it has to be a single, well-behaved path segment.

use crate::error::{ErrorKind, Result};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// Validated identifier for a single book in the library.
///
/// # Examples
///
/// ```
/// use quire_storage::BookId;
/// // Valid ids
/// assert!(BookId::new("moby-dick").is_ok());
/// assert!(BookId::new("9780141439846").is_ok());
/// // Invalid ids
/// assert!(BookId::new("").is_err());
/// assert!(BookId::new("..").is_err());
/// assert!(BookId::new("shelf/moby-dick").is_err());
/// assert!(BookId::new("a\0b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        // Null bytes pass through Path::components() on Unix but cause
        // truncation in C-based syscalls, reject them explicitly.
        if id.contains('\0') {
            exn::bail!(ErrorKind::InvalidBookId(id));
        }
        let mut components = Path::new(&id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) if segment == id.as_str() => Ok(Self(id)),
            _ => exn::bail!(ErrorKind::InvalidBookId(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for BookId {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl FromStr for BookId {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
