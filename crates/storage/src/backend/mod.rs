//! Chapter store trait and implementations.
//!
//! This module defines the `ChapterStore` trait, the interface between the
//! upstream archive extractor (which writes chapters) and the reading side
//! (which only ever reads them back).

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalChapterStore;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockChapterStore;
use crate::BookId;
use crate::error::Result;
use async_trait::async_trait;

/// Unified interface for extracted chapter storage.
///
/// Chapters are addressed by book and spine index, never by path: the
/// physical layout belongs to the implementation.
///
/// # Examples
///
/// ```
/// use quire_storage::{BookId, ChapterStore, error::Result};
///
/// async fn first_chapter_length(store: &dyn ChapterStore, book: &BookId) -> Result<usize> {
///     if store.exists(book, 0).await? {
///         Ok(store.read_chapter(book, 0).await?.len())
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Name of the store, used for logging only.
    fn name(&self) -> &str;

    /// Check whether the chapter at `index` has been extracted.
    async fn exists(&self, book: &BookId, index: usize) -> Result<bool>;

    /// Read the full text of an extracted chapter.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// chapter was never extracted and
    /// [`InvalidEncoding`](crate::error::ErrorKind::InvalidEncoding) if it
    /// isn't UTF-8.
    async fn read_chapter(&self, book: &BookId, index: usize) -> Result<String>;

    /// Write an extracted chapter, replacing any previous copy.
    ///
    /// # Notes
    /// - Implementations should create the book's directories as needed.
    /// - Only the extraction step writes; readers never call this.
    async fn write_chapter(&self, book: &BookId, index: usize, html: &str) -> Result<()>;

    /// Number of extracted chapters currently stored for the book.
    ///
    /// A book that was never extracted has zero chapters, not an error.
    async fn chapter_count(&self, book: &BookId) -> Result<usize>;

    /// Remove every extracted chapter of the book, leaving an empty (but
    /// existing) content directory behind.
    async fn clear(&self, book: &BookId) -> Result<()>;
}
