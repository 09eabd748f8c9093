//! In-memory chapter store for testing.

use crate::error::{ErrorKind, Result};
use crate::layout::{CONTENT_DIR, chapter_file_name};
use crate::{BookId, ChapterStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::RwLock;

type Key = (BookId, usize);

/// In-memory chapter store for testing.
///
/// Chapters are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Every
/// [`read_chapter()`](ChapterStore::read_chapter) call is recorded, which is
/// what cache tests use to prove a lookup did (or didn't) touch "disk".
///
/// # Examples
///
/// ```
/// use quire_storage::backend::MockChapterStore;
/// use quire_storage::{BookId, ChapterStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let book = BookId::new("moby")?;
/// let store = MockChapterStore::with_chapters(&book, ["<p>one</p>", "<p>two</p>"]);
/// assert_eq!(store.read_chapter(&book, 1).await?, "<p>two</p>");
/// assert_eq!(store.reads_of(&book, 1).await, 1);
/// # Ok(())
/// # }
/// ```
pub struct MockChapterStore {
    chapters: RwLock<HashMap<Key, String>>,
    reads: RwLock<BTreeMap<Key, usize>>,
    failing: RwLock<HashSet<Key>>,
}

impl MockChapterStore {
    /// Create a store holding one book whose chapters are numbered in
    /// iteration order.
    pub fn with_chapters(book: &BookId, chapters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let map = chapters.into_iter().enumerate().map(|(index, html)| ((book.clone(), index), html.into())).collect();
        Self {
            chapters: RwLock::new(map),
            reads: RwLock::default(),
            failing: RwLock::default(),
        }
    }

    /// Make every subsequent read of this chapter fail with an I/O error.
    pub async fn fail_reads_of(&self, book: &BookId, index: usize) {
        self.failing.write().await.insert((book.clone(), index));
    }

    /// Number of times the chapter has been read.
    pub async fn reads_of(&self, book: &BookId, index: usize) -> usize {
        self.reads.read().await.get(&(book.clone(), index)).copied().unwrap_or(0)
    }

    /// Total reads across all books and chapters.
    pub async fn total_reads(&self) -> usize {
        self.reads.read().await.values().sum()
    }

    /// Sorted, de-duplicated indices of the book's chapters that have been
    /// read at least once.
    pub async fn read_indices(&self, book: &BookId) -> Vec<usize> {
        self.reads.read().await.keys().filter(|(b, _)| b == book).map(|(_, index)| *index).collect()
    }

    /// Forget all recorded reads.
    pub async fn reset_reads(&self) {
        self.reads.write().await.clear();
    }

    fn virtual_path(book: &BookId, index: usize) -> PathBuf {
        PathBuf::from(book.as_str()).join(CONTENT_DIR).join(chapter_file_name(index))
    }
}

impl Default for MockChapterStore {
    fn default() -> Self {
        Self {
            chapters: RwLock::default(),
            reads: RwLock::default(),
            failing: RwLock::default(),
        }
    }
}

#[async_trait]
impl ChapterStore for MockChapterStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn exists(&self, book: &BookId, index: usize) -> Result<bool> {
        Ok(self.chapters.read().await.contains_key(&(book.clone(), index)))
    }

    async fn read_chapter(&self, book: &BookId, index: usize) -> Result<String> {
        let key = (book.clone(), index);
        *self.reads.write().await.entry(key.clone()).or_default() += 1;
        if self.failing.read().await.contains(&key) {
            let err = std::io::Error::other(format!("injected failure reading chapter {index}"));
            exn::bail!(ErrorKind::Io(err));
        }
        self.chapters
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(Self::virtual_path(book, index))))
    }

    async fn write_chapter(&self, book: &BookId, index: usize, html: &str) -> Result<()> {
        self.chapters.write().await.insert((book.clone(), index), html.to_string());
        Ok(())
    }

    async fn chapter_count(&self, book: &BookId) -> Result<usize> {
        Ok(self.chapters.read().await.keys().filter(|(b, _)| b == book).count())
    }

    async fn clear(&self, book: &BookId) -> Result<()> {
        self.chapters.write().await.retain(|(b, _), _| b != book);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str) -> BookId {
        BookId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_reads_are_recorded() {
        let store = MockChapterStore::with_chapters(&book("moby"), ["a", "b", "c"]);
        store.read_chapter(&book("moby"), 2).await.unwrap();
        store.read_chapter(&book("moby"), 2).await.unwrap();
        store.read_chapter(&book("moby"), 0).await.unwrap();
        assert_eq!(store.reads_of(&book("moby"), 2).await, 2);
        assert_eq!(store.reads_of(&book("moby"), 1).await, 0);
        assert_eq!(store.total_reads().await, 3);
        assert_eq!(store.read_indices(&book("moby")).await, vec![0, 2]);
        store.reset_reads().await;
        assert_eq!(store.total_reads().await, 0);
    }

    #[tokio::test]
    async fn test_exists_does_not_count_as_read() {
        let store = MockChapterStore::with_chapters(&book("moby"), ["a"]);
        assert!(store.exists(&book("moby"), 0).await.unwrap());
        assert!(!store.exists(&book("moby"), 1).await.unwrap());
        assert_eq!(store.total_reads().await, 0);
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let store = MockChapterStore::default();
        let err = store.read_chapter(&book("moby"), 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(path) if path == &PathBuf::from("moby/content/spine_0.xhtml")));
        // Misses are still reads.
        assert_eq!(store.reads_of(&book("moby"), 0).await, 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MockChapterStore::with_chapters(&book("moby"), ["a", "b"]);
        store.fail_reads_of(&book("moby"), 1).await;
        let err = store.read_chapter(&book("moby"), 1).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(err.is_retryable());
        assert_eq!(store.read_chapter(&book("moby"), 0).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_clear_only_affects_one_book() {
        let store = MockChapterStore::with_chapters(&book("moby"), ["a", "b"]);
        store.write_chapter(&book("dracula"), 0, "c").await.unwrap();
        store.clear(&book("moby")).await.unwrap();
        assert_eq!(store.chapter_count(&book("moby")).await.unwrap(), 0);
        assert_eq!(store.chapter_count(&book("dracula")).await.unwrap(), 1);
    }
}
