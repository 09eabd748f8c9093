//! Local filesystem chapter store.
//!
//! Chapters live under `<root>/<book_id>/content/spine_<index>.xhtml` and are
//! accessed via `tokio::fs` for async I/O.

use crate::error::{ErrorKind, Result};
use crate::layout::{CONTENT_DIR, chapter_file_name, parse_chapter_file_name};
use crate::{BookId, ChapterStore};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem chapter store.
///
/// # Examples
///
/// ```no_run
/// use quire_storage::backend::LocalChapterStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalChapterStore::new("local", "/path/to/books")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalChapterStore {
    name: String,
    /// Root directory for the library
    root: PathBuf,
}
impl LocalChapterStore {
    /// Create a new local filesystem store.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once when the reader
            // starts and it's not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn content_dir(&self, book: &BookId) -> PathBuf {
        self.root.join(book).join(CONTENT_DIR)
    }

    fn chapter_path(&self, book: &BookId, index: usize) -> PathBuf {
        self.content_dir(book).join(chapter_file_name(index))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl ChapterStore for LocalChapterStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, book: &BookId, index: usize) -> Result<bool> {
        let path = self.chapter_path(book, index);
        Ok(fs::try_exists(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn read_chapter(&self, book: &BookId, index: usize) -> Result<String> {
        let path = self.chapter_path(book, index);
        let bytes = fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        String::from_utf8(bytes).map_err(|_| exn::Exn::from(ErrorKind::InvalidEncoding(path)))
    }

    async fn write_chapter(&self, book: &BookId, index: usize, html: &str) -> Result<()> {
        let dir = self.content_dir(book);
        fs::create_dir_all(&dir).await.map_err(|e| Self::map_io_error(e, &dir))?;
        let path = dir.join(chapter_file_name(index));
        Ok(fs::write(&path, html).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn chapter_count(&self, book: &BookId) -> Result<usize> {
        let dir = self.content_dir(book);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Never extracted (or cleared out from under us): nothing stored.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => exn::bail!(Self::map_io_error(e, &dir)),
        };
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &dir))? {
            let is_chapter = entry.file_name().to_str().and_then(parse_chapter_file_name).is_some();
            if is_chapter && entry.file_type().await.map_err(ErrorKind::Io)?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn clear(&self, book: &BookId) -> Result<()> {
        let dir = self.content_dir(book);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => exn::bail!(Self::map_io_error(e, &dir)),
        }
        fs::create_dir_all(&dir).await.map_err(|e| Self::map_io_error(e, &dir))?;
        tracing::debug!(store = %self.name, book = %book, "Cleared extracted chapters");
        Ok(())
    }
}
