use crate::error::{ErrorKind, Result};
use crate::memory::MemoryCache;
use crate::{ChapterContent, neighbourhood};
use quire_storage::error::ErrorKind as StorageErrorKind;
use quire_storage::{BookId, StoreHandle};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::instrument;

/// Point-in-time view of a book's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entry_count: usize,
    pub disk_entry_count: usize,
    pub memory_capacity: usize,
}

/// Outcome of a [`CacheManager::preload_chapters()`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Chapters read from disk into memory by this pass.
    pub loaded: Vec<usize>,
    /// Chapters that were already in memory.
    pub resident: Vec<usize>,
    /// Chapters that could not be loaded (logged, then skipped).
    pub failed: Vec<usize>,
}

/// Chapter cache for one open book.
///
/// Construct one when a book is opened and drop it when the book is closed.
/// Instances must not be shared between books: everything, including the
/// on-disk location, is keyed by the [`BookId`] given at construction.
///
/// # Examples
///
/// ```
/// use quire_cache::CacheManager;
/// use quire_storage::{BookId, StoreHandle};
///
/// # async fn example(store: StoreHandle) -> Result<(), Box<dyn std::error::Error>> {
/// let cache = CacheManager::new(store, BookId::new("moby-dick")?);
/// let chapter = cache.get_chapter_content(0, false).await?;
/// println!("{} bytes, {} resources", chapter.html.len(), chapter.resources.len());
/// # Ok(())
/// # }
/// ```
pub struct CacheManager {
    book: BookId,
    store: StoreHandle,
    memory: MemoryCache,
}

impl CacheManager {
    /// Number of chapters kept in memory unless configured otherwise.
    pub const DEFAULT_MEMORY_CAPACITY: NonZeroUsize = NonZeroUsize::new(5).unwrap();
    /// Chapters either side of the current one that a preload pass covers
    /// unless told otherwise.
    pub const DEFAULT_PRELOAD_RANGE: usize = 2;

    pub fn new(store: StoreHandle, book: BookId) -> Self {
        Self::with_capacity(store, book, Self::DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(store: StoreHandle, book: BookId, memory_capacity: NonZeroUsize) -> Self {
        Self { book, store, memory: MemoryCache::new(memory_capacity) }
    }

    pub fn book(&self) -> &BookId {
        &self.book
    }

    /// Resolve a chapter through memory, then disk.
    ///
    /// With `force_reload` the memory entry is ignored and the chapter is
    /// re-read from disk, replacing whatever was cached.
    ///
    /// # Errors
    /// - [`NotFound`](ErrorKind::NotFound) if the chapter was never
    ///   extracted; extraction is not re-attempted.
    /// - [`Io`](ErrorKind::Io) / [`InvalidContent`](ErrorKind::InvalidContent)
    ///   with the storage error as the cause.
    #[instrument(level = "debug", skip(self), fields(book = %self.book))]
    pub async fn get_chapter_content(&self, index: usize, force_reload: bool) -> Result<Arc<ChapterContent>> {
        if !force_reload && let Some(content) = self.memory.get(index) {
            tracing::trace!("L1 cache hit");
            return Ok(content);
        }

        let html = match self.store.read_chapter(&self.book, index).await {
            Ok(html) => html,
            Err(err) => {
                let cause = &*err;
                let kind = match cause {
                    StorageErrorKind::NotFound(_) => ErrorKind::NotFound(index),
                    StorageErrorKind::InvalidEncoding(_) => ErrorKind::InvalidContent(index),
                    _ => ErrorKind::Io(index),
                };
                tracing::warn!(store = self.store.name(), error = %cause, "Could not load chapter");
                return Err(err.raise(kind));
            },
        };
        tracing::debug!(bytes = html.len(), "L2 cache hit");

        let content = Arc::new(ChapterContent::new(index, html));
        if let Some(evicted) = self.memory.insert(Arc::clone(&content)) {
            tracing::trace!(evicted, "Evicted least recently used chapter");
        }
        Ok(content)
    }

    /// Load every chapter within `range` of `current` (but not `current`
    /// itself) that isn't already in memory.
    ///
    /// Failures are logged and skipped; one unreadable chapter doesn't stop
    /// its neighbours from loading. Dropping the future stops the pass
    /// between chapters, keeping whatever was already loaded.
    #[instrument(level = "debug", skip(self), fields(book = %self.book))]
    pub async fn preload_chapters(&self, current: usize, total: usize, range: usize) -> PreloadReport {
        let mut report = PreloadReport::default();
        for index in neighbourhood(current, total, range) {
            if self.memory.contains(index) {
                report.resident.push(index);
                continue;
            }
            match self.get_chapter_content(index, false).await {
                Ok(_) => report.loaded.push(index),
                Err(_) => report.failed.push(index),
            }
        }
        tracing::debug!(loaded = ?report.loaded, failed = ?report.failed, "Preloaded chapters around {current}");
        report
    }

    /// Drop every chapter held in memory. Extracted files are untouched.
    pub fn clear_memory_cache(&self) {
        self.memory.clear();
        tracing::debug!(book = %self.book, "Memory cache cleared");
    }

    /// Delete the book's extracted chapters (leaving an empty directory).
    ///
    /// Chapters already in memory stay there and keep being served; pair
    /// with [`clear_memory_cache()`](Self::clear_memory_cache), or use
    /// [`invalidate()`](Self::invalidate), to drop everything.
    pub async fn clear_disk_cache(&self) -> Result<()> {
        self.store.clear(&self.book).await.map_err(|err| err.raise(ErrorKind::Storage))?;
        tracing::debug!(book = %self.book, "Disk cache cleared");
        Ok(())
    }

    /// Clear memory, then disk.
    pub async fn invalidate(&self) -> Result<()> {
        self.clear_memory_cache();
        self.clear_disk_cache().await
    }

    pub async fn get_cache_stats(&self) -> Result<CacheStats> {
        let disk_entry_count =
            self.store.chapter_count(&self.book).await.map_err(|err| err.raise(ErrorKind::Storage))?;
        Ok(CacheStats {
            memory_entry_count: self.memory.len(),
            disk_entry_count,
            memory_capacity: self.memory.capacity().get(),
        })
    }

    /// Whether the chapter is in memory. Doesn't count as an access.
    pub fn is_resident(&self, index: usize) -> bool {
        self.memory.contains(index)
    }

    /// Chapters in memory, most recently used first.
    pub fn resident_indices(&self) -> Vec<usize> {
        self.memory.indices()
    }
}
