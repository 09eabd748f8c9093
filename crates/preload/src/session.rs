use crate::error::{ErrorKind, Result};
use crate::{Direction, PreloadOptions, PreloadState, Preloader};
use quire_cache::{CacheManager, CacheStats, ChapterContent};
use quire_storage::{BookId, StoreHandle};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub memory_capacity: NonZeroUsize,
    pub preload: PreloadOptions,
    /// Chapter to open the book at (e.g. the saved reading position).
    pub start_index: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            memory_capacity: CacheManager::DEFAULT_MEMORY_CAPACITY,
            preload: PreloadOptions::default(),
            start_index: 0,
        }
    }
}

/// One open book: its cache, its preloader, and the cancellation scope
/// every background load of the session runs under.
///
/// Navigation methods report the move to the preloader and then load the
/// chapter being moved to, in the foreground, returning it.
pub struct ReadingSession {
    cache: Arc<CacheManager>,
    preloader: Preloader,
    scope: CancellationToken,
}

impl ReadingSession {
    /// Open `book`, which has `total_chapters` spine items, at
    /// `options.start_index`.
    ///
    /// # Errors
    /// - [`EmptyBook`](ErrorKind::EmptyBook) when `total_chapters` is zero.
    /// - [`OutOfRange`](ErrorKind::OutOfRange) for a start index past the end.
    /// - [`Cache`](ErrorKind::Cache) if the starting chapter can't be loaded.
    #[instrument(skip(store, book, options), fields(book = %book))]
    pub async fn open(store: StoreHandle, book: BookId, total_chapters: usize, options: SessionOptions) -> Result<Self> {
        if total_chapters == 0 {
            exn::bail!(ErrorKind::EmptyBook);
        }
        let cache = Arc::new(CacheManager::with_capacity(store, book, options.memory_capacity));
        let scope = CancellationToken::new();
        let preloader = Preloader::with_cancellation(Arc::clone(&cache), options.preload, scope.child_token());
        preloader.initialize(total_chapters);
        let mut session = Self { cache, preloader, scope };
        session.go_to(options.start_index).await?;
        Ok(session)
    }

    /// Open `book` using however many chapters have been extracted for it.
    pub async fn open_extracted(store: StoreHandle, book: BookId, options: SessionOptions) -> Result<Self> {
        let total = store.chapter_count(&book).await.map_err(ErrorKind::storage)?;
        Self::open(store, book, total, options).await
    }

    pub fn current_index(&self) -> usize {
        self.preloader.state().current_index
    }

    pub fn total_chapters(&self) -> usize {
        self.preloader.state().total_chapters
    }

    /// Jump straight to a chapter (table of contents, bookmark, ...).
    ///
    /// Waits for the chapter itself; its neighbours load in the background.
    pub async fn go_to(&mut self, index: usize) -> Result<Arc<ChapterContent>> {
        self.check_bounds(index)?;
        self.preloader.on_page_turn(index, Direction::Jump);
        self.preloader.preload_chapter(index).await.map_err(ErrorKind::cache)
    }

    /// Move to the following chapter. `None` at the end of the book.
    pub async fn next(&mut self) -> Result<Option<Arc<ChapterContent>>> {
        let next = self.current_index() + 1;
        if next >= self.total_chapters() {
            return Ok(None);
        }
        self.turn(next, Direction::Forward).await.map(Some)
    }

    /// Move to the preceding chapter. `None` at the start of the book.
    pub async fn previous(&mut self) -> Result<Option<Arc<ChapterContent>>> {
        let Some(previous) = self.current_index().checked_sub(1) else {
            return Ok(None);
        };
        self.turn(previous, Direction::Backward).await.map(Some)
    }

    /// The pager settled on `index`; work out which way the reader went.
    pub async fn page_changed(&mut self, index: usize) -> Result<Arc<ChapterContent>> {
        self.check_bounds(index)?;
        let direction = Direction::between(self.current_index(), index);
        self.turn(index, direction).await
    }

    /// Foreground read of the chapter the reader is on.
    pub async fn current_chapter(&self) -> Result<Arc<ChapterContent>> {
        self.cache.get_chapter_content(self.current_index(), false).await.map_err(ErrorKind::cache)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.cache.get_cache_stats().await.map_err(ErrorKind::cache)
    }

    pub fn is_preloading(&self) -> bool {
        self.preloader.is_preloading()
    }

    pub fn subscribe_preloading(&self) -> watch::Receiver<bool> {
        self.preloader.subscribe_preloading()
    }

    pub fn prediction(&self) -> PreloadState {
        self.preloader.state()
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn preloader(&self) -> &Preloader {
        &self.preloader
    }

    /// Close the book: stop all background loading, wait for it to wind
    /// down, then release the memory cache. Extracted chapters stay on disk
    /// for next time.
    #[instrument(skip(self), fields(book = %self.cache.book()))]
    pub async fn close(self) {
        self.preloader.shutdown().await;
        self.scope.cancel();
        self.cache.clear_memory_cache();
    }

    async fn turn(&mut self, index: usize, direction: Direction) -> Result<Arc<ChapterContent>> {
        self.preloader.on_page_turn(index, direction);
        self.cache.get_chapter_content(index, false).await.map_err(ErrorKind::cache)
    }

    fn check_bounds(&self, index: usize) -> Result<()> {
        let total = self.total_chapters();
        if index >= total {
            exn::bail!(ErrorKind::OutOfRange { index, total });
        }
        Ok(())
    }
}

impl Drop for ReadingSession {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
