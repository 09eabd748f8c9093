use crate::{Direction, PreloadOptions, PreloadState};
use parking_lot::Mutex;
use quire_cache::error::Result as CacheResult;
use quire_cache::{CacheManager, ChapterContent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::instrument;

/// The single slot for the in-flight standard preload.
#[derive(Default)]
struct StandardSlot {
    /// Bumped every time the slot changes hands, so a finishing task can
    /// tell whether it is still the current one.
    generation: u64,
    token: Option<CancellationToken>,
}

struct Standard {
    slot: Mutex<StandardSlot>,
    preloading: watch::Sender<bool>,
}

impl Standard {
    /// Install a new standard task, cancelling whatever held the slot.
    fn claim(&self, token: CancellationToken) -> u64 {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.token.replace(token) {
            previous.cancel();
        }
        slot.generation += 1;
        self.preloading.send_replace(true);
        slot.generation
    }

    /// Called by a standard task on its way out. Only the current task may
    /// clear the flag, otherwise a superseded task finishing late would
    /// report "idle" while its replacement is still running.
    fn release(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.token = None;
            self.preloading.send_replace(false);
        }
    }

    fn cancel(&self) {
        let mut slot = self.slot.lock();
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        slot.generation += 1;
        self.preloading.send_replace(false);
    }
}

/// Turns page-turn events into a prefetch schedule for one open book.
///
/// All scheduling methods are synchronous and spawn onto the ambient tokio
/// runtime; the work itself happens in background tasks that are tracked so
/// that [`settle()`](Self::settle) and [`shutdown()`](Self::shutdown) can wait
/// for them.
///
/// # Examples
///
/// ```
/// use quire_cache::CacheManager;
/// use quire_preload::{Direction, PreloadOptions, Preloader};
/// use std::sync::Arc;
///
/// # async fn example(cache: Arc<CacheManager>) {
/// let preloader = Preloader::new(cache, PreloadOptions::default());
/// preloader.initialize(24);
/// preloader.on_page_turn(0, Direction::Jump);
/// preloader.on_page_turn(1, Direction::Forward);
/// preloader.shutdown().await;
/// # }
/// ```
pub struct Preloader {
    cache: Arc<CacheManager>,
    options: PreloadOptions,
    state: Mutex<PreloadState>,
    standard: Arc<Standard>,
    /// Parent of every extended task's token; swapped for a fresh one on
    /// [`cancel()`](Self::cancel) so the preloader stays usable.
    extended: Mutex<CancellationToken>,
    session: CancellationToken,
    tracker: TaskTracker,
}

impl Preloader {
    pub fn new(cache: Arc<CacheManager>, options: PreloadOptions) -> Self {
        Self::with_cancellation(cache, options, CancellationToken::new())
    }

    /// Create a preloader whose work is scoped to `session`: cancelling the
    /// session token stops everything the preloader has in flight.
    pub fn with_cancellation(cache: Arc<CacheManager>, options: PreloadOptions, session: CancellationToken) -> Self {
        let (preloading, _) = watch::channel(false);
        Self {
            cache,
            options,
            state: Mutex::new(PreloadState::default()),
            standard: Arc::new(Standard { slot: Mutex::default(), preloading }),
            extended: Mutex::new(session.child_token()),
            session,
            tracker: TaskTracker::new(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Set the number of chapters in the book; all window math is clipped
    /// to it. Must be called before the first [`on_page_turn()`](Self::on_page_turn).
    pub fn initialize(&self, total_chapters: usize) {
        self.state.lock().total_chapters = total_chapters;
        tracing::debug!(book = %self.cache.book(), total_chapters, "Preloader initialized");
    }

    /// React to the reader arriving at `index`.
    ///
    /// Replaces any in-flight standard preload with one around `index`, and
    /// starts an extended preload if the reader has kept going the same way
    /// for long enough.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[instrument(level = "debug", skip(self), fields(book = %self.cache.book()))]
    pub fn on_page_turn(&self, index: usize, direction: Direction) {
        let state = {
            let mut state = self.state.lock();
            state.record(index, direction);
            *state
        };
        if state.total_chapters == 0 {
            tracing::warn!("Page turn before the preloader was initialized");
        }
        self.spawn_standard(state);

        let extended = state.extended_window(&self.options);
        if !extended.is_empty() {
            tracing::debug!(
                forward = state.consecutive_forward_turns,
                backward = state.consecutive_backward_turns,
                "Sustained reading direction; extending preload range"
            );
            self.spawn_extended(extended);
        }
    }

    fn spawn_standard(&self, state: PreloadState) {
        let token = self.session.child_token();
        let generation = self.standard.claim(token.clone());
        let cache = Arc::clone(&self.cache);
        let standard = Arc::clone(&self.standard);
        let range = self.options.range;
        let PreloadState { current_index, total_chapters, .. } = state;

        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::trace!(current_index, "Standard preload superseded");
                },
                report = cache.preload_chapters(current_index, total_chapters, range) => {
                    if !report.failed.is_empty() {
                        tracing::warn!(current_index, failed = ?report.failed, "Some chapters could not be preloaded");
                    }
                },
            }
            standard.release(generation);
        });
    }

    fn spawn_extended(&self, indices: Vec<usize>) {
        let token = self.extended.lock().child_token();
        let cache = Arc::clone(&self.cache);
        let throttle = self.options.throttle;

        self.tracker.spawn(async move {
            let mut fetched = 0;
            for (position, &index) in indices.iter().enumerate() {
                if position > 0 && !pause(throttle, &token).await {
                    break;
                }
                if token.is_cancelled() {
                    break;
                }
                // Failures are already logged by the cache; keep scanning.
                if cache.get_chapter_content(index, false).await.is_ok() {
                    fetched += 1;
                }
            }
            match token.is_cancelled() {
                true => tracing::debug!(?indices, fetched, "Extended preload cancelled"),
                false => tracing::debug!(?indices, fetched, "Extended preload complete"),
            }
        });
    }

    /// Load a single chapter now and wait for it, e.g. the target of a jump.
    ///
    /// May run alongside a standard preload touching the same chapter; both
    /// end up with identical content in memory.
    pub async fn preload_chapter(&self, index: usize) -> CacheResult<Arc<ChapterContent>> {
        self.cache.get_chapter_content(index, false).await
    }

    /// Stop every in-flight standard and extended preload. Chapters already
    /// loaded stay loaded. Safe to call with nothing in flight; later page
    /// turns schedule work as normal.
    pub fn cancel(&self) {
        self.standard.cancel();
        let fresh = self.session.child_token();
        let previous = std::mem::replace(&mut *self.extended.lock(), fresh);
        previous.cancel();
        tracing::debug!(book = %self.cache.book(), "Preloading cancelled");
    }

    /// Forget the reader's streak without moving them or stopping any work.
    pub fn reset_prediction(&self) {
        self.state.lock().reset_prediction();
    }

    /// Whether a standard preload is running right now. Extended preloads
    /// don't count.
    pub fn is_preloading(&self) -> bool {
        *self.standard.preloading.borrow()
    }

    /// Watch [`is_preloading()`](Self::is_preloading) change over time.
    pub fn subscribe_preloading(&self) -> watch::Receiver<bool> {
        self.standard.preloading.subscribe()
    }

    pub fn state(&self) -> PreloadState {
        *self.state.lock()
    }

    /// Wait for every task spawned so far to finish (or notice it was
    /// cancelled).
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// End of session: cancel everything and wait for the tasks to stop.
    pub async fn shutdown(&self) {
        self.cancel();
        self.session.cancel();
        self.settle().await;
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        self.session.cancel();
    }
}

/// Sleep for `throttle`, unless cancelled first. Returns whether the caller
/// should carry on.
async fn pause(throttle: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = token.cancelled() => false,
        () = tokio::time::sleep(throttle) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_storage::BookId;
    use quire_storage::backend::MockChapterStore;

    fn book() -> BookId {
        BookId::new("middlemarch").unwrap()
    }

    fn options() -> PreloadOptions {
        PreloadOptions { throttle: Duration::from_millis(1), ..Default::default() }
    }

    fn setup(total: usize, options: PreloadOptions) -> (Arc<MockChapterStore>, Preloader) {
        let chapters = (0..total).map(|index| format!("<p>Chapter {index}</p>"));
        let store = Arc::new(MockChapterStore::with_chapters(&book(), chapters));
        let capacity = std::num::NonZeroUsize::new(32).unwrap();
        let cache = Arc::new(CacheManager::with_capacity(store.clone(), book(), capacity));
        let preloader = Preloader::new(cache, options);
        preloader.initialize(total);
        (store, preloader)
    }

    fn sorted_resident(preloader: &Preloader) -> Vec<usize> {
        let mut resident = preloader.cache().resident_indices();
        resident.sort_unstable();
        resident
    }

    #[tokio::test]
    async fn test_jump_preloads_standard_window() {
        let (store, preloader) = setup(10, options());
        preloader.on_page_turn(5, Direction::Jump);
        preloader.settle().await;
        assert_eq!(sorted_resident(&preloader), [3, 4, 6, 7]);
        assert_eq!(store.reads_of(&book(), 5).await, 0);
    }

    #[tokio::test]
    async fn test_newer_turn_supersedes_standard_preload() {
        let (store, preloader) = setup(10, options());
        // Neither task gets to run before the second turn replaces the first.
        preloader.on_page_turn(2, Direction::Jump);
        preloader.on_page_turn(8, Direction::Jump);
        preloader.settle().await;
        assert_eq!(store.read_indices(&book()).await, [6, 7, 9]);
    }

    #[tokio::test]
    async fn test_three_forward_turns_extend_forwards() {
        let (store, preloader) = setup(10, options());
        preloader.on_page_turn(0, Direction::Jump);
        preloader.on_page_turn(1, Direction::Forward);
        preloader.on_page_turn(2, Direction::Forward);
        preloader.settle().await;
        // Two turns: standard window only.
        assert!(store.read_indices(&book()).await.iter().all(|index| *index <= 4));

        preloader.on_page_turn(3, Direction::Forward);
        preloader.settle().await;
        for index in 6..=9 {
            assert_eq!(store.reads_of(&book(), index).await, 1, "chapter {index} should be prefetched once");
        }
        assert_eq!(preloader.state().consecutive_forward_turns, 3);
    }

    #[tokio::test]
    async fn test_three_backward_turns_extend_backwards() {
        let (store, preloader) = setup(20, options());
        preloader.on_page_turn(15, Direction::Jump);
        preloader.on_page_turn(14, Direction::Backward);
        preloader.on_page_turn(13, Direction::Backward);
        preloader.on_page_turn(12, Direction::Backward);
        preloader.settle().await;
        let read = store.read_indices(&book()).await;
        for index in 6..=9 {
            assert!(read.contains(&index), "chapter {index} should be prefetched");
        }
        assert!(!read.contains(&5));
    }

    #[tokio::test]
    async fn test_jump_resets_prediction() {
        let (store, preloader) = setup(30, options());
        preloader.on_page_turn(0, Direction::Jump);
        for index in 1..=3 {
            preloader.on_page_turn(index, Direction::Forward);
        }
        preloader.on_page_turn(20, Direction::Jump);
        assert_eq!(preloader.state().consecutive_forward_turns, 0);
        assert_eq!(preloader.state().consecutive_backward_turns, 0);
        preloader.settle().await;
        store.reset_reads().await;

        preloader.on_page_turn(21, Direction::Forward);
        preloader.on_page_turn(22, Direction::Forward);
        preloader.settle().await;
        // Still below the threshold: nothing past the standard window.
        assert!(store.read_indices(&book()).await.iter().all(|index| *index <= 24));

        preloader.on_page_turn(23, Direction::Forward);
        preloader.settle().await;
        assert!(store.read_indices(&book()).await.contains(&26));
    }

    #[tokio::test]
    async fn test_direction_change_resets_streak() {
        let (_store, preloader) = setup(10, options());
        preloader.on_page_turn(5, Direction::Forward);
        preloader.on_page_turn(6, Direction::Forward);
        preloader.on_page_turn(5, Direction::Backward);
        let state = preloader.state();
        assert_eq!((state.consecutive_forward_turns, state.consecutive_backward_turns), (0, 1));
        preloader.shutdown().await;
    }

    #[tokio::test]
    async fn test_reset_prediction_keeps_position_and_work() {
        let (_store, preloader) = setup(10, options());
        preloader.on_page_turn(1, Direction::Forward);
        preloader.on_page_turn(2, Direction::Forward);
        preloader.reset_prediction();
        assert_eq!(preloader.state().current_index, 2);
        assert_eq!(preloader.state().consecutive_forward_turns, 0);
        assert!(preloader.is_preloading());
        preloader.settle().await;
        assert_eq!(sorted_resident(&preloader), [0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn test_is_preloading_tracks_standard_task() {
        let (_store, preloader) = setup(10, options());
        let mut watcher = preloader.subscribe_preloading();
        assert!(!preloader.is_preloading());
        preloader.on_page_turn(4, Direction::Jump);
        assert!(preloader.is_preloading());
        assert!(*watcher.borrow_and_update());
        preloader.settle().await;
        assert!(!preloader.is_preloading());
        assert!(watcher.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (store, preloader) = setup(10, options());
        preloader.on_page_turn(0, Direction::Jump);
        for index in 1..=3 {
            preloader.on_page_turn(index, Direction::Forward);
        }
        preloader.cancel();
        assert!(!preloader.is_preloading());
        preloader.settle().await;
        assert_eq!(store.total_reads().await, 0);

        // Still usable afterwards.
        preloader.on_page_turn(5, Direction::Jump);
        preloader.settle().await;
        assert_eq!(sorted_resident(&preloader), [3, 4, 6, 7]);
    }

    #[tokio::test]
    async fn test_cancel_stops_extended_scan_between_items() {
        let slow = PreloadOptions { throttle: Duration::from_secs(3600), ..Default::default() };
        let (store, preloader) = setup(20, slow);
        preloader.on_page_turn(0, Direction::Jump);
        for index in 1..=3 {
            preloader.on_page_turn(index, Direction::Forward);
        }
        for _ in 0..100 {
            if store.reads_of(&book(), 6).await > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.reads_of(&book(), 6).await, 1);
        preloader.cancel();
        // Returns promptly: the scan was waiting out its throttle.
        preloader.settle().await;
        for index in 7..=9 {
            assert_eq!(store.reads_of(&book(), index).await, 0);
        }
        // Partial progress is kept.
        assert!(preloader.cache().is_resident(6));
    }

    #[tokio::test]
    async fn test_extended_scan_survives_newer_turns() {
        let (store, preloader) = setup(20, options());
        preloader.on_page_turn(0, Direction::Jump);
        for index in 1..=3 {
            preloader.on_page_turn(index, Direction::Forward);
        }
        // A jump cancels the standard task but not the extended scan.
        preloader.on_page_turn(15, Direction::Jump);
        preloader.settle().await;
        for index in 6..=9 {
            assert_eq!(store.reads_of(&book(), index).await, 1);
        }
    }

    #[tokio::test]
    async fn test_extended_scan_skips_failures() {
        let (store, preloader) = setup(10, options());
        store.fail_reads_of(&book(), 7).await;
        preloader.on_page_turn(0, Direction::Jump);
        for index in 1..=3 {
            preloader.on_page_turn(index, Direction::Forward);
        }
        preloader.settle().await;
        assert!(!preloader.cache().is_resident(7));
        for index in [6, 8, 9] {
            assert!(preloader.cache().is_resident(index));
        }
    }

    #[tokio::test]
    async fn test_preload_chapter_waits_for_result() {
        let (store, preloader) = setup(10, options());
        let content = preloader.preload_chapter(4).await.unwrap();
        assert_eq!(content.html, "<p>Chapter 4</p>");
        assert!(preloader.cache().is_resident(4));
        let err = preloader.preload_chapter(40).await.unwrap_err();
        assert_eq!(*err, quire_cache::error::ErrorKind::NotFound(40));
        assert_eq!(store.reads_of(&book(), 4).await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_future_work() {
        let (store, preloader) = setup(10, options());
        preloader.shutdown().await;
        preloader.on_page_turn(5, Direction::Jump);
        preloader.settle().await;
        assert_eq!(store.total_reads().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_readers_share_one_bounded_cache() {
        let chapters = (0..30).map(|index| format!("<p>Chapter {index}</p>"));
        let store = Arc::new(MockChapterStore::with_chapters(&book(), chapters));
        let capacity = std::num::NonZeroUsize::new(5).unwrap();
        let cache = Arc::new(CacheManager::with_capacity(store, book(), capacity));
        let preloader = Arc::new(Preloader::new(cache, options()));
        preloader.initialize(30);

        let readers: Vec<_> = (0..4)
            .map(|reader| {
                let preloader = Arc::clone(&preloader);
                tokio::spawn(async move {
                    for round in 0..40 {
                        let index = (reader * 7 + round) % 30;
                        let direction = if round % 5 == 0 { Direction::Jump } else { Direction::Forward };
                        preloader.on_page_turn(index, direction);
                        let chapter = preloader.preload_chapter(index).await.unwrap();
                        assert_eq!(chapter.index, index);
                        assert_eq!(chapter.html, format!("<p>Chapter {index}</p>"));
                        assert!(preloader.cache().resident_indices().len() <= 5);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for reader in readers {
            reader.await.unwrap();
        }

        preloader.settle().await;
        assert!(!preloader.is_preloading());
        let mut resident = preloader.cache().resident_indices();
        assert_eq!(resident.len(), 5);
        resident.sort_unstable();
        resident.dedup();
        assert_eq!(resident.len(), 5);
        for index in resident {
            let content = preloader.preload_chapter(index).await.unwrap();
            assert_eq!(content.index, index);
        }
    }
}
