use crate::ChapterContent;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Bounded, strictly least-recently-used map of parsed chapters.
///
/// Every operation takes the lock exactly once, so a lookup-and-promote or
/// an insert-and-evict is a single critical section even when foreground
/// reads and background preloads race on the same book.
pub(crate) struct MemoryCache {
    entries: Mutex<LruCache<usize, Arc<ChapterContent>>>,
}

impl MemoryCache {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    /// Look up a chapter, marking it as most recently used.
    pub(crate) fn get(&self, index: usize) -> Option<Arc<ChapterContent>> {
        self.entries.lock().get(&index).cloned()
    }

    /// Residency check that leaves recency untouched.
    pub(crate) fn contains(&self, index: usize) -> bool {
        self.entries.lock().contains(&index)
    }

    /// Insert (or replace) a chapter as most recently used. Returns the
    /// index of the chapter evicted to make room, if any.
    pub(crate) fn insert(&self, content: Arc<ChapterContent>) -> Option<usize> {
        let index = content.index;
        self.entries.lock().push(index, content).map(|(evicted, _)| evicted).filter(|evicted| *evicted != index)
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn capacity(&self) -> NonZeroUsize {
        self.entries.lock().cap()
    }

    /// Resident indices, most recently used first.
    pub(crate) fn indices(&self) -> Vec<usize> {
        self.entries.lock().iter().map(|(index, _)| *index).collect()
    }
}
