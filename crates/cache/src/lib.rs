//! Chapter content cache.
//!
//! Sits in front of a [`ChapterStore`](quire_storage::ChapterStore) and
//! answers "give me chapter N" for a single open book:
//!
//! - **L1**: a small in-memory LRU of parsed chapters. Never authoritative;
//!   an entry is always identical to what the store would return.
//! - **L2**: the extracted chapter files on disk, read through the store.
//!   Never evicted, only cleared explicitly.
//! - **L3**: the original archive. Extraction into L2 happens before a book
//!   is opened, so a chapter missing from L2 is a miss, not a trigger to
//!   re-extract.

mod content;
pub mod error;
mod manager;
mod memory;
mod window;

pub use crate::content::{ChapterContent, extract_resource_paths};
pub use crate::manager::{CacheManager, CacheStats, PreloadReport};
pub use crate::window::neighbourhood;
