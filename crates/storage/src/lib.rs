//! Chapter storage for extracted e-books.
//!
//! Archive extraction happens upstream: by the time a reader opens a book,
//! every spine item has been written out as a standalone chapter file. This
//! crate is the read side of that contract (plus the write side used by the
//! extractor), behind the [`ChapterStore`] trait.

pub mod backend;
mod book;
pub mod error;
mod layout;

pub use crate::backend::ChapterStore;
pub use crate::book::BookId;
pub use crate::layout::{CONTENT_DIR, chapter_file_name, parse_chapter_file_name};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ChapterStore>;
