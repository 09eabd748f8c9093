//! On-disk naming of extracted chapters.
//!
//! Each book gets `<root>/<book_id>/content/`, holding one file per spine
//! item named after its position in the spine.

/// Name of the per-book directory holding extracted chapters.
pub const CONTENT_DIR: &str = "content";

const PREFIX: &str = "spine_";
const EXTENSION: &str = ".xhtml";

/// Deterministic file name for the chapter at `index`.
///
/// ```
/// assert_eq!(quire_storage::chapter_file_name(7), "spine_7.xhtml");
/// ```
pub fn chapter_file_name(index: usize) -> String {
    format!("{PREFIX}{index}{EXTENSION}")
}

/// Inverse of [`chapter_file_name`]. Anything that isn't a chapter file
/// (temporary files, stray assets) yields `None`.
pub fn parse_chapter_file_name(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    // usize::from_str accepts a leading `+`, which we never write.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
