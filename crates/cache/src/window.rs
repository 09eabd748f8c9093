use std::ops::Range;

/// Chapters within `range` of `current`, excluding `current` itself, clipped
/// to a book of `total` chapters.
///
/// Preceding chapters come first, then following chapters, both ascending.
///
/// ```
/// let window: Vec<_> = quire_cache::neighbourhood(5, 10, 2).collect();
/// assert_eq!(window, [3, 4, 6, 7]);
/// ```
pub fn neighbourhood(current: usize, total: usize, range: usize) -> impl Iterator<Item = usize> {
    before(current, total, range).chain(after(current, total, range))
}

fn before(current: usize, total: usize, range: usize) -> Range<usize> {
    current.saturating_sub(range)..current.min(total)
}

fn after(current: usize, total: usize, range: usize) -> Range<usize> {
    current.saturating_add(1)..current.saturating_add(range).saturating_add(1).min(total)
}
