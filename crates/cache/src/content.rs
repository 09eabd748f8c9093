use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(IMAGE_SRC_REGEX, r#"<img[^>]+src=["']([^"']+)["']"#);
regex!(LINK_HREF_REGEX, r#"<link[^>]+href=["']([^"']+)["']"#);

/// A parsed chapter, as held in the memory cache.
///
/// Immutable once built; shared between the cache and its callers behind an
/// [`Arc`](std::sync::Arc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterContent {
    /// Position of the chapter in the book's spine.
    pub index: usize,
    /// Chapter body exactly as extracted.
    pub html: String,
    /// Assets referenced by the chapter: images first, then stylesheets,
    /// each in document order.
    pub resources: Vec<String>,
}

impl ChapterContent {
    pub fn new(index: usize, html: impl Into<String>) -> Self {
        let html = html.into();
        let resources = extract_resource_paths(&html);
        Self { index, html, resources }
    }
}

/// Scan chapter markup for referenced images (`<img src>`) and stylesheets
/// (`<link href>`).
///
/// This is a pattern scan, not an HTML parse: it only needs to tell the
/// renderer which assets to have ready.
///
/// ```
/// let html = r#"<link rel="stylesheet" href="style.css"/><img src='cover.jpg'/>"#;
/// assert_eq!(quire_cache::extract_resource_paths(html), ["cover.jpg", "style.css"]);
/// ```
pub fn extract_resource_paths(html: &str) -> Vec<String> {
    let images = IMAGE_SRC_REGEX.captures_iter(html);
    let links = LINK_HREF_REGEX.captures_iter(html);
    images.chain(links).map(|captures| captures[1].to_string()).collect()
}
