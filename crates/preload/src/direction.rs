use derive_more::Display;

/// How the reader arrived at a chapter.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Turned to the next page/chapter.
    #[display("forward")]
    Forward,
    /// Turned to the previous page/chapter.
    #[display("backward")]
    Backward,
    /// Arrived non-sequentially (table of contents, bookmark, search).
    #[display("jump")]
    Jump,
}

impl Direction {
    /// Infer the direction of a move from `from` to `to`, the way a pager
    /// reports it: any increase is forward, any decrease backward, and
    /// "moving" to the same chapter counts as a jump.
    ///
    /// ```
    /// use quire_preload::Direction;
    /// assert_eq!(Direction::between(3, 4), Direction::Forward);
    /// assert_eq!(Direction::between(3, 9), Direction::Forward);
    /// assert_eq!(Direction::between(3, 2), Direction::Backward);
    /// assert_eq!(Direction::between(3, 3), Direction::Jump);
    /// ```
    pub fn between(from: usize, to: usize) -> Self {
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => Self::Forward,
            std::cmp::Ordering::Less => Self::Backward,
            std::cmp::Ordering::Equal => Self::Jump,
        }
    }
}
