use crate::{Direction, PreloadOptions};

/// Where the reader is, and how consistently they've been moving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadState {
    pub current_index: usize,
    pub total_chapters: usize,
    pub consecutive_forward_turns: usize,
    pub consecutive_backward_turns: usize,
}

impl PreloadState {
    /// Record a turn. A move in one direction resets the other direction's
    /// streak; a jump resets both.
    pub(crate) fn record(&mut self, index: usize, direction: Direction) {
        self.current_index = index;
        match direction {
            Direction::Forward => {
                self.consecutive_forward_turns += 1;
                self.consecutive_backward_turns = 0;
            },
            Direction::Backward => {
                self.consecutive_backward_turns += 1;
                self.consecutive_forward_turns = 0;
            },
            Direction::Jump => self.reset_prediction(),
        }
    }

    pub(crate) fn reset_prediction(&mut self) {
        self.consecutive_forward_turns = 0;
        self.consecutive_backward_turns = 0;
    }

    /// Chapters beyond the standard window worth fetching, in fetch order
    /// (nearest the reader first). Empty unless the reader has sustained a
    /// direction for at least `prediction_threshold` turns.
    pub(crate) fn extended_window(&self, options: &PreloadOptions) -> Vec<usize> {
        let threshold = options.prediction_threshold;
        let current = self.current_index;
        let inner = options.range;
        let outer = options.range.saturating_add(options.extended_span);
        if self.consecutive_forward_turns >= threshold {
            let start = current.saturating_add(inner).saturating_add(1);
            let end = current.saturating_add(outer).saturating_add(1).min(self.total_chapters);
            (start..end).collect()
        } else if self.consecutive_backward_turns >= threshold {
            let start = current.saturating_sub(outer);
            // Exclusive: `current - range` itself belongs to the standard window.
            let end = current.saturating_sub(inner).min(self.total_chapters);
            (start..end).rev().collect()
        } else {
            Vec::new()
        }
    }
}
