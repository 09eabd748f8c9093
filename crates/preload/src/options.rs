use quire_cache::CacheManager;
use std::time::Duration;

/// Tuning knobs for a [`Preloader`](crate::Preloader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadOptions {
    /// Chapters either side of the current one kept warm on every turn.
    pub range: usize,
    /// Consecutive turns in one direction before the extended preload kicks in.
    pub prediction_threshold: usize,
    /// How many chapters past the standard window the extended preload covers.
    pub extended_span: usize,
    /// Pause between extended fetches, so they never compete with the
    /// standard window for I/O.
    pub throttle: Duration,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            range: CacheManager::DEFAULT_PRELOAD_RANGE,
            prediction_threshold: 3,
            extended_span: 4,
            throttle: Duration::from_millis(50),
        }
    }
}
