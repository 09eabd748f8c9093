//! Predictive chapter preloading.
//!
//! The reader reports every page turn to a [`Preloader`], which keeps the
//! chapters around the reading position warm in the book's
//! [`CacheManager`](quire_cache::CacheManager):
//!
//! - every turn schedules a *standard* preload of the surrounding window,
//!   superseding (never queueing behind) the previous one;
//! - sustained reading in one direction additionally schedules a throttled
//!   *extended* preload further along that direction.
//!
//! [`ReadingSession`] is the thin driver a reader UI would sit on: it owns
//! the cache, the preloader and the cancellation scope for one open book.

mod direction;
pub mod error;
mod options;
mod preloader;
mod session;
mod state;

pub use crate::direction::Direction;
pub use crate::options::PreloadOptions;
pub use crate::preloader::Preloader;
pub use crate::session::{ReadingSession, SessionOptions};
pub use crate::state::PreloadState;
