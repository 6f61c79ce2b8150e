//! Texture caching and streaming engine
//!
//! A timestamp goes in, a ready-to-draw frame comes out:
//!
//! 1. [`TextureStreamer`] derives a [`CacheKey`] from the timestamp, the
//!    viewport and the dataset fingerprint
//! 2. On a hit the cached [`TextureFrame`] is returned
//! 3. On a miss the active karaoke line is split into syllable requests
//!    (see [`karaoke`]), or the active plain lines are rasterized, and every
//!    bitmap is uploaded as its own texture
//! 4. The frame is stored in the [`TextureCache`], which owns its textures
//!    until eviction, expiry or `clear`

pub mod clock;
pub mod karaoke;
pub mod key;
mod streamer;
mod texture_cache;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use karaoke::{SyllableRequest, SyllableState, progress_ratio, render_syllable_textures};
pub use key::{CacheKey, dataset_fingerprint};
pub use streamer::{DEFAULT_VIEWPORT, TextureStreamer};
pub use texture_cache::TextureCache;
pub use types::{KaraokeRef, PerformanceStats, PreloadReport, TextureFrame};
