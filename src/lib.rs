//! karaoke-stream - subtitle and karaoke texture streaming
//!
//! Turns playback timestamps into GPU textures for a video preview or export
//! pipeline, with a bounded LRU/TTL texture cache, horizon preloading and
//! per-syllable karaoke coloring.

pub mod config;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod render;
pub mod subtitle;

pub use config::{OverlaySettings, StreamConfig};
pub use engine::{PerformanceStats, PreloadReport, TextureFrame, TextureStreamer};
pub use error::{ConfigError, DataError, RenderError, StreamError};
pub use overlay::{OverlayStats, SubtitleOverlay};
