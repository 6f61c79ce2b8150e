//! Frame and statistics types shared by the cache and the streamer

use std::sync::Arc;

use serde::Serialize;

use crate::error::StreamError;
use crate::render::{Bitmap, TextureHandle};
use crate::subtitle::{KaraokeTimingInfo, SubtitleDataset};

/// Karaoke entry of a dataset, shared rather than copied
#[derive(Debug, Clone)]
pub struct KaraokeRef {
    dataset: Arc<SubtitleDataset>,
    index: usize,
}

impl KaraokeRef {
    /// `None` when `index` is out of range
    pub fn new(dataset: Arc<SubtitleDataset>, index: usize) -> Option<Self> {
        dataset.karaoke.get(index)?;
        Some(Self { dataset, index })
    }

    /// Position in the dataset's karaoke list
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn info(&self) -> &KaraokeTimingInfo {
        // Checked in `new`; the dataset is immutable behind the Arc
        &self.dataset.karaoke[self.index]
    }

    pub fn dataset(&self) -> &Arc<SubtitleDataset> {
        &self.dataset
    }
}

/// One rendered subtitle frame
///
/// Owned by the cache entry holding it. References handed out by the cache
/// or the streamer are valid until the next call that mutates the cache.
#[derive(Debug)]
pub struct TextureFrame {
    /// Requested timestamp in seconds
    pub timestamp: f64,
    /// One texture per bitmap, same order as `bitmaps`
    pub textures: Vec<TextureHandle>,
    /// Source bitmaps with their placement
    pub bitmaps: Vec<Bitmap>,
    /// Karaoke line this frame was built from, if any
    pub karaoke: Option<KaraokeRef>,
}

impl TextureFrame {
    /// Textures paired with the bitmaps they were uploaded from
    pub fn layers(&self) -> impl Iterator<Item = (&TextureHandle, &Bitmap)> {
        self.textures.iter().zip(self.bitmaps.iter())
    }

    pub fn is_karaoke(&self) -> bool {
        self.karaoke.is_some()
    }

    pub fn karaoke_info(&self) -> Option<&KaraokeTimingInfo> {
        self.karaoke.as_ref().map(KaraokeRef::info)
    }
}

/// Cache/streaming snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub cache_size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses) over the cache lifetime, 0 before any lookup
    pub hit_rate: f64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because they outlived the TTL
    pub expirations: u64,
    /// Frames rendered by preload calls
    pub preloaded_frames: u64,
}

/// Outcome of one preload call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreloadReport {
    /// Timestamps visited (never more than the preload horizon)
    pub requested: usize,
    /// Already cached
    pub cached: usize,
    /// Newly rendered and cached
    pub rendered: usize,
    /// Nothing visible at that timestamp
    pub empty: usize,
    pub failed: Vec<(f64, StreamError)>,
}
