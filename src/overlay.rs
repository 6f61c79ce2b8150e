//! Subtitle overlay
//!
//! Entry point for playback and export callers. Holds the viewport and the
//! current dataset and forwards timestamp queries to the streamer.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::{OverlaySettings, StreamConfig};
use crate::engine::{
    PerformanceStats, PreloadReport, SharedClock, TextureFrame, TextureStreamer, progress_ratio,
};
use crate::error::{ConfigError, StreamError};
use crate::render::{Rasterizer, SharedSurface};
use crate::subtitle::{KaraokeTimingInfo, SubtitleDataset, SubtitleLine, load_ass_file};

/// Snapshot combining cache statistics with overlay state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayStats {
    #[serde(flatten)]
    pub stream: PerformanceStats,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub line_count: usize,
    pub karaoke_count: usize,
    pub surface_attached: bool,
}

pub struct SubtitleOverlay {
    streamer: TextureStreamer,
    /// Released on cleanup
    surface: Option<SharedSurface>,
    viewport: (u32, u32),
}

impl SubtitleOverlay {
    pub fn new(config: StreamConfig, rasterizer: Box<dyn Rasterizer>, surface: SharedSurface) -> Self {
        let streamer = TextureStreamer::new(config, rasterizer, Arc::clone(&surface));
        Self::assemble(streamer, surface)
    }

    pub fn with_clock(
        config: StreamConfig,
        rasterizer: Box<dyn Rasterizer>,
        surface: SharedSurface,
        clock: SharedClock,
    ) -> Self {
        let streamer = TextureStreamer::with_clock(config, rasterizer, Arc::clone(&surface), clock);
        Self::assemble(streamer, surface)
    }

    /// Overlay with the default streaming policy
    pub fn with_defaults(rasterizer: Box<dyn Rasterizer>, surface: SharedSurface) -> Self {
        Self::new(StreamConfig::default(), rasterizer, surface)
    }

    /// Overlay configured from persisted settings
    pub fn from_settings(
        settings: &OverlaySettings,
        rasterizer: Box<dyn Rasterizer>,
        surface: SharedSurface,
    ) -> Result<Self, ConfigError> {
        let mut overlay = Self::new(settings.stream_config()?, rasterizer, surface);
        overlay.configure_viewport(settings.viewport_width, settings.viewport_height);
        Ok(overlay)
    }

    fn assemble(streamer: TextureStreamer, surface: SharedSurface) -> Self {
        let viewport = streamer.viewport();
        Self {
            streamer,
            surface: Some(surface),
            viewport,
        }
    }

    pub fn configure_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.streamer.set_viewport(width, height);
        info!("Viewport configured: {}x{}", width, height);
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn load_subtitle_dataset(&mut self, lines: Vec<SubtitleLine>, karaoke: Vec<KaraokeTimingInfo>) {
        self.streamer.set_subtitle_data(lines, karaoke);
    }

    pub fn load_dataset(&mut self, dataset: SubtitleDataset) {
        self.streamer.set_dataset(dataset);
    }

    /// Parse an ASS file and make it the active dataset
    ///
    /// On failure the current dataset stays loaded.
    pub fn load_subtitle_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let dataset = load_ass_file(path)?;
        self.load_dataset(dataset);
        Ok(())
    }

    pub fn dataset(&self) -> &SubtitleDataset {
        self.streamer.dataset()
    }

    /// Frame for `timestamp`; valid until the next call on this overlay
    pub fn render_frame(&mut self, timestamp: f64) -> Result<Option<&TextureFrame>, StreamError> {
        self.streamer.get_frame(timestamp)
    }

    /// Lines on screen at `timestamp`, in dataset order
    pub fn active_subtitles(&self, timestamp: f64) -> Vec<&SubtitleLine> {
        self.streamer.dataset().active_lines(timestamp).collect()
    }

    /// Progress of the active karaoke line, 0 when none is active
    pub fn karaoke_progress(&self, timestamp: f64) -> f32 {
        self.streamer
            .find_karaoke_data(timestamp)
            .map(|info| progress_ratio(info, timestamp))
            .unwrap_or(0.0)
    }

    pub fn preload(&mut self, start: f64, end: f64, fps: f64) -> Result<PreloadReport, StreamError> {
        self.streamer.preload_range(start, end, fps)
    }

    pub fn performance_stats(&self) -> OverlayStats {
        let dataset = self.streamer.dataset();
        OverlayStats {
            stream: self.streamer.cache_stats(),
            viewport_width: self.viewport.0,
            viewport_height: self.viewport.1,
            line_count: dataset.lines.len(),
            karaoke_count: dataset.karaoke.len(),
            surface_attached: self.surface.is_some(),
        }
    }

    pub fn surface(&self) -> Option<&SharedSurface> {
        self.surface.as_ref()
    }

    /// Release every texture, the rasterizer and the surface reference
    pub fn cleanup(&mut self) {
        self.streamer.cleanup();
        self.surface = None;
    }
}
