//! Texture streamer
//!
//! The only component that talks to both the cache and the render
//! collaborators. Everything runs synchronously on the calling thread, which
//! must be the thread owning the GPU context.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::clock::{SharedClock, SystemClock};
use super::karaoke;
use super::key::{CacheKey, dataset_fingerprint, quantize};
use super::texture_cache::TextureCache;
use super::types::{KaraokeRef, PerformanceStats, PreloadReport, TextureFrame};
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::render::{Bitmap, Rasterizer, SharedSurface, StyleRef, TextureHandle};
use crate::subtitle::{KaraokeTimingInfo, SubtitleDataset, SubtitleLine};

/// Viewport used until the caller configures one
pub const DEFAULT_VIEWPORT: (u32, u32) = (1920, 1080);

/// Cache-backed frame source with preloading
pub struct TextureStreamer {
    config: StreamConfig,
    cache: TextureCache,
    /// Taken on cleanup
    rasterizer: Option<Box<dyn Rasterizer>>,
    dataset: Arc<SubtitleDataset>,
    fingerprint: u64,
    viewport: (u32, u32),
    preloaded: u64,
    shut_down: bool,
}

impl TextureStreamer {
    pub fn new(config: StreamConfig, rasterizer: Box<dyn Rasterizer>, surface: SharedSurface) -> Self {
        Self::with_clock(config, rasterizer, surface, Arc::new(SystemClock::new()))
    }

    /// Streamer whose cache expiry follows `clock`
    pub fn with_clock(
        config: StreamConfig,
        rasterizer: Box<dyn Rasterizer>,
        surface: SharedSurface,
        clock: SharedClock,
    ) -> Self {
        let dataset = Arc::new(SubtitleDataset::default());
        Self {
            config,
            cache: TextureCache::from_config(&config, surface, clock),
            rasterizer: Some(rasterizer),
            fingerprint: dataset_fingerprint(&dataset),
            dataset,
            viewport: DEFAULT_VIEWPORT,
            preloaded: 0,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Change the output size; later lookups use the new size in their keys
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        if let Some(rasterizer) = self.rasterizer.as_mut() {
            rasterizer.resize(width, height);
        }
    }

    /// Replace the active dataset
    ///
    /// The cache is left alone: the new fingerprint keeps old entries from
    /// matching, and they age out on their own.
    pub fn set_subtitle_data(&mut self, lines: Vec<SubtitleLine>, karaoke: Vec<KaraokeTimingInfo>) {
        self.set_dataset(SubtitleDataset::new(lines, karaoke));
    }

    pub fn set_dataset(&mut self, dataset: impl Into<Arc<SubtitleDataset>>) {
        let dataset = dataset.into();
        self.fingerprint = dataset_fingerprint(&dataset);
        info!(
            "[TextureStreamer] dataset loaded: {} lines, {} karaoke entries (fingerprint {:016x})",
            dataset.lines.len(),
            dataset.karaoke.len(),
            self.fingerprint
        );
        self.dataset = dataset;
    }

    pub fn dataset(&self) -> &Arc<SubtitleDataset> {
        &self.dataset
    }

    /// First karaoke entry (dataset order) active at `timestamp`
    pub fn find_karaoke_data(&self, timestamp: f64) -> Option<&KaraokeTimingInfo> {
        self.dataset.find_karaoke(timestamp)
    }

    fn key_for(&self, timestamp: f64) -> CacheKey {
        CacheKey::new(timestamp, self.viewport, self.fingerprint)
    }

    /// Frame for `timestamp`, rendering and caching it on a miss
    ///
    /// `Ok(None)` means nothing is visible. The returned frame borrows the
    /// cache and is valid until the next call on this streamer.
    pub fn get_frame(&mut self, timestamp: f64) -> Result<Option<&TextureFrame>, StreamError> {
        if self.shut_down {
            return Err(StreamError::ShutDown);
        }
        if !timestamp.is_finite() {
            return Ok(None);
        }

        let key = self.key_for(timestamp);
        if self.cache.lookup(&key) {
            return Ok(self.cache.peek(&key));
        }

        match self.render_missing(timestamp) {
            Ok(Some(frame)) => Ok(Some(self.cache.put(key, frame))),
            Ok(None) => Ok(None),
            Err(e) => {
                debug!("[TextureStreamer] frame at {:.3}s failed: {}", timestamp, e);
                Err(e)
            }
        }
    }

    /// Rasterize and upload the frame for `timestamp` without caching it
    fn render_missing(&mut self, timestamp: f64) -> Result<Option<TextureFrame>, StreamError> {
        let (bitmaps, karaoke) = self.rasterize_at(timestamp)?;
        if bitmaps.is_empty() {
            return Ok(None);
        }
        let textures = self.upload(&bitmaps)?;
        Ok(Some(TextureFrame {
            timestamp,
            textures,
            bitmaps,
            karaoke,
        }))
    }

    fn rasterize_at(
        &mut self,
        timestamp: f64,
    ) -> Result<(Vec<Bitmap>, Option<KaraokeRef>), StreamError> {
        let rasterizer = self.rasterizer.as_mut().ok_or(StreamError::ShutDown)?;

        // 卡拉OK：逐音节请求位图
        let karaoke = self
            .dataset
            .find_karaoke_index(timestamp)
            .and_then(|index| KaraokeRef::new(Arc::clone(&self.dataset), index));
        if let Some(karaoke) = karaoke {
            let mut bitmaps = Vec::new();
            let requests =
                karaoke::render_syllable_textures(karaoke.info(), timestamp, self.viewport);
            for request in requests {
                let rendered = rasterizer
                    .rasterize(&request.text, &request.style, timestamp)
                    .map_err(StreamError::Rasterize)?;
                bitmaps.extend(rendered);
            }
            return Ok((bitmaps, Some(karaoke)));
        }

        let mut bitmaps = Vec::new();
        for line in self.dataset.active_lines(timestamp) {
            let rendered = rasterizer
                .rasterize(&line.text, &StyleRef::plain(line.style.as_str()), timestamp)
                .map_err(StreamError::Rasterize)?;
            bitmaps.extend(rendered);
        }
        Ok((bitmaps, None))
    }

    /// One texture per bitmap; on failure the ones already created are released
    fn upload(&self, bitmaps: &[Bitmap]) -> Result<Vec<TextureHandle>, StreamError> {
        let surface = self.cache.surface();
        let mut handles = Vec::with_capacity(bitmaps.len());
        for bitmap in bitmaps {
            match surface.create_texture_from_data(bitmap) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        surface.destroy_texture(handle);
                    }
                    return Err(StreamError::Upload(e));
                }
            }
        }
        Ok(handles)
    }

    /// Warm the cache for `start, start + 1/sample_rate, ...` up to `end`
    ///
    /// At most `preload_frames` timestamps are visited. Cached timestamps are
    /// skipped but marked as recently used, without counting toward the hit
    /// rate. Failures are logged and reported, and do not stop the batch.
    pub fn preload_range(
        &mut self,
        start: f64,
        end: f64,
        sample_rate: f64,
    ) -> Result<PreloadReport, StreamError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(StreamError::InvalidSampleRate(sample_rate));
        }
        let mut report = PreloadReport::default();
        if self.shut_down || !start.is_finite() || !end.is_finite() {
            return Ok(report);
        }

        let last = quantize(end);
        for i in 0..self.config.preload_frames() {
            let timestamp = start + i as f64 / sample_rate;
            // Bound compared at key resolution so rounding never drops `end`
            if !timestamp.is_finite() || quantize(timestamp) > last {
                break;
            }
            report.requested += 1;

            // A warm frame counts as used so this batch does not evict it
            let key = self.key_for(timestamp);
            if self.cache.touch(&key) {
                report.cached += 1;
                continue;
            }

            match self.render_missing(timestamp) {
                Ok(Some(frame)) => {
                    self.cache.put(key, frame);
                    self.preloaded += 1;
                    report.rendered += 1;
                }
                Ok(None) => report.empty += 1,
                Err(e) => {
                    warn!("[TextureStreamer] preload at {:.3}s failed: {}", timestamp, e);
                    report.failed.push((timestamp, e));
                }
            }
        }

        debug!(
            "[TextureStreamer] preload {:.3}s..{:.3}s: {} requested, {} rendered, {} cached, {} failed",
            start,
            end,
            report.requested,
            report.rendered,
            report.cached,
            report.failed.len()
        );
        Ok(report)
    }

    pub fn cache_stats(&self) -> PerformanceStats {
        PerformanceStats {
            preloaded_frames: self.preloaded,
            ..self.cache.stats()
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Release every texture and the rasterizer; later calls are no-ops
    pub fn cleanup(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.cache.clear();
        if let Some(mut rasterizer) = self.rasterizer.take() {
            rasterizer.release();
        }
        info!("[TextureStreamer] cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::engine::testing::{RasterLog, RecordingSurface, ScriptedRasterizer};
    use crate::error::RenderError;
    use crate::render::Fill;
    use parking_lot::Mutex;

    struct Harness {
        streamer: TextureStreamer,
        surface: Arc<RecordingSurface>,
        log: Arc<Mutex<RasterLog>>,
        clock: ManualClock,
    }

    fn harness(preload_frames: usize) -> Harness {
        let config = StreamConfig::from_secs(3, preload_frames, 30.0).unwrap();
        let surface = Arc::new(RecordingSurface::default());
        let rasterizer = ScriptedRasterizer::new();
        let log = rasterizer.log();
        let clock = ManualClock::new();
        let streamer = TextureStreamer::with_clock(
            config,
            Box::new(rasterizer),
            surface.clone(),
            Arc::new(clock.clone()),
        );
        Harness {
            streamer,
            surface,
            log,
            clock,
        }
    }

    fn hello_world() -> Vec<SubtitleLine> {
        vec![SubtitleLine::new(1.0, 3.0, "Hello world").unwrap()]
    }

    #[test]
    fn test_plain_line_end_to_end() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());

        assert!(h.streamer.get_frame(0.5).unwrap().is_none());

        let frame = h.streamer.get_frame(1.5).unwrap().unwrap();
        assert_eq!(frame.bitmaps.len(), 1);
        assert_eq!(frame.textures.len(), 1);
        assert!(!frame.is_karaoke());
        assert_eq!(h.log.lock().calls.len(), 1);

        let hits_before = h.streamer.cache_stats().hits;
        assert!(h.streamer.get_frame(1.5).unwrap().is_some());
        assert_eq!(h.streamer.cache_stats().hits, hits_before + 1);
        assert_eq!(h.log.lock().calls.len(), 1);
    }

    #[test]
    fn test_karaoke_line_renders_per_syllable() {
        let mut h = harness(5);
        let info = KaraokeTimingInfo::new(1.0, 3.0, "Hello world", 2, vec![1.0, 1.0]).unwrap();
        h.streamer.set_subtitle_data(hello_world(), vec![info]);

        let frame = h.streamer.get_frame(2.5).unwrap().unwrap();
        assert_eq!(frame.textures.len(), 2);
        assert!(frame.is_karaoke());
        assert_eq!(frame.karaoke_info().unwrap().text, "Hello world");

        let log = h.log.lock();
        assert_eq!(log.calls.len(), 2);
        assert_eq!(log.calls[0].0, "Hello ");
        assert_eq!(log.calls[0].1.fill, Fill::Karaoke { sung: 1.0 });
        assert_eq!(log.calls[1].0, "world");
        assert_eq!(log.calls[1].1.fill, Fill::Karaoke { sung: 0.5 });
    }

    #[test]
    fn test_karaoke_frame_shares_dataset() {
        let mut h = harness(5);
        let first = KaraokeTimingInfo::new(0.0, 1.0, "intro", 1, vec![1.0]).unwrap();
        let second = KaraokeTimingInfo::new(1.0, 3.0, "la la", 2, vec![1.0, 1.0]).unwrap();
        h.streamer.set_subtitle_data(Vec::new(), vec![first, second]);
        let dataset = Arc::clone(h.streamer.dataset());

        let frame = h.streamer.get_frame(1.5).unwrap().unwrap();
        let karaoke = frame.karaoke.as_ref().unwrap();
        assert_eq!(karaoke.index(), 1);
        assert!(Arc::ptr_eq(karaoke.dataset(), &dataset));
        assert_eq!(karaoke.info().text, "la la");
    }

    #[test]
    fn test_find_karaoke_prefers_first_entry() {
        let mut h = harness(5);
        let first = KaraokeTimingInfo::new(1.0, 4.0, "first", 1, vec![3.0]).unwrap();
        let second = KaraokeTimingInfo::new(0.0, 5.0, "second", 1, vec![5.0]).unwrap();
        h.streamer.set_subtitle_data(Vec::new(), vec![first, second]);

        assert_eq!(h.streamer.find_karaoke_data(2.0).unwrap().text, "first");
        assert_eq!(h.streamer.find_karaoke_data(0.5).unwrap().text, "second");
        assert!(h.streamer.find_karaoke_data(5.0).is_none());
    }

    #[test]
    fn test_new_dataset_does_not_hit_stale_frames() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.streamer.get_frame(1.5).unwrap();

        h.streamer
            .set_subtitle_data(vec![SubtitleLine::new(1.0, 3.0, "Goodbye").unwrap()], Vec::new());
        h.streamer.get_frame(1.5).unwrap();

        let log = h.log.lock();
        assert_eq!(log.calls.len(), 2);
        assert_eq!(log.calls[1].0, "Goodbye");
    }

    #[test]
    fn test_viewport_change_misses() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.streamer.get_frame(1.5).unwrap();
        h.streamer.set_viewport(1280, 720);
        h.streamer.get_frame(1.5).unwrap();
        assert_eq!(h.log.lock().calls.len(), 2);
        assert_eq!(h.streamer.viewport(), (1280, 720));
    }

    #[test]
    fn test_rasterizer_failure_leaves_cache_unchanged() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.log.lock().fail_with = Some(RenderError::Unavailable("no libass".to_string()));

        let err = h.streamer.get_frame(1.5).unwrap_err();
        assert!(matches!(err, StreamError::Rasterize(RenderError::Unavailable(_))));
        assert_eq!(h.streamer.cache_stats().cache_size, 0);
        assert_eq!(h.surface.created_count(), 0);
    }

    #[test]
    fn test_upload_failure_releases_partial_textures() {
        let mut h = harness(5);
        let info = KaraokeTimingInfo::new(1.0, 3.0, "a b c", 3, vec![1.0, 1.0, 1.0]).unwrap();
        h.streamer.set_subtitle_data(Vec::new(), vec![info]);
        *h.surface.fail_after.lock() = Some(2);

        let err = h.streamer.get_frame(1.5).unwrap_err();
        assert!(matches!(err, StreamError::Upload(RenderError::ContextLost(_))));
        assert_eq!(h.surface.created_count(), 2);
        assert_eq!(h.surface.live_count(), 0);
        assert_eq!(h.streamer.cache_stats().cache_size, 0);
    }

    #[test]
    fn test_blank_render_is_absent_and_not_cached() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.log.lock().blank = true;

        assert!(h.streamer.get_frame(1.5).unwrap().is_none());
        assert_eq!(h.streamer.cache_stats().cache_size, 0);
    }

    #[test]
    fn test_preload_is_bounded_by_horizon() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());

        let report = h.streamer.preload_range(1.0, 3.0, 10.0).unwrap();
        assert_eq!(report.requested, 5);
        assert_eq!(report.rendered, 5);
        assert!(h.log.lock().calls.len() <= 5);
        assert_eq!(h.streamer.cache_stats().preloaded_frames, 5);
        assert_eq!(h.streamer.cache_stats().cache_size, 3);
    }

    #[test]
    fn test_preload_skips_cached_and_reports_empty() {
        let mut h = harness(4);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.streamer.get_frame(2.5).unwrap();

        // 2.0, 2.5, 3.0 and 3.5 (the last two are past the line)
        let report = h.streamer.preload_range(2.0, 4.0, 2.0).unwrap();
        assert_eq!(report.requested, 4);
        assert_eq!(report.cached, 1);
        assert_eq!(report.rendered, 1);
        assert_eq!(report.empty, 2);
    }

    #[test]
    fn test_preload_collects_failures() {
        let mut h = harness(3);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.log.lock().fail_with = Some(RenderError::ContextLost("gone".to_string()));

        let report = h.streamer.preload_range(1.0, 2.0, 10.0).unwrap();
        assert_eq!(report.failed.len(), 3);
        assert_eq!(h.streamer.cache_stats().preloaded_frames, 0);
    }

    #[test]
    fn test_preload_keeps_warm_frame_resident() {
        let mut h = harness(2);
        h.streamer
            .set_subtitle_data(vec![SubtitleLine::new(0.0, 10.0, "long").unwrap()], Vec::new());
        h.streamer.get_frame(2.0).unwrap();
        h.streamer.get_frame(0.5).unwrap();
        h.streamer.get_frame(0.6).unwrap();

        // 2.0 is warm and least recent; rendering 2.1 must evict 0.5 instead
        let report = h.streamer.preload_range(2.0, 3.0, 10.0).unwrap();
        assert_eq!((report.cached, report.rendered), (1, 1));
        assert_eq!(h.log.lock().calls.len(), 4);
        assert_eq!(h.streamer.cache_stats().hits, 0);

        assert!(h.streamer.get_frame(2.0).unwrap().is_some());
        assert_eq!(h.log.lock().calls.len(), 4);
        assert_eq!(h.streamer.cache_stats().hits, 1);
    }

    #[test]
    fn test_preload_includes_end_despite_rounding() {
        let mut h = harness(10);
        h.streamer
            .set_subtitle_data(vec![SubtitleLine::new(0.0, 10.0, "long").unwrap()], Vec::new());

        // 0.2 + 0.1 lands just above 0.3
        let report = h.streamer.preload_range(0.2, 0.3, 10.0).unwrap();
        assert_eq!(report.requested, 2);
        assert_eq!(report.rendered, 2);
    }

    #[test]
    fn test_preload_with_tiny_rate_stays_finite() {
        let mut h = harness(5);
        h.streamer
            .set_subtitle_data(vec![SubtitleLine::new(0.0, 10.0, "long").unwrap()], Vec::new());

        let report = h.streamer.preload_range(0.0, 5.0, 1e-310).unwrap();
        assert_eq!(report.requested, 1);
        assert!(h.log.lock().calls.iter().all(|(_, _, t)| t.is_finite()));
    }

    #[test]
    fn test_preload_rejects_bad_rate() {
        let mut h = harness(5);
        assert_eq!(
            h.streamer.preload_range(0.0, 1.0, 0.0).unwrap_err(),
            StreamError::InvalidSampleRate(0.0)
        );
        assert!(h.streamer.preload_range(0.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_expired_frame_is_rendered_again() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.streamer.get_frame(1.5).unwrap();
        h.clock.set_secs(31.0);
        h.streamer.get_frame(1.5).unwrap();

        assert_eq!(h.log.lock().calls.len(), 2);
        assert_eq!(h.streamer.cache_stats().expirations, 1);
        assert_eq!(h.surface.live_count(), 1);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut h = harness(5);
        h.streamer.set_subtitle_data(hello_world(), Vec::new());
        h.streamer.preload_range(1.0, 3.0, 10.0).unwrap();

        h.streamer.cleanup();
        h.streamer.cleanup();

        assert_eq!(h.streamer.cache_stats().cache_size, 0);
        assert_eq!(h.surface.live_count(), 0);
        assert!(h.surface.double_frees.lock().is_empty());
        assert!(h.log.lock().released);

        assert_eq!(h.streamer.get_frame(1.5).unwrap_err(), StreamError::ShutDown);
        assert_eq!(h.streamer.preload_range(1.0, 3.0, 10.0).unwrap().requested, 0);
    }
}
