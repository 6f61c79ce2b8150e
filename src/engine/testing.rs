//! Test doubles for the render collaborators

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::RenderError;
use crate::render::{Bitmap, GpuSurface, Rasterizer, StyleRef, TextureHandle};

/// Surface that hands out numbered handles and records what happens to them
#[derive(Default)]
pub struct RecordingSurface {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    pub created: Mutex<Vec<u64>>,
    pub destroyed: Mutex<Vec<u64>>,
    /// Destroy calls for handles that were not alive
    pub double_frees: Mutex<Vec<u64>>,
    /// Fail every creation after this many successes
    pub fail_after: Mutex<Option<usize>>,
}

impl RecordingSurface {
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed.lock().len()
    }
}

impl GpuSurface for RecordingSurface {
    fn create_texture_from_data(&self, _bitmap: &Bitmap) -> Result<TextureHandle, RenderError> {
        if let Some(limit) = *self.fail_after.lock() {
            if self.created.lock().len() >= limit {
                return Err(RenderError::ContextLost("scripted failure".to_string()));
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.lock().insert(id);
        self.created.lock().push(id);
        Ok(TextureHandle::new(id))
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let id = handle.id();
        if self.live.lock().remove(&id) {
            self.destroyed.lock().push(id);
        } else {
            self.double_frees.lock().push(id);
        }
    }
}

/// What the scripted rasterizer saw and how it should behave
#[derive(Debug, Default)]
pub struct RasterLog {
    pub calls: Vec<(String, StyleRef, f64)>,
    pub fail_with: Option<RenderError>,
    /// Return no bitmaps
    pub blank: bool,
    pub released: bool,
}

/// Rasterizer returning one 2x1 bitmap per call
pub struct ScriptedRasterizer {
    log: Arc<Mutex<RasterLog>>,
}

impl ScriptedRasterizer {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(RasterLog::default())),
        }
    }

    /// Handle that stays valid after the rasterizer is boxed away
    pub fn log(&self) -> Arc<Mutex<RasterLog>> {
        Arc::clone(&self.log)
    }
}

impl Rasterizer for ScriptedRasterizer {
    fn rasterize(
        &mut self,
        text: &str,
        style: &StyleRef,
        timestamp: f64,
    ) -> Result<Vec<Bitmap>, RenderError> {
        let mut log = self.log.lock();
        log.calls.push((text.to_string(), style.clone(), timestamp));
        if let Some(e) = &log.fail_with {
            return Err(e.clone());
        }
        if log.blank {
            return Ok(Vec::new());
        }
        // Pixel bytes encode the text length so content can be compared
        let shade = (text.len() % 256) as u8;
        Ok(vec![Bitmap::new(vec![shade; 8], 2, 1, 0, 0)?])
    }

    fn release(&mut self) {
        self.log.lock().released = true;
    }
}
