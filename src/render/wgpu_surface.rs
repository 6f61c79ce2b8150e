//! wgpu-backed GPU surface
//!
//! Each bitmap becomes its own `Rgba8UnormSrgb` texture. The surface keeps the
//! `wgpu::Texture` objects keyed by handle id so callers can fetch a view for
//! drawing while the owning cache entry is alive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Bitmap, GpuSurface, TextureHandle};
use crate::error::RenderError;

/// [`GpuSurface`] on top of a wgpu device
pub struct WgpuSurface {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: Mutex<HashMap<u64, wgpu::Texture>>,
    next_id: AtomicU64,
}

impl WgpuSurface {
    /// Wrap an existing device (e.g. the one owned by the preview window)
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a device without any window, for export and tests
    pub fn headless() -> Result<Self, RenderError> {
        pollster::block_on(Self::request_headless())
    }

    async fn request_headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Subtitle Texture Device"),
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        Ok(Self::new(device, queue))
    }

    /// View for drawing a live texture
    pub fn view(&self, handle: &TextureHandle) -> Option<wgpu::TextureView> {
        self.textures
            .lock()
            .get(&handle.id())
            .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    /// Number of textures currently alive on the device
    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }
}

impl GpuSurface for WgpuSurface {
    fn create_texture_from_data(&self, bitmap: &Bitmap) -> Result<TextureHandle, RenderError> {
        if bitmap.is_empty() {
            return Err(RenderError::InvalidBitmap("zero-sized bitmap".to_string()));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if bitmap.width > max || bitmap.height > max {
            return Err(RenderError::InvalidBitmap(format!(
                "{}x{} exceeds device limit {}",
                bitmap.width, bitmap.height, max
            )));
        }
        if bitmap.pixels.len() != bitmap.width as usize * bitmap.height as usize * 4 {
            return Err(RenderError::InvalidBitmap(
                "pixel buffer does not match dimensions".to_string(),
            ));
        }

        let size = wgpu::Extent3d {
            width: bitmap.width,
            height: bitmap.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Subtitle Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bitmap.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.width * 4),
                rows_per_image: Some(bitmap.height),
            },
            size,
        );

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.textures.lock().insert(id, texture);
        debug!("[WgpuSurface] created texture {} ({}x{})", id, bitmap.width, bitmap.height);
        Ok(TextureHandle::new(id))
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        match self.textures.lock().remove(&handle.id()) {
            Some(texture) => texture.destroy(),
            None => warn!("[WgpuSurface] texture {} is not alive", handle.id()),
        }
    }
}
