//! Render collaborators
//!
//! The engine never touches pixels or graphics APIs directly. It talks to two
//! capabilities:
//!
//! - [`Rasterizer`]: styled text + timestamp -> positioned RGBA bitmaps
//! - [`GpuSurface`]: bitmap -> texture handle, and handle destruction
//!
//! Production implementations live in `glyph_rasterizer` (ab_glyph) and
//! `wgpu_surface` (wgpu). Tests substitute recording fakes.

mod glyph_rasterizer;
mod wgpu_surface;

pub use glyph_rasterizer::{GlyphRasterizer, Palette};
pub use wgpu_surface::WgpuSurface;

use std::sync::Arc;

use crate::error::RenderError;

/// Rasterized pixels with placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Straight-alpha RGBA8, row-major, `width * height * 4` bytes
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Left edge in viewport pixels
    pub x: i32,
    /// Top edge in viewport pixels
    pub y: i32,
}

impl Bitmap {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, x: i32, y: i32) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::InvalidBitmap(format!(
                "{}x{} bitmap needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
            x,
            y,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// How a piece of text is colored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    /// Ordinary subtitle color
    Plain,
    /// Karaoke coloring; `sung` in [0, 1] is the sung share, left to right
    Karaoke { sung: f32 },
}

/// Where a syllable sits inside its line
#[derive(Debug, Clone, PartialEq)]
pub struct SyllableSpan {
    /// Full line text the syllable belongs to
    pub line: String,
    /// Byte offset of the syllable inside `line`
    pub offset: usize,
}

/// Style handed to the rasterizer
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRef {
    /// Named style from the subtitle source
    pub name: String,
    /// Inline override tags
    pub overrides: String,
    pub fill: Fill,
    /// Set when rasterizing one syllable of a line
    pub span: Option<SyllableSpan>,
}

impl StyleRef {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: String::new(),
            fill: Fill::Plain,
            span: None,
        }
    }
}

/// Turns styled text into bitmaps
pub trait Rasterizer {
    /// An empty result means nothing is visible; it is not an error
    fn rasterize(
        &mut self,
        text: &str,
        style: &StyleRef,
        timestamp: f64,
    ) -> Result<Vec<Bitmap>, RenderError>;

    /// Output frame size changed
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Drop any backing resources; called once on teardown
    fn release(&mut self) {}
}

/// GPU texture owned by whoever holds this value
///
/// Neither `Clone` nor `Copy`. [`GpuSurface::destroy_texture`] consumes the
/// handle, so a texture is released at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(u64);

impl TextureHandle {
    /// Mint a handle; only surface implementations should call this
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Owns the graphics context
///
/// Must only be called from the thread that created the context.
pub trait GpuSurface {
    fn create_texture_from_data(&self, bitmap: &Bitmap) -> Result<TextureHandle, RenderError>;

    fn destroy_texture(&self, handle: TextureHandle);
}

/// Surface shared between the cache (which releases textures) and the
/// streamer (which creates them)
pub type SharedSurface = Arc<dyn GpuSurface>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_size_is_checked() {
        assert!(Bitmap::new(vec![0; 16], 2, 2, 0, 0).is_ok());
        let err = Bitmap::new(vec![0; 15], 2, 2, 0, 0).unwrap_err();
        assert!(matches!(err, RenderError::InvalidBitmap(_)));
    }

    #[test]
    fn test_empty_bitmap() {
        let bitmap = Bitmap::new(Vec::new(), 0, 8, 0, 0).unwrap();
        assert!(bitmap.is_empty());
    }
}
