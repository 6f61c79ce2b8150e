//! Glyph rasterizer
//!
//! 使用 ab_glyph 把一行字幕光栅化为 RGBA 位图
//!
//! - 字号随视口高度缩放（视口高度 * 0.055，限制在 24-96px）
//! - 底部居中对齐，`\N` 换行向上堆叠
//! - 卡拉OK 音节按 `SyllableSpan` 在整行中的位置摆放，
//!   已唱部分与未唱部分在 `sung` 比例处分色

use std::path::Path;

use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};

use super::{Bitmap, Fill, Rasterizer, StyleRef};
use crate::error::RenderError;

/// Minimum font size in pixels
const MIN_FONT_SIZE: f32 = 24.0;
/// Maximum font size in pixels
const MAX_FONT_SIZE: f32 = 96.0;
/// Bottom margin as a share of the viewport height
const MARGIN_V_RATIO: f32 = 0.06;

/// Text colors (straight RGBA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: [u8; 4],
    pub sung: [u8; 4],
    pub unsung: [u8; 4],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: [255, 255, 255, 255],
            // 已唱：亮黄色
            sung: [255, 255, 0, 255],
            // 未唱：灰色
            unsung: [128, 128, 128, 255],
        }
    }
}

/// Color of column `x` in a bitmap `width` pixels wide
fn fill_color(palette: &Palette, fill: Fill, x: u32, width: u32) -> [u8; 4] {
    match fill {
        Fill::Plain => palette.primary,
        Fill::Karaoke { sung } => {
            let split = sung.clamp(0.0, 1.0) * width as f32;
            if (x as f32) < split {
                palette.sung
            } else {
                palette.unsung
            }
        }
    }
}

/// ab_glyph based [`Rasterizer`]
pub struct GlyphRasterizer {
    font: FontArc,
    palette: Palette,
    viewport: (u32, u32),
}

impl GlyphRasterizer {
    /// Create from raw font data (TTF/OTF)
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        let font = FontArc::try_from_vec(data)
            .map_err(|e| RenderError::Unavailable(format!("invalid font: {}", e)))?;
        Ok(Self {
            font,
            palette: Palette::default(),
            viewport: (1920, 1080),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path)
            .map_err(|e| RenderError::Unavailable(format!("font {:?}: {}", path, e)))?;
        Self::from_bytes(data)
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    fn font_size(&self) -> f32 {
        (self.viewport.1 as f32 * 0.055).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    }

    /// Lay out a single row starting at x = 0 on the baseline `ascent`
    fn layout_row(&self, text: &str, scale: PxScale) -> (Vec<Glyph>, f32) {
        let scaled = self.font.as_scaled(scale);
        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0f32;
        let mut previous = None;

        for c in text.chars() {
            if c.is_control() {
                continue;
            }
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push(id.with_scale_and_position(scale, point(caret, scaled.ascent())));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret)
    }

    fn row_width(&self, text: &str, scale: PxScale) -> f32 {
        self.layout_row(text, scale).1
    }

    /// Rasterize one row to a bitmap whose top-left is (x, y)
    fn draw_row(&self, text: &str, scale: PxScale, fill: Fill, x: i32, y: i32) -> Option<Bitmap> {
        let scaled = self.font.as_scaled(scale);
        let (glyphs, advance) = self.layout_row(text, scale);
        let width = advance.ceil().max(0.0) as u32;
        let height = (scaled.ascent() - scaled.descent()).ceil().max(0.0) as u32;
        if width == 0 || height == 0 {
            return None;
        }

        let mut coverage = vec![0f32; width as usize * height as usize];
        let mut any_ink = false;
        for glyph in glyphs {
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, c| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                let idx = py as usize * width as usize + px as usize;
                coverage[idx] = (coverage[idx] + c).min(1.0);
                any_ink |= c > 0.0;
            });
        }
        if !any_ink {
            return None;
        }

        let mut pixels = vec![0u8; coverage.len() * 4];
        for (idx, &c) in coverage.iter().enumerate() {
            if c <= 0.0 {
                continue;
            }
            let column = idx as u32 % width;
            let [r, g, b, a] = fill_color(&self.palette, fill, column, width);
            let out = &mut pixels[idx * 4..idx * 4 + 4];
            out[0] = r;
            out[1] = g;
            out[2] = b;
            out[3] = (a as f32 * c).round() as u8;
        }

        Bitmap::new(pixels, width, height, x, y).ok()
    }
}

impl Rasterizer for GlyphRasterizer {
    fn rasterize(
        &mut self,
        text: &str,
        style: &StyleRef,
        _timestamp: f64,
    ) -> Result<Vec<Bitmap>, RenderError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let scale = PxScale::from(self.font_size());
        let scaled = self.font.as_scaled(scale);
        let row_height = (scaled.ascent() - scaled.descent() + scaled.line_gap()).ceil() as i32;
        let (vw, vh) = (self.viewport.0 as f32, self.viewport.1 as f32);
        let bottom = (vh - vh * MARGIN_V_RATIO) as i32;

        // 音节：在整行中定位，只占一行
        if let Some(span) = &style.span {
            let line = span.line.replace('\n', " ");
            let line_width = self.row_width(&line, scale);
            let prefix = line.get(..span.offset).unwrap_or("");
            let x = ((vw - line_width) / 2.0 + self.row_width(prefix, scale)) as i32;
            let text = text.replace('\n', " ");
            return Ok(self
                .draw_row(&text, scale, style.fill, x, bottom - row_height)
                .into_iter()
                .collect());
        }

        let rows: Vec<&str> = text.split('\n').collect();
        let mut bitmaps = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let rows_below = (rows.len() - 1 - i) as i32;
            let y = bottom - row_height * (rows_below + 1);
            let x = ((vw - self.row_width(row, scale)) / 2.0) as i32;
            if let Some(bitmap) = self.draw_row(row, scale, style.fill, x, y) {
                bitmaps.push(bitmap);
            }
        }
        Ok(bitmaps)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_font_is_unavailable() {
        let err = GlyphRasterizer::from_bytes(vec![0, 1, 2, 3]).err().unwrap();
        assert!(matches!(err, RenderError::Unavailable(_)));
    }

    #[test]
    fn test_missing_font_file() {
        let result = GlyphRasterizer::from_file(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(RenderError::Unavailable(_))));
    }

    #[test]
    fn test_plain_fill_ignores_position() {
        let palette = Palette::default();
        assert_eq!(fill_color(&palette, Fill::Plain, 0, 100), palette.primary);
        assert_eq!(fill_color(&palette, Fill::Plain, 99, 100), palette.primary);
    }

    #[test]
    fn test_karaoke_fill_splits_at_sung_fraction() {
        let palette = Palette::default();
        let fill = Fill::Karaoke { sung: 0.25 };
        assert_eq!(fill_color(&palette, fill, 24, 100), palette.sung);
        assert_eq!(fill_color(&palette, fill, 25, 100), palette.unsung);
        assert_eq!(
            fill_color(&palette, Fill::Karaoke { sung: 1.0 }, 99, 100),
            palette.sung
        );
        assert_eq!(
            fill_color(&palette, Fill::Karaoke { sung: 0.0 }, 0, 100),
            palette.unsung
        );
    }
}
