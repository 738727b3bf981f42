//! Concrete drawing surfaces: a text grid and a device-pixel-ratio-aware
//! raster pixmap with fontdue-rasterised glyphs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use fontdue::{Font, FontSettings};
use image::RgbaImage;
use sha2::{Digest, Sha256};
use tiny_skia::{Color, Pixmap};
use tracing::{debug, warn};

use crate::ascii_frame::AsciiFrame;
use crate::field::{CELL_SIZE, FIELD_RAMP, STAR_RAMP};
use crate::renderer::{GlyphGrid, Surface};
use crate::viewport::Viewport;

pub const FONT_ASSET_HASH_MISMATCH: &str = "FONT_ASSET_HASH_MISMATCH";

/// Backdrop behind the glyphs.
const BACKGROUND: [u8; 3] = [6, 8, 14];
/// Glyph size relative to the cell edge.
const GLYPH_SCALE: f32 = 0.92;

/// Keeps the most recent frame as text.
#[derive(Debug, Clone, Default)]
pub struct TextSurface {
    frame: Option<AsciiFrame>,
}

impl TextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> Option<&AsciiFrame> {
        self.frame.as_ref()
    }
}

impl Surface for TextSurface {
    fn resize(&mut self, _viewport: Viewport, cols: usize, rows: usize) {
        self.frame = Some(AsciiFrame::blank(cols, rows));
    }

    fn paint(&mut self, grid: &GlyphGrid) {
        self.frame = Some(AsciiFrame::from_grid(grid));
    }
}

#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    pub offset_y: i32,
    pub bitmap: Vec<u8>,
}

/// Raster surface sized to the viewport in physical pixels.
pub struct PixmapSurface {
    pixmap: Pixmap,
    font: Font,
    device_pixel_ratio: f32,
    font_size: f32,
    glyph_cache: HashMap<char, GlyphBitmap>,
}

impl PixmapSurface {
    /// Returns `None` when the surface cannot be created: unparsable font
    /// bytes or a pixmap that cannot be allocated.
    pub fn open(font_bytes: Vec<u8>, viewport: Viewport) -> Option<Self> {
        let font = match Font::from_bytes(font_bytes, FontSettings::default()) {
            Ok(font) => font,
            Err(error) => {
                warn!("surface: font could not be parsed: {error}");
                return None;
            }
        };
        let (width, height) = viewport.physical_size();
        let pixmap = Pixmap::new(width, height)?;
        let mut surface = Self {
            pixmap,
            font,
            device_pixel_ratio: viewport.device_pixel_ratio.max(0.1),
            font_size: 0.0,
            glyph_cache: HashMap::new(),
        };
        surface.set_font_size(CELL_SIZE * surface.device_pixel_ratio * GLYPH_SCALE);
        Some(surface)
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn set_font_size(&mut self, font_size: f32) {
        if (self.font_size - font_size).abs() > f32::EPSILON {
            self.font_size = font_size;
            self.glyph_cache.clear();
            for glyph in FIELD_RAMP.iter().chain(STAR_RAMP.iter()) {
                if *glyph != ' ' && self.font.lookup_glyph_index(*glyph) == 0 {
                    warn!("surface: font has no glyph for {:?}", glyph);
                }
            }
        }
    }

    /// Straight-alpha RGBA copy. Every pixel is opaque after a paint, so the
    /// premultiplied data can be copied as is.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width(), self.height(), self.pixmap.data().to_vec())
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = self
            .to_rgba_image()
            .ok_or_else(|| anyhow!("pixmap buffer has unexpected length"))?;
        image
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    fn ensure_glyph(&mut self, glyph: char) {
        if self.glyph_cache.contains_key(&glyph) {
            return;
        }
        let (metrics, bitmap) = self.font.rasterize(glyph, self.font_size);
        self.glyph_cache.insert(
            glyph,
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                offset_y: metrics.ymin,
                bitmap,
            },
        );
    }
}

impl Surface for PixmapSurface {
    fn resize(&mut self, viewport: Viewport, _cols: usize, _rows: usize) {
        let (width, height) = viewport.physical_size();
        if width != self.pixmap.width() || height != self.pixmap.height() {
            match Pixmap::new(width, height) {
                Some(pixmap) => self.pixmap = pixmap,
                None => {
                    warn!(width, height, "surface: pixmap resize failed, keeping old size");
                    return;
                }
            }
        }
        self.device_pixel_ratio = viewport.device_pixel_ratio.max(0.1);
        self.set_font_size(CELL_SIZE * self.device_pixel_ratio * GLYPH_SCALE);
        debug!(width, height, "surface: pixmap resized");
    }

    fn paint(&mut self, grid: &GlyphGrid) {
        self.pixmap.fill(Color::from_rgba8(
            BACKGROUND[0],
            BACKGROUND[1],
            BACKGROUND[2],
            255,
        ));

        let cell_px = CELL_SIZE * self.device_pixel_ratio;
        let frame_width = self.pixmap.width();
        let frame_height = self.pixmap.height();
        let baseline = (cell_px * 0.8).round() as i32;

        for row in 0..grid.rows() {
            for (col, cell) in grid.row(row).iter().enumerate() {
                if cell.glyph == ' ' || cell.alpha <= 0.0 {
                    continue;
                }
                let alpha = (cell.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
                let color = [cell.color[0], cell.color[1], cell.color[2], alpha];
                let origin_x = (col as f32 * cell_px).round() as i32;
                let origin_y = (row as f32 * cell_px).round() as i32;

                self.ensure_glyph(cell.glyph);
                let Some(glyph) = self.glyph_cache.get(&cell.glyph) else {
                    continue;
                };
                let x = origin_x + ((cell_px - glyph.width as f32) * 0.5).round() as i32;
                let y = origin_y + baseline - glyph.height as i32 - glyph.offset_y;
                blend_glyph(
                    self.pixmap.data_mut(),
                    frame_width,
                    frame_height,
                    x,
                    y,
                    glyph,
                    color,
                );
            }
        }
    }
}

pub fn blend_glyph(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 4],
) {
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width as i32 {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            let idx = ((py as u32 * frame_width + px as u32) * 4) as usize;
            blend_pixel(frame, idx, [color[0], color[1], color[2], alpha]);
        }
    }
}

/// Source-over onto an opaque destination pixel.
pub fn blend_pixel(frame: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 || idx + 3 >= frame.len() {
        return;
    }

    let inv_alpha = 255_u16.saturating_sub(alpha);
    for channel in 0..3 {
        let dst = u16::from(frame[idx + channel]);
        let src_c = u16::from(src[channel]);
        frame[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    frame[idx + 3] = 255;
}

/// Reads a font file, checking its SHA-256 when an expected digest is given.
pub fn read_verified_font_bytes(path: &Path, expected_sha256: Option<&str>) -> Result<Vec<u8>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file '{}'", path.display()))?;
    if let Some(expected) = expected_sha256 {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            bail!(
                "{}: {} expected sha256={} actual sha256={}",
                FONT_ASSET_HASH_MISMATCH,
                path.display(),
                expected,
                actual
            );
        }
    }
    Ok(bytes)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{
        blend_glyph, blend_pixel, read_verified_font_bytes, GlyphBitmap, PixmapSurface,
        TextSurface, FONT_ASSET_HASH_MISMATCH,
    };
    use crate::field::GlyphCell;
    use crate::renderer::{GlyphGrid, Surface};
    use crate::viewport::Viewport;

    #[test]
    fn text_surface_keeps_latest_frame() {
        let mut surface = TextSurface::new();
        surface.resize(Viewport::new(28.0, 14.0), 2, 1);
        assert_eq!(surface.frame().map(|f| f.to_text()), Some("  \n".to_owned()));

        let mut grid = GlyphGrid::new(2, 1);
        grid.set(0, 0, GlyphCell {
            glyph: '@',
            ..GlyphCell::default()
        });
        surface.paint(&grid);
        assert_eq!(surface.frame().map(|f| f.to_text()), Some("@ \n".to_owned()));
    }

    #[test]
    fn unparsable_font_leaves_surface_unavailable() {
        assert!(PixmapSurface::open(b"not a font".to_vec(), Viewport::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn blend_pixel_is_source_over() {
        let mut frame = vec![0_u8, 0, 0, 255];
        blend_pixel(&mut frame, 0, [255, 255, 255, 128]);
        assert_eq!(frame, vec![128, 128, 128, 255]);

        blend_pixel(&mut frame, 4, [255, 255, 255, 255]);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn blend_glyph_clips_to_frame() {
        let glyph = GlyphBitmap {
            width: 2,
            height: 2,
            offset_y: 0,
            bitmap: vec![255; 4],
        };
        let mut frame = vec![0_u8; 2 * 2 * 4];
        blend_glyph(&mut frame, 2, 2, 1, 1, &glyph, [200, 100, 50, 255]);
        assert_eq!(&frame[12..16], &[200, 100, 50, 255]);
        assert_eq!(&frame[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn font_hash_mismatch_is_reported() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("font.ttf");
        fs::write(&path, b"bytes").expect("font should write");

        let error = read_verified_font_bytes(&path, Some("00")).expect_err("hash should mismatch");
        assert!(error.to_string().contains(FONT_ASSET_HASH_MISMATCH));

        let bytes = read_verified_font_bytes(&path, None).expect("read should succeed");
        assert_eq!(bytes, b"bytes");
    }
}
