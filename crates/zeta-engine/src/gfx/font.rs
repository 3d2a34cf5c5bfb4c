//! Bitmap fonts: glyph arrangement, atlas packing and string layout.
//!
//! A [`FontArrangement`] is built once from TrueType/OpenType bytes with
//! `fontdue`: every requested code point is rasterized and shelf-packed into
//! square RGBA atlases (white RGB, coverage in alpha). The renderer uploads
//! the atlases into a [`Font`], which draw calls then reference.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::coords::{Extent, Rect, Vec2};

use super::backend::{GfxBackend, PixelFormat, TextureDesc, TextureFilter};
use super::error::{FontError, GfxError};
use super::resource::{ResourceGroup, Texture};
use super::texture_data::ImageRgba8;
use super::Renderer;

/// Default atlas edge length in pixels.
pub const DEFAULT_ATLAS_SIZE: u32 = 1024;

/// Pixels kept empty around every glyph in an atlas.
const GLYPH_PADDING: u32 = 1;

/// Metrics and atlas placement of one code point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphInfo {
    /// Bitmap offset from the pen position (top of the line, +Y down).
    pub offset: Vec2,
    /// Bitmap size in pixels; zero for blank glyphs such as space.
    pub size: Vec2,
    /// Horizontal pen advance.
    pub advance: f32,
    pub atlas_index: usize,
    /// Bitmap location inside its atlas, in atlas pixels.
    pub atlas_rect: Rect,
}

/// Per-code-point glyph table of one font at one pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct FontArrangement {
    pub line_height: f32,
    pub glyphs: HashMap<char, GlyphInfo>,
    pub atlas_size: Extent,
}

/// One glyph of a laid-out string, in pass space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub dst: Rect,
    pub atlas_index: usize,
    pub atlas_rect: Rect,
}

/// Result of laying out a string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringLayout {
    /// Visible glyphs in string order.
    pub glyphs: Vec<PlacedGlyph>,
    /// Code points without a glyph, in string order.
    pub missing: Vec<char>,
    /// Block size: widest line by line count times line height.
    pub size: Vec2,
}

// ── shelf packer ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct ShelfPacker {
    size: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
}

impl ShelfPacker {
    fn new(size: u32) -> Self {
        Self { size, cursor_x: GLYPH_PADDING, cursor_y: GLYPH_PADDING, row_height: 0 }
    }

    /// Whether a `w`x`h` bitmap fits an empty atlas at all.
    fn fits_empty(size: u32, w: u32, h: u32) -> bool {
        w + 2 * GLYPH_PADDING <= size && h + 2 * GLYPH_PADDING <= size
    }

    fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        // Next shelf when the glyph does not fit horizontally.
        if self.cursor_x + w + GLYPH_PADDING > self.size {
            self.cursor_y += self.row_height + GLYPH_PADDING;
            self.cursor_x = GLYPH_PADDING;
            self.row_height = 0;
        }

        if self.cursor_y + h + GLYPH_PADDING > self.size {
            return None;
        }

        let pos = (self.cursor_x, self.cursor_y);
        self.cursor_x += w + GLYPH_PADDING;
        self.row_height = self.row_height.max(h);
        Some(pos)
    }
}

fn blit_coverage(atlas: &mut ImageRgba8, x: u32, y: u32, w: u32, coverage: &[u8]) {
    let stride = atlas.size.width as usize * 4;
    for (row, line) in coverage.chunks_exact(w as usize).enumerate() {
        let start = (y as usize + row) * stride + x as usize * 4;
        for (i, &a) in line.iter().enumerate() {
            let px = start + i * 4;
            atlas.pixels[px..px + 4].copy_from_slice(&[0xFF, 0xFF, 0xFF, a]);
        }
    }
}

// ── arrangement ───────────────────────────────────────────────────────────

impl FontArrangement {
    /// Rasterizes `code_points` at `px_height` into `atlas_size`-square atlases.
    ///
    /// Code points the font has no glyph for are left out. Glyphs larger than
    /// an atlas are skipped with a warning.
    pub fn rasterize(
        font_bytes: &[u8],
        px_height: f32,
        code_points: impl IntoIterator<Item = char>,
        atlas_size: u32,
    ) -> Result<(Self, Vec<ImageRgba8>), FontError> {
        if px_height.is_nan() || px_height <= 0.0 {
            return Err(FontError(format!("invalid pixel height {px_height}")));
        }
        if atlas_size <= 2 * GLYPH_PADDING {
            return Err(FontError(format!("atlas size {atlas_size} is too small")));
        }

        let font = fontdue::Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(|e| FontError(e.to_string()))?;

        let (ascent, line_height) = match font.horizontal_line_metrics(px_height) {
            Some(m) => (m.ascent, m.new_line_size),
            None => (px_height, px_height),
        };

        let atlas_extent = Extent::new(atlas_size, atlas_size);
        let mut atlases = vec![ImageRgba8::new(atlas_extent)];
        let mut packer = ShelfPacker::new(atlas_size);
        let mut glyphs = HashMap::new();

        for ch in code_points {
            if glyphs.contains_key(&ch) || font.lookup_glyph_index(ch) == 0 {
                continue;
            }

            let (metrics, coverage) = font.rasterize(ch, px_height);
            let (w, h) = (metrics.width as u32, metrics.height as u32);
            let offset = Vec2::new(metrics.xmin as f32, ascent - (metrics.ymin as f32 + h as f32));

            let mut info = GlyphInfo {
                offset,
                size: Vec2::new(w as f32, h as f32),
                advance: metrics.advance_width,
                atlas_index: 0,
                atlas_rect: Rect::default(),
            };

            if w > 0 && h > 0 {
                if !ShelfPacker::fits_empty(atlas_size, w, h) {
                    log::warn!("glyph {ch:?} ({w}x{h}) does not fit a {atlas_size}px atlas; skipped");
                    continue;
                }

                let (x, y) = match packer.place(w, h) {
                    Some(pos) => pos,
                    None => {
                        atlases.push(ImageRgba8::new(atlas_extent));
                        packer = ShelfPacker::new(atlas_size);
                        match packer.place(w, h) {
                            Some(pos) => pos,
                            None => continue,
                        }
                    }
                };

                let index = atlases.len() - 1;
                blit_coverage(&mut atlases[index], x, y, w, &coverage);
                info.atlas_index = index;
                info.atlas_rect = Rect::new(x as f32, y as f32, w as f32, h as f32);
            }

            glyphs.insert(ch, info);
        }

        log::debug!(
            "font arranged: {} glyphs at {}px in {} atlas(es)",
            glyphs.len(),
            px_height,
            atlases.len()
        );

        Ok((Self { line_height, glyphs, atlas_size: atlas_extent }, atlases))
    }

    /// [`rasterize`](Self::rasterize) for printable ASCII.
    pub fn rasterize_ascii(
        font_bytes: &[u8],
        px_height: f32,
    ) -> Result<(Self, Vec<ImageRgba8>), FontError> {
        Self::rasterize(font_bytes, px_height, ' '..='~', DEFAULT_ATLAS_SIZE)
    }

    pub fn glyph(&self, ch: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&ch)
    }

    /// Lays `text` out with its block anchored at `pos`.
    ///
    /// `alignment` is normalised per axis: `(0, 0)` puts the block's top-left
    /// corner at `pos`, `(0.5, 0.5)` centres it, `(1, 1)` puts its
    /// bottom-right corner there. Each line is aligned horizontally on its
    /// own width.
    pub fn layout(&self, text: &str, pos: Vec2, alignment: Vec2) -> StringLayout {
        if text.is_empty() {
            return StringLayout::default();
        }

        let mut glyphs: Vec<PlacedGlyph> = Vec::new();
        let mut missing = Vec::new();
        let mut pen = Vec2::ZERO;
        let mut line_start = 0;
        let mut widest = 0.0f32;
        let mut lines = 1u32;

        for ch in text.chars() {
            if ch == '\n' {
                align_line(&mut glyphs[line_start..], pen.x, alignment.x);
                widest = widest.max(pen.x);
                pen = Vec2::new(0.0, pen.y + self.line_height);
                line_start = glyphs.len();
                lines += 1;
                continue;
            }

            let Some(info) = self.glyphs.get(&ch) else {
                missing.push(ch);
                continue;
            };

            if info.size.x > 0.0 && info.size.y > 0.0 {
                glyphs.push(PlacedGlyph {
                    ch,
                    dst: Rect::from_origin_size(pen + info.offset, info.size),
                    atlas_index: info.atlas_index,
                    atlas_rect: info.atlas_rect,
                });
            }
            pen.x += info.advance;
        }
        align_line(&mut glyphs[line_start..], pen.x, alignment.x);
        widest = widest.max(pen.x);

        let height = lines as f32 * self.line_height;
        let shift = pos - Vec2::new(0.0, height * alignment.y);
        for g in &mut glyphs {
            g.dst.origin += shift;
        }

        StringLayout { glyphs, missing, size: Vec2::new(widest, height) }
    }
}

fn align_line(line: &mut [PlacedGlyph], width: f32, align_x: f32) {
    let dx = width * align_x;
    if dx != 0.0 {
        for g in line {
            g.dst.origin.x -= dx;
        }
    }
}

// ── uploaded font ─────────────────────────────────────────────────────────

/// A font arrangement with its atlases resident on the GPU.
///
/// The atlas textures belong to the resource group the font was loaded into.
#[derive(Debug)]
pub struct Font {
    arrangement: FontArrangement,
    atlases: Vec<Texture>,
    warned: RefCell<HashSet<char>>,
}

impl Font {
    pub fn arrangement(&self) -> &FontArrangement {
        &self.arrangement
    }

    pub fn atlases(&self) -> &[Texture] {
        &self.atlases
    }

    pub fn line_height(&self) -> f32 {
        self.arrangement.line_height
    }

    /// Size of the block `text` occupies when drawn.
    pub fn measure_string(&self, text: &str) -> Vec2 {
        self.arrangement.layout(text, Vec2::ZERO, Vec2::ZERO).size
    }

    /// Logs a missing code point once per font.
    pub(crate) fn report_missing(&self, ch: char) {
        if self.warned.borrow_mut().insert(ch) {
            log::warn!("font has no glyph for {ch:?} (U+{:04X}); skipped", ch as u32);
        }
    }
}

impl<B: GfxBackend> Renderer<B> {
    /// Uploads `atlases` into `group` and pairs them with `arrangement`.
    pub fn load_font(
        &mut self,
        group: &mut ResourceGroup,
        arrangement: FontArrangement,
        atlases: &[ImageRgba8],
    ) -> Result<Font, GfxError> {
        if let Some((ch, g)) = arrangement.glyphs.iter().find(|(_, g)| {
            g.size.x > 0.0 && g.size.y > 0.0 && g.atlas_index >= atlases.len()
        }) {
            return Err(FontError(format!(
                "glyph {ch:?} references atlas {} of {}",
                g.atlas_index,
                atlases.len()
            ))
            .into());
        }

        debug_assert!(
            arrangement.glyphs.values().filter(|g| g.size.x > 0.0 && g.size.y > 0.0).all(|g| {
                Rect::from_size(atlases[g.atlas_index].size.to_vec2()).contains_rect(g.atlas_rect)
            }),
            "glyph outside its atlas"
        );

        let mut textures = Vec::with_capacity(atlases.len());
        for image in atlases {
            let desc = TextureDesc::new(image.size)
                .with_format(PixelFormat::Rgba8Unorm)
                .with_filter(TextureFilter::Linear);
            textures.push(self.create_texture(group, desc, &image.pixels)?);
        }

        Ok(Font { arrangement, atlases: textures, warned: RefCell::new(HashSet::new()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(advance: f32, atlas_x: f32) -> GlyphInfo {
        GlyphInfo {
            offset: Vec2::new(0.0, 2.0),
            size: Vec2::new(advance, 8.0),
            advance,
            atlas_index: 0,
            atlas_rect: Rect::new(atlas_x, 0.0, advance, 8.0),
        }
    }

    fn arrangement() -> FontArrangement {
        let mut glyphs = HashMap::new();
        glyphs.insert('a', glyph(10.0, 1.0));
        glyphs.insert('b', glyph(6.0, 12.0));
        glyphs.insert(
            ' ',
            GlyphInfo {
                offset: Vec2::ZERO,
                size: Vec2::ZERO,
                advance: 4.0,
                atlas_index: 0,
                atlas_rect: Rect::default(),
            },
        );
        FontArrangement { line_height: 12.0, glyphs, atlas_size: Extent::new(64, 64) }
    }

    #[test]
    fn pen_advances_and_space_keeps_advance() {
        let l = arrangement().layout("a b", Vec2::ZERO, Vec2::ZERO);
        assert_eq!(l.glyphs.len(), 2);
        assert_eq!(l.glyphs[0].dst.origin, Vec2::new(0.0, 2.0));
        assert_eq!(l.glyphs[1].dst.origin, Vec2::new(14.0, 2.0));
        assert_eq!(l.size, Vec2::new(20.0, 12.0));
    }

    #[test]
    fn newline_resets_pen_and_adds_line_height() {
        let l = arrangement().layout("ab\na", Vec2::new(100.0, 50.0), Vec2::ZERO);
        assert_eq!(l.glyphs[2].dst.origin, Vec2::new(100.0, 50.0 + 12.0 + 2.0));
        assert_eq!(l.size, Vec2::new(16.0, 24.0));
    }

    #[test]
    fn alignment_is_per_line_horizontally_and_per_block_vertically() {
        let l = arrangement().layout("aa\nb", Vec2::ZERO, Vec2::new(0.5, 1.0));
        // Line 1 is 20 wide, line 2 is 6 wide; block is 24 tall.
        assert_eq!(l.glyphs[0].dst.origin, Vec2::new(-10.0, 2.0 - 24.0));
        assert_eq!(l.glyphs[2].dst.origin, Vec2::new(-3.0, 12.0 + 2.0 - 24.0));
    }

    #[test]
    fn missing_code_points_are_reported_not_drawn() {
        let l = arrangement().layout("a?b", Vec2::ZERO, Vec2::ZERO);
        assert_eq!(l.missing, vec!['?']);
        assert_eq!(l.glyphs.len(), 2);
        assert_eq!(l.glyphs[1].dst.origin.x, 10.0);
    }

    #[test]
    fn empty_string_has_no_size() {
        assert_eq!(arrangement().layout("", Vec2::ONE, Vec2::HALF), StringLayout::default());
    }

    #[test]
    fn shelf_packer_wraps_rows_and_fills_up() {
        let mut p = ShelfPacker::new(16);
        assert_eq!(p.place(6, 4), Some((1, 1)));
        assert_eq!(p.place(6, 5), Some((8, 1)));
        // 15 + 6 + 1 > 16: next shelf below the tallest glyph of the row.
        assert_eq!(p.place(6, 4), Some((1, 7)));
        assert_eq!(p.place(6, 9), None);
    }

    #[test]
    fn oversized_glyph_does_not_fit_empty_atlas() {
        assert!(ShelfPacker::fits_empty(16, 14, 14));
        assert!(!ShelfPacker::fits_empty(16, 15, 2));
    }

    #[test]
    fn blit_writes_white_with_coverage_alpha() {
        let mut atlas = ImageRgba8::new(Extent::new(4, 4));
        blit_coverage(&mut atlas, 1, 2, 2, &[10, 20, 30, 40]);
        let px = |x: usize, y: usize| &atlas.pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(px(1, 2), &[0xFF, 0xFF, 0xFF, 10]);
        assert_eq!(px(2, 3), &[0xFF, 0xFF, 0xFF, 40]);
        assert_eq!(px(0, 0), &[0, 0, 0, 0]);
    }

    #[test]
    fn garbage_font_bytes_are_an_error() {
        let err = FontArrangement::rasterize(b"not a font", 16.0, ['a'], 64).unwrap_err();
        assert!(!err.0.is_empty());
    }

    #[test]
    fn load_font_rejects_missing_atlas() {
        use crate::gfx::backend::recording::RecordingBackend;
        use crate::gfx::RendererConfig;

        let mut r = Renderer::startup(RecordingBackend::new(), RendererConfig::default()).unwrap();
        let mut group = ResourceGroup::new("fonts");
        let err = r.load_font(&mut group, arrangement(), &[]).unwrap_err();
        assert!(matches!(err, GfxError::Font(_)));

        let font = r
            .load_font(&mut group, arrangement(), &[ImageRgba8::new(Extent::new(64, 64))])
            .unwrap();
        assert_eq!(font.atlases().len(), 1);
        assert_eq!(font.measure_string("ab"), Vec2::new(16.0, 12.0));

        r.destroy_group(&mut group);
        r.shutdown();
    }
}
