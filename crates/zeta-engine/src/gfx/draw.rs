//! Convenience draws that lower shapes, textures and text into triangles.

use crate::coords::{Color, Extent, Rect, Vec2};

use super::backend::GfxBackend;
use super::font::Font;
use super::resource::Texture;
use super::{Renderer, Triangle, Vertex};

/// How [`Renderer::draw_texture`] places a texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureDraw {
    /// Source rectangle in texture pixels; `None` is the whole texture.
    pub src: Option<Rect>,
    /// Where the pivot lands.
    pub pos: Vec2,
    /// Pivot, normalised over the drawn size: `(0, 0)` top-left, `(0.5, 0.5)` centre.
    pub origin: Vec2,
    pub scale: Vec2,
    /// Clockwise on screen, in radians, around the pivot.
    pub rotation: f32,
    pub tint: Color,
}

impl TextureDraw {
    pub fn at(pos: Vec2) -> Self {
        Self {
            src: None,
            pos,
            origin: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            tint: Color::WHITE,
        }
    }

    pub fn with_src(mut self, src: Rect) -> Self {
        self.src = Some(src);
        self
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }
}

impl Default for TextureDraw {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}

/// UVs of `src` (texture pixels) in [`Rect::corners`] order.
///
/// With `half_texel_inset`, each edge moves half a texel inwards so linear
/// filtering never reads the neighbouring atlas entry.
pub fn texture_uvs(src: Rect, texture_size: Extent, half_texel_inset: bool) -> [Vec2; 4] {
    let size = texture_size.to_vec2();
    let src = src.normalized();

    let inset = if half_texel_inset {
        Vec2::new(0.5f32.min(src.size.x * 0.5), 0.5f32.min(src.size.y * 0.5))
    } else {
        Vec2::ZERO
    };

    let min = src.min() + inset;
    let max = src.max() - inset;
    let (u0, v0) = (min.x / size.x, min.y / size.y);
    let (u1, v1) = (max.x / size.x, max.y / size.y);

    [Vec2::new(u0, v0), Vec2::new(u1, v0), Vec2::new(u1, v1), Vec2::new(u0, v1)]
}

/// Two triangles sharing the 0-2 diagonal.
fn quad_triangles(corners: [Vec2; 4], uvs: [Vec2; 4], color: Color) -> [Triangle; 2] {
    let v = |i: usize| Vertex::new(corners[i], color, uvs[i]);
    [Triangle::new(v(0), v(1), v(2)), Triangle::new(v(0), v(2), v(3))]
}

impl<B: GfxBackend> Renderer<B> {
    pub fn draw_triangle(&mut self, triangle: &Triangle, texture: Option<&Texture>) {
        self.submit_triangles(std::slice::from_ref(triangle), texture);
    }

    /// Draws a quad given its corners and UVs in matching order.
    pub fn draw_quad(
        &mut self,
        corners: [Vec2; 4],
        uvs: [Vec2; 4],
        color: Color,
        texture: Option<&Texture>,
    ) {
        self.submit_triangles(&quad_triangles(corners, uvs, color), texture);
    }

    pub fn draw_texture(&mut self, texture: &Texture, draw: &TextureDraw) {
        let src = draw.src.unwrap_or(Rect::from_size(texture.size_f32()));
        let size = src.size.mul_elem(draw.scale);
        let pivot = size.mul_elem(draw.origin);

        let corners = Rect::from_origin_size(-pivot, size)
            .corners()
            .map(|c| c.rotated(draw.rotation) + draw.pos);
        let uvs = texture_uvs(src, texture.size(), false);

        self.draw_quad(corners, uvs, draw.tint, Some(texture));
    }

    /// Solid rectangle.
    pub fn draw_rect(&mut self, rect: Rect, color: Color) {
        self.draw_quad(rect.normalized().corners(), [Vec2::ZERO; 4], color, None);
    }

    /// Rectangle border of `thickness` pixels drawn inside `rect`.
    pub fn draw_rect_outline(&mut self, rect: Rect, thickness: f32, color: Color) {
        let r = rect.normalized();
        let t = thickness.max(0.0);
        if t * 2.0 >= r.size.x || t * 2.0 >= r.size.y {
            self.draw_rect(r, color);
            return;
        }

        let (x, y, w, h) = (r.origin.x, r.origin.y, r.size.x, r.size.y);
        self.draw_rect(Rect::new(x, y, w, t), color);
        self.draw_rect(Rect::new(x, y + h - t, w, t), color);
        self.draw_rect(Rect::new(x, y + t, t, h - 2.0 * t), color);
        self.draw_rect(Rect::new(x + w - t, y + t, t, h - 2.0 * t), color);
    }

    /// Line from `a` to `b` as a `width`-wide rectangle. Zero-length lines
    /// draw nothing.
    pub fn draw_line(&mut self, a: Vec2, b: Vec2, width: f32, color: Color) {
        let dir = (b - a).normalized_or_zero();
        if dir == Vec2::ZERO {
            return;
        }

        let n = dir.perp() * (width * 0.5);
        self.draw_quad([a + n, b + n, b - n, a - n], [Vec2::ZERO; 4], color, None);
    }

    /// Draws `text` with its block aligned at `pos` (see [`FontArrangement::layout`]).
    ///
    /// Code points the font lacks are skipped and logged once per font.
    ///
    /// [`FontArrangement::layout`]: super::FontArrangement::layout
    pub fn draw_string(&mut self, font: &Font, text: &str, pos: Vec2, alignment: Vec2, color: Color) {
        let layout = font.arrangement().layout(text, pos, alignment);

        for &ch in &layout.missing {
            font.report_missing(ch);
        }

        for glyph in &layout.glyphs {
            let Some(atlas) = font.atlases().get(glyph.atlas_index) else {
                continue;
            };
            let uvs = texture_uvs(glyph.atlas_rect, atlas.size(), true);
            self.draw_quad(glyph.dst.corners(), uvs, color, Some(atlas));
        }
    }

    /// Routes following triangles through the blend program, mixing them
    /// towards `tint` by its alpha. `None` returns to the default program.
    pub fn set_blend_tint(&mut self, tint: Option<Color>) {
        match tint {
            Some(color) => {
                let program = self.basis().blend_program();
                let uniform = self.basis().blend_color();
                self.set_shader_program(Some(&program));
                self.set_uniform(&uniform, color.to_array());
            }
            None => self.set_shader_program(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::{BackendCall, RecordingBackend};
    use crate::gfx::backend::TextureDesc;
    use crate::gfx::font::{FontArrangement, GlyphInfo};
    use crate::gfx::texture_data::ImageRgba8;
    use crate::gfx::{RendererConfig, ResourceGroup};
    use glam::Mat4;
    use std::collections::HashMap;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    fn in_pass() -> Renderer<RecordingBackend> {
        let mut r = Renderer::startup(RecordingBackend::new(), RendererConfig::default()).unwrap();
        r.backend_mut().clear_calls();
        r.frame_begin(Extent::new(320, 240));
        r.pass_begin(Vec2::new(320.0, 240.0), Mat4::IDENTITY, None);
        r
    }

    fn close_out(mut r: Renderer<RecordingBackend>, mut group: ResourceGroup) -> Vec<Vertex> {
        r.pass_end();
        r.frame_end();
        let verts = r
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::UpdateVertexBuffer { vertices, .. } => Some(vertices.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        r.destroy_group(&mut group);
        r.shutdown();
        verts
    }

    #[test]
    fn full_texture_uvs_span_unit_square() {
        let uvs = texture_uvs(Rect::new(0.0, 0.0, 64.0, 32.0), Extent::new(64, 32), false);
        assert_eq!(uvs, [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::ONE, Vec2::new(0.0, 1.0)]);
    }

    #[test]
    fn half_texel_inset_moves_edges_inwards() {
        let uvs = texture_uvs(Rect::new(10.0, 20.0, 8.0, 8.0), Extent::new(100, 100), true);
        assert!(close(uvs[0], Vec2::new(0.105, 0.205)));
        assert!(close(uvs[2], Vec2::new(0.175, 0.275)));
    }

    #[test]
    fn rect_is_two_untextured_triangles() {
        let mut r = in_pass();
        r.draw_rect(Rect::new(10.0, 10.0, 20.0, 5.0), Color::RED);
        let verts = close_out(r, ResourceGroup::new("none"));

        assert_eq!(verts.len(), 6);
        assert_eq!(verts[0].pos, [10.0, 10.0]);
        assert_eq!(verts[2].pos, [30.0, 15.0]);
        assert!(verts.iter().all(|v| v.color == Color::RED.to_array()));
    }

    #[test]
    fn outline_is_four_rects_in_one_draw() {
        let mut r = in_pass();
        r.draw_rect_outline(Rect::new(0.0, 0.0, 50.0, 40.0), 2.0, Color::WHITE);
        assert_eq!(r.pending_vertices(), 24);
        close_out(r, ResourceGroup::new("none"));
    }

    #[test]
    fn thick_outline_collapses_to_filled_rect() {
        let mut r = in_pass();
        r.draw_rect_outline(Rect::new(0.0, 0.0, 10.0, 10.0), 6.0, Color::WHITE);
        assert_eq!(r.pending_vertices(), 6);
        close_out(r, ResourceGroup::new("none"));
    }

    #[test]
    fn line_is_width_wide_rectangle() {
        let mut r = in_pass();
        r.draw_line(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 4.0, Color::WHITE);
        r.draw_line(Vec2::new(5.0, 5.0), Vec2::new(5.0, 5.0), 4.0, Color::WHITE);
        let verts = close_out(r, ResourceGroup::new("none"));

        assert_eq!(verts.len(), 6);
        let ys: Vec<f32> = verts.iter().map(|v| v.pos[1]).collect();
        assert!(ys.iter().all(|y| (y.abs() - 2.0).abs() < 1e-5));
    }

    #[test]
    fn texture_rotates_around_pivot() {
        let mut r = in_pass();
        r.frame_end_for_setup();
        let mut group = ResourceGroup::new("tex");
        let tex = r
            .create_texture(&mut group, TextureDesc::new(Extent::new(4, 2)), &[0xFF; 32])
            .unwrap();
        r.frame_begin(Extent::new(320, 240));
        r.pass_begin(Vec2::new(320.0, 240.0), Mat4::IDENTITY, None);

        let draw = TextureDraw::at(Vec2::new(100.0, 100.0))
            .with_origin(Vec2::HALF)
            .with_rotation(std::f32::consts::FRAC_PI_2);
        r.draw_texture(&tex, &draw);
        let verts = close_out(r, group);

        // 4x2 centred at (100,100), rotated a quarter turn: top-left corner
        // (-2,-1) ends up at (1,-2) relative to the pivot.
        assert!(close(Vec2::from(verts[0].pos), Vec2::new(101.0, 98.0)));
        assert_eq!(verts[0].uv, [0.0, 0.0]);
        assert_eq!(verts[2].uv, [1.0, 1.0]);
    }

    #[test]
    fn string_glyphs_share_one_atlas_draw() {
        let mut glyphs = HashMap::new();
        for (i, ch) in ['h', 'i'].into_iter().enumerate() {
            glyphs.insert(
                ch,
                GlyphInfo {
                    offset: Vec2::ZERO,
                    size: Vec2::new(8.0, 10.0),
                    advance: 9.0,
                    atlas_index: 0,
                    atlas_rect: Rect::new(1.0 + 9.0 * i as f32, 1.0, 8.0, 10.0),
                },
            );
        }
        let arrangement =
            FontArrangement { line_height: 12.0, glyphs, atlas_size: Extent::new(32, 32) };

        let mut r = in_pass();
        r.frame_end_for_setup();
        let mut group = ResourceGroup::new("font");
        let font = r
            .load_font(&mut group, arrangement, &[ImageRgba8::new(Extent::new(32, 32))])
            .unwrap();
        r.frame_begin(Extent::new(320, 240));
        r.pass_begin(Vec2::new(320.0, 240.0), Mat4::IDENTITY, None);

        r.draw_string(&font, "hi!", Vec2::new(10.0, 10.0), Vec2::ZERO, Color::WHITE);
        assert_eq!(r.pending_vertices(), 12);
        let verts = close_out(r, group);
        assert_eq!(verts[6].pos, [19.0, 10.0]);
    }

    #[test]
    fn blend_tint_switches_program_and_sets_uniform() {
        let mut r = in_pass();
        let blend_program = r.basis().blend_program().handle();
        r.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE);
        r.set_blend_tint(Some(Color::RED.with_alpha(0.5)));
        r.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE);
        r.set_blend_tint(None);
        r.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE);
        r.pass_end();
        r.frame_end();

        let draws = r.backend().draws();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[1].program, blend_program);
        assert_ne!(draws[2].program, blend_program);
        assert!(r.backend().calls().iter().any(|c| matches!(
            c,
            BackendCall::SetUniform { value, .. } if *value == [1.0, 0.0, 0.0, 0.5]
        )));
        r.shutdown();
    }

    impl Renderer<RecordingBackend> {
        /// Closes the pass and frame opened by `in_pass` so resources can be created.
        fn frame_end_for_setup(&mut self) {
            self.pass_end();
            self.frame_end();
        }
    }
}
