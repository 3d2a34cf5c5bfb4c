use super::backend::BlendMode;
use super::fatal;
use super::resource::{ShaderProgram, Texture};
use super::{Triangle, Vertex};

/// CPU-side accumulator for one run of triangles sharing a shader program,
/// a texture and a blend mode.
///
/// The vertex buffer is allocated once; `vertex_count` is always a multiple
/// of 3 and never exceeds the capacity.
#[derive(Debug)]
pub(crate) struct BatchState {
    vertices: Vec<Vertex>,
    capacity: usize,
    pub(crate) texture: Option<Texture>,
    pub(crate) shader: Option<ShaderProgram>,
    pub(crate) blend: BlendMode,
}

impl BatchState {
    pub(crate) fn new(vertex_capacity: usize) -> Self {
        debug_assert!(vertex_capacity > 0 && vertex_capacity % 3 == 0);
        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            capacity: vertex_capacity,
            texture: None,
            shader: None,
            blend: BlendMode::default(),
        }
    }

    #[inline]
    pub(crate) fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub(crate) fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// True when `triangles` drawn with `texture` cannot join the pending run.
    pub(crate) fn needs_flush(&self, triangles: &[Triangle], texture: Option<&Texture>) -> bool {
        let incoming = triangles.len() * 3;
        let texture_changed = self.texture.map(|t| t.handle) != texture.map(|t| t.handle);
        (texture_changed && !self.is_empty()) || self.vertex_count() + incoming > self.capacity
    }

    /// Appends whole triangles, preserving order and winding.
    ///
    /// The caller flushes first when [`needs_flush`](Self::needs_flush) says so.
    pub(crate) fn push_triangles(&mut self, triangles: &[Triangle], texture: Option<&Texture>) {
        let incoming = triangles.len() * 3;
        if self.vertex_count() + incoming > self.capacity {
            fatal!(
                "batch overflow: {} + {} vertices exceeds capacity {}",
                self.vertex_count(),
                incoming,
                self.capacity
            );
        }

        self.texture = texture.copied();
        self.vertices.extend_from_slice(bytemuck::cast_slice(triangles));
    }

    /// Drops pending vertices and the batch texture. Shader program and blend
    /// mode stay in effect until the pass ends.
    pub(crate) fn clear(&mut self) {
        self.vertices.clear();
        self.texture = None;
    }

    pub(crate) fn reset_pass_state(&mut self) {
        self.clear();
        self.shader = None;
        self.blend = BlendMode::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, Extent, Vec2};
    use crate::gfx::backend::TextureHandle;

    fn tri() -> Triangle {
        Triangle::solid([Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)], Color::WHITE)
    }

    fn tex(id: u32) -> Texture {
        Texture { handle: TextureHandle(id), size: Extent::new(1, 1), render_target: None }
    }

    #[test]
    fn same_texture_coalesces() {
        let mut b = BatchState::new(30);
        let t = tex(1);
        b.push_triangles(&[tri(), tri()], Some(&t));
        assert!(!b.needs_flush(&[tri()], Some(&t)));
        b.push_triangles(&[tri()], Some(&t));
        assert_eq!(b.vertex_count(), 9);
    }

    #[test]
    fn texture_change_needs_flush_even_with_room() {
        let mut b = BatchState::new(30);
        b.push_triangles(&[tri()], Some(&tex(1)));
        assert!(b.needs_flush(&[tri()], Some(&tex(2))));
        assert!(b.needs_flush(&[tri()], None));
    }

    #[test]
    fn empty_batch_accepts_any_texture() {
        let b = BatchState::new(30);
        assert!(!b.needs_flush(&[tri()], Some(&tex(7))));
    }

    #[test]
    fn full_batch_needs_flush() {
        let mut b = BatchState::new(6);
        b.push_triangles(&[tri(), tri()], None);
        assert!(b.needs_flush(&[tri()], None));
    }

    #[test]
    #[should_panic(expected = "batch overflow")]
    fn overflow_is_fatal() {
        let mut b = BatchState::new(6);
        b.push_triangles(&[tri(), tri(), tri()], None);
    }

    #[test]
    fn clear_keeps_shader_and_blend() {
        let mut b = BatchState::new(6);
        b.blend = BlendMode::Additive;
        b.push_triangles(&[tri()], Some(&tex(3)));
        b.clear();
        assert!(b.is_empty());
        assert_eq!(b.texture, None);
        assert_eq!(b.blend, BlendMode::Additive);

        b.reset_pass_state();
        assert_eq!(b.blend, BlendMode::Alpha);
    }

    #[test]
    fn count_never_exceeds_capacity() {
        // Deterministic LCG so the sequence is reproducible.
        let mut seed: u32 = 0x1234_5678;
        let mut next = || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            seed >> 16
        };

        let mut b = BatchState::new(12 * 3);
        let pool: Vec<Triangle> = vec![tri(); 12];
        for _ in 0..500 {
            let n = (next() % 12 + 1) as usize;
            let t = tex(next() % 3);
            let batch = &pool[..n];
            if b.needs_flush(batch, Some(&t)) {
                b.clear();
            }
            b.push_triangles(batch, Some(&t));
            assert!(b.vertex_count() <= b.capacity());
            assert_eq!(b.vertex_count() % 3, 0);
        }
    }
}
