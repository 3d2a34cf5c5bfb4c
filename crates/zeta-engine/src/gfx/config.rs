/// Maximum number of passes per frame.
pub const PASS_LIMIT: usize = 32;

/// Renderer sizing.
///
/// Both capacities are fixed for the renderer's lifetime: the CPU batch and
/// the per-frame GPU vertex buffer are allocated once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    /// Triangles one batch can hold before it must be flushed.
    pub batch_triangle_capacity: usize,

    /// Vertices the GPU vertex buffer can hold across all flushes of one frame.
    pub frame_vertex_capacity: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            batch_triangle_capacity: 512,
            frame_vertex_capacity: 8192,
        }
    }
}

impl RendererConfig {
    /// Clamps the configuration into a usable shape.
    ///
    /// A batch always holds at least one triangle and never more vertices
    /// than one frame can.
    pub fn validated(self) -> Self {
        let frame_vertex_capacity = self.frame_vertex_capacity.max(3);
        let max_triangles = (frame_vertex_capacity / 3) as usize;
        let batch_triangle_capacity = self.batch_triangle_capacity.clamp(1, max_triangles);

        if batch_triangle_capacity != self.batch_triangle_capacity
            || frame_vertex_capacity != self.frame_vertex_capacity
        {
            log::warn!(
                "renderer config adjusted: batch {} -> {} triangles, frame {} -> {} vertices",
                self.batch_triangle_capacity,
                batch_triangle_capacity,
                self.frame_vertex_capacity,
                frame_vertex_capacity
            );
        }

        Self { batch_triangle_capacity, frame_vertex_capacity }
    }

    /// Batch capacity in vertices (always a multiple of 3).
    #[inline]
    pub fn batch_vertex_capacity(&self) -> usize {
        self.batch_triangle_capacity * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_already_valid() {
        let c = RendererConfig::default();
        assert_eq!(c.validated(), c);
        assert_eq!(c.batch_vertex_capacity(), 1536);
    }

    #[test]
    fn batch_clamped_to_frame_capacity() {
        let c = RendererConfig { batch_triangle_capacity: 10_000, frame_vertex_capacity: 100 }
            .validated();
        assert_eq!(c.batch_triangle_capacity, 33);
        assert!(c.batch_vertex_capacity() <= c.frame_vertex_capacity as usize);
    }

    #[test]
    fn zero_sizes_become_one_triangle() {
        let c = RendererConfig { batch_triangle_capacity: 0, frame_vertex_capacity: 0 }.validated();
        assert_eq!(c.batch_triangle_capacity, 1);
        assert_eq!(c.frame_vertex_capacity, 3);
    }
}
