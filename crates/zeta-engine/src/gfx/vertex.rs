use bytemuck::{Pod, Zeroable};

use crate::coords::{Color, Vec2};

use super::backend::{VertexAttribute, VertexFormat, VertexLayout};

/// Batch vertex: position in pass space, straight-alpha color, texture coordinate.
///
/// Layout (32 bytes):
///
///  offset  0  pos    [f32; 2]   loc 0
///  offset  8  color  [f32; 4]   loc 1
///  offset 24  uv     [f32; 2]   loc 2
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRS: [VertexAttribute; 3] = [
        VertexAttribute { location: 0, offset: 0, format: VertexFormat::Float32x2 },
        VertexAttribute { location: 1, offset: 8, format: VertexFormat::Float32x4 },
        VertexAttribute { location: 2, offset: 24, format: VertexFormat::Float32x2 },
    ];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<Vertex>() as u32,
        attributes: &Self::ATTRS,
    };

    #[inline]
    pub fn new(pos: Vec2, color: Color, uv: Vec2) -> Self {
        Self {
            pos: pos.to_array(),
            color: color.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// Exactly three vertices. Winding is preserved as given; the batch shaders
/// do not cull, so either winding draws.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    #[inline]
    pub const fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Self { vertices: [a, b, c] }
    }

    /// Untextured triangle in a single color.
    pub fn solid(points: [Vec2; 3], color: Color) -> Self {
        let v = |p: Vec2| Vertex::new(p, color, Vec2::ZERO);
        Self::new(v(points[0]), v(points[1]), v(points[2]))
    }

    /// Twice the signed area; positive for clockwise winding in a +Y down space.
    pub fn signed_area2(&self) -> f32 {
        let [a, b, c] = self.vertices.map(|v| Vec2::from(v.pos));
        (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(Vertex::LAYOUT.stride, 32);
        assert_eq!(std::mem::size_of::<Triangle>(), 3 * 32);
    }

    #[test]
    fn triangles_cast_to_vertices_in_order() {
        let t = Triangle::solid(
            [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            Color::RED,
        );
        let verts: &[Vertex] = bytemuck::cast_slice(std::slice::from_ref(&t));
        assert_eq!(verts.len(), 3);
        assert_eq!(verts[1].pos, [1.0, 0.0]);
        assert_eq!(verts[2].color, Color::RED.to_array());
    }

    #[test]
    fn signed_area_tracks_winding() {
        let cw = Triangle::solid(
            [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            Color::WHITE,
        );
        let mut ccw = cw;
        ccw.vertices.swap(1, 2);
        assert!(cw.signed_area2() > 0.0);
        assert!(ccw.signed_area2() < 0.0);
    }
}
