use crate::coords::Extent;

use super::backend::{GfxBackend, ShaderSource, TextureDesc, TextureFilter, UniformType};
use super::error::GfxError;
use super::resource::{
    GfxResource, ResourceGroup, ShaderProgram, Texture, Uniform, VertexBuffer,
};
use super::Vertex;

const BATCH_VS: &str = include_str!("shaders/batch.vert.wgsl");
const BATCH_FS: &str = include_str!("shaders/batch.frag.wgsl");
const BLEND_FS: &str = include_str!("shaders/blend.frag.wgsl");

/// Sampler uniform every batch binds its texture through.
pub const SAMPLER_UNIFORM: &str = "s_tex";

/// Vec4 uniform read by the blend program.
pub const BLEND_UNIFORM: &str = "u_blend";

/// Resources the renderer needs before the first frame and until shutdown.
///
/// Everything lives in one [`ResourceGroup`] owned by the basis.
#[derive(Debug)]
pub struct RenderingBasis {
    group: ResourceGroup,
    vertex_buffer: VertexBuffer,
    default_program: ShaderProgram,
    blend_program: ShaderProgram,
    sampler: Uniform,
    blend_color: Uniform,
    white: Texture,
}

impl RenderingBasis {
    /// Creates the basis resources. On failure, whatever was already created
    /// is destroyed again before the error is returned.
    pub(crate) fn create<B: GfxBackend>(
        backend: &mut B,
        frame_vertex_capacity: u32,
    ) -> Result<Self, GfxError> {
        let mut group = ResourceGroup::with_capacity("rendering basis", 6);

        match Self::populate(backend, &mut group, frame_vertex_capacity) {
            Ok(parts) => {
                log::debug!(
                    "rendering basis created: {} resources, {} vertices per frame",
                    group.len(),
                    frame_vertex_capacity
                );
                Ok(Self::assemble(group, parts))
            }
            Err(e) => {
                group.destroy_all(backend);
                Err(e)
            }
        }
    }

    fn populate<B: GfxBackend>(
        backend: &mut B,
        group: &mut ResourceGroup,
        frame_vertex_capacity: u32,
    ) -> Result<Parts, GfxError> {
        let handle = backend.create_vertex_buffer(frame_vertex_capacity, &Vertex::LAYOUT)?;
        let vertex_buffer = VertexBuffer { handle, vertex_capacity: frame_vertex_capacity };
        group.add(GfxResource::VertexBuffer(vertex_buffer));

        let default_program = ShaderProgram {
            handle: backend.create_shader_program(&ShaderSource {
                label: "zeta batch",
                vertex: BATCH_VS,
                fragment: BATCH_FS,
            })?,
        };
        group.add(GfxResource::ShaderProgram(default_program));

        let blend_program = ShaderProgram {
            handle: backend.create_shader_program(&ShaderSource {
                label: "zeta blend",
                vertex: BATCH_VS,
                fragment: BLEND_FS,
            })?,
        };
        group.add(GfxResource::ShaderProgram(blend_program));

        let sampler = Uniform {
            handle: backend.create_uniform(SAMPLER_UNIFORM, UniformType::Sampler)?,
            ty: UniformType::Sampler,
        };
        group.add(GfxResource::Uniform(sampler));

        let blend_color = Uniform {
            handle: backend.create_uniform(BLEND_UNIFORM, UniformType::Vec4)?,
            ty: UniformType::Vec4,
        };
        group.add(GfxResource::Uniform(blend_color));

        let size = Extent::new(1, 1);
        let desc = TextureDesc::new(size).with_filter(TextureFilter::Nearest);
        let white = Texture {
            handle: backend.create_texture(&desc, &[0xFF; 4])?,
            size,
            render_target: None,
        };
        group.add(GfxResource::Texture(white));

        Ok(Parts { vertex_buffer, default_program, blend_program, sampler, blend_color, white })
    }

    fn assemble(group: ResourceGroup, p: Parts) -> Self {
        Self {
            group,
            vertex_buffer: p.vertex_buffer,
            default_program: p.default_program,
            blend_program: p.blend_program,
            sampler: p.sampler,
            blend_color: p.blend_color,
            white: p.white,
        }
    }

    pub(crate) fn destroy<B: GfxBackend>(&mut self, backend: &mut B) {
        self.group.destroy_all(backend);
    }

    pub fn vertex_buffer(&self) -> VertexBuffer {
        self.vertex_buffer
    }

    pub fn default_program(&self) -> ShaderProgram {
        self.default_program
    }

    /// Program that mixes every fragment towards the `u_blend` color.
    pub fn blend_program(&self) -> ShaderProgram {
        self.blend_program
    }

    pub fn sampler(&self) -> Uniform {
        self.sampler
    }

    pub fn blend_color(&self) -> Uniform {
        self.blend_color
    }

    /// 1x1 opaque white texture bound by untextured draws.
    pub fn white_texture(&self) -> Texture {
        self.white
    }

    pub fn group(&self) -> &ResourceGroup {
        &self.group
    }
}

struct Parts {
    vertex_buffer: VertexBuffer,
    default_program: ShaderProgram,
    blend_program: ShaderProgram,
    sampler: Uniform,
    blend_color: Uniform,
    white: Texture,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::{BackendCall, RecordingBackend};
    use crate::gfx::backend::ResourceKind;

    #[test]
    fn creates_all_basis_resources() {
        let mut backend = RecordingBackend::new();
        let mut basis = RenderingBasis::create(&mut backend, 8192).unwrap();

        assert_eq!(basis.group().len(), 6);
        assert_eq!(basis.vertex_buffer().vertex_capacity(), 8192);
        assert_eq!(basis.white_texture().size(), Extent::new(1, 1));
        assert_ne!(basis.default_program(), basis.blend_program());
        assert!(backend.calls().iter().any(|c| matches!(
            c,
            BackendCall::CreateUniform { name, ty: UniformType::Vec4, .. } if name == BLEND_UNIFORM
        )));

        basis.destroy(&mut backend);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn partial_basis_is_released_on_failure() {
        let mut backend = RecordingBackend::new();
        backend.fail_creation_of(ResourceKind::Texture);

        let err = RenderingBasis::create(&mut backend, 1024).unwrap_err();

        assert!(matches!(err, GfxError::Backend(ref e) if e.kind == ResourceKind::Texture));
        assert_eq!(backend.live_resources(), 0);
    }
}
