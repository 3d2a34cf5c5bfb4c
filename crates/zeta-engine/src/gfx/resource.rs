use crate::coords::{Extent, Vec2};

use super::backend::{
    GfxBackend, RenderTargetHandle, ResourceKind, ShaderProgramHandle, TextureHandle,
    UniformHandle, UniformType, VertexBufferHandle,
};
use super::fatal;

// ── typed resources ────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexBuffer {
    pub(crate) handle: VertexBufferHandle,
    pub(crate) vertex_capacity: u32,
}

impl VertexBuffer {
    pub fn handle(&self) -> VertexBufferHandle {
        self.handle
    }

    pub fn vertex_capacity(&self) -> u32 {
        self.vertex_capacity
    }
}

/// A sampled texture, optionally backed by a render target.
///
/// Batches compare textures by handle; two `Texture` values with the same
/// handle are the same texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Texture {
    pub(crate) handle: TextureHandle,
    pub(crate) size: Extent,
    pub(crate) render_target: Option<RenderTargetHandle>,
}

impl Texture {
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn size(&self) -> Extent {
        self.size
    }

    pub fn size_f32(&self) -> Vec2 {
        self.size.to_vec2()
    }

    pub fn is_render_target(&self) -> bool {
        self.render_target.is_some()
    }

    pub fn render_target(&self) -> Option<RenderTargetHandle> {
        self.render_target
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShaderProgram {
    pub(crate) handle: ShaderProgramHandle,
}

impl ShaderProgram {
    pub fn handle(&self) -> ShaderProgramHandle {
        self.handle
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Uniform {
    pub(crate) handle: UniformHandle,
    pub(crate) ty: UniformType,
}

impl Uniform {
    pub fn handle(&self) -> UniformHandle {
        self.handle
    }

    pub fn uniform_type(&self) -> UniformType {
        self.ty
    }
}

/// One backend object owned by a [`ResourceGroup`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GfxResource {
    VertexBuffer(VertexBuffer),
    Texture(Texture),
    ShaderProgram(ShaderProgram),
    Uniform(Uniform),
}

impl GfxResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            GfxResource::VertexBuffer(_) => ResourceKind::VertexBuffer,
            GfxResource::Texture(_) => ResourceKind::Texture,
            GfxResource::ShaderProgram(_) => ResourceKind::ShaderProgram,
            GfxResource::Uniform(_) => ResourceKind::Uniform,
        }
    }

    /// Number of backend destroy calls this resource needs.
    fn backend_objects(&self) -> usize {
        match self {
            GfxResource::Texture(t) if t.render_target.is_some() => 2,
            _ => 1,
        }
    }
}

// ── group ──────────────────────────────────────────────────────────────────

/// Stable index of a resource inside its group.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResourceId(usize);

/// Owning collection of backend resources with group-wide teardown.
///
/// Resources are added by the renderer's factory calls and destroyed only by
/// [`Renderer::destroy_group`](super::Renderer::destroy_group), which empties
/// the group; tearing down an empty group does nothing.
#[derive(Debug, Default)]
pub struct ResourceGroup {
    label: String,
    resources: Vec<GfxResource>,
}

impl ResourceGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), resources: Vec::new() }
    }

    pub fn with_capacity(label: impl Into<String>, capacity: usize) -> Self {
        Self { label: label.into(), resources: Vec::with_capacity(capacity) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn add(&mut self, resource: GfxResource) -> ResourceId {
        self.resources.push(resource);
        ResourceId(self.resources.len() - 1)
    }

    pub fn get(&self, id: ResourceId) -> Option<&GfxResource> {
        self.resources.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GfxResource> {
        self.resources.iter()
    }

    /// Destroys every resource in insertion order and empties the group.
    ///
    /// A render target is released before the texture it renders into.
    /// A backend refusing a destroy call is fatal.
    pub(crate) fn destroy_all<B: GfxBackend>(&mut self, backend: &mut B) {
        let objects: usize = self.resources.iter().map(GfxResource::backend_objects).sum();

        for resource in self.resources.drain(..) {
            let result = match resource {
                GfxResource::VertexBuffer(vb) => backend.destroy_vertex_buffer(vb.handle),
                GfxResource::Texture(tex) => {
                    let rt = match tex.render_target {
                        Some(rt) => backend.destroy_render_target(rt),
                        None => Ok(()),
                    };
                    rt.and_then(|_| backend.destroy_texture(tex.handle))
                }
                GfxResource::ShaderProgram(p) => backend.destroy_shader_program(p.handle),
                GfxResource::Uniform(u) => backend.destroy_uniform(u.handle),
            };

            if let Err(e) = result {
                fatal!("resource group '{}': failed to destroy {}: {}", self.label, resource.kind(), e);
            }
        }

        if objects > 0 {
            log::debug!("resource group '{}': destroyed {} backend objects", self.label, objects);
        }
    }
}

impl Drop for ResourceGroup {
    fn drop(&mut self) {
        if !self.resources.is_empty() && !std::thread::panicking() {
            log::warn!(
                "resource group '{}' dropped with {} live resources; backend objects leaked",
                self.label,
                self.resources.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::recording::{BackendCall, RecordingBackend};
    use crate::gfx::backend::{GfxBackend, TextureDesc, UniformType};
    use crate::gfx::Vertex;

    fn filled_group(backend: &mut RecordingBackend) -> ResourceGroup {
        let mut group = ResourceGroup::new("test");

        let vb = backend.create_vertex_buffer(64, &Vertex::LAYOUT).unwrap();
        group.add(GfxResource::VertexBuffer(VertexBuffer { handle: vb, vertex_capacity: 64 }));

        let desc = TextureDesc::new(Extent::new(4, 4));
        let tex = backend.create_texture(&desc, &[0; 64]).unwrap();
        group.add(GfxResource::Texture(Texture { handle: tex, size: desc.size, render_target: None }));

        let (rt_tex, rt) = backend.create_render_target(&desc).unwrap();
        group.add(GfxResource::Texture(Texture {
            handle: rt_tex,
            size: desc.size,
            render_target: Some(rt),
        }));

        let u = backend.create_uniform("u", UniformType::Vec4).unwrap();
        group.add(GfxResource::Uniform(Uniform { handle: u, ty: UniformType::Vec4 }));

        group
    }

    #[test]
    fn ids_resolve_to_added_resources() {
        let mut backend = RecordingBackend::new();
        let mut group = ResourceGroup::new("ids");
        let p = backend
            .create_shader_program(&crate::gfx::backend::ShaderSource {
                label: "p",
                vertex: "",
                fragment: "",
            })
            .unwrap();
        let id = group.add(GfxResource::ShaderProgram(ShaderProgram { handle: p }));

        assert_eq!(group.get(id).map(GfxResource::kind), Some(ResourceKind::ShaderProgram));
        group.destroy_all(&mut backend);
        assert!(group.get(id).is_none());
    }

    #[test]
    fn teardown_destroys_every_handle_exactly_once() {
        let mut backend = RecordingBackend::new();
        let mut group = filled_group(&mut backend);
        assert_eq!(backend.live_resources(), 5);

        group.destroy_all(&mut backend);

        assert!(group.is_empty());
        assert_eq!(backend.live_resources(), 0);
        let destroys = backend.count(|c| {
            matches!(
                c,
                BackendCall::DestroyVertexBuffer(_)
                    | BackendCall::DestroyTexture(_)
                    | BackendCall::DestroyRenderTarget(_)
                    | BackendCall::DestroyUniform(_)
            )
        });
        assert_eq!(destroys, 5);
    }

    #[test]
    fn render_target_released_before_its_texture() {
        let mut backend = RecordingBackend::new();
        let mut group = filled_group(&mut backend);
        backend.clear_calls();

        group.destroy_all(&mut backend);

        let calls = backend.calls();
        let rt_pos = calls
            .iter()
            .position(|c| matches!(c, BackendCall::DestroyRenderTarget(_)))
            .unwrap();
        assert!(matches!(calls[rt_pos + 1], BackendCall::DestroyTexture(_)));
    }

    #[test]
    fn second_teardown_is_a_no_op() {
        let mut backend = RecordingBackend::new();
        let mut group = filled_group(&mut backend);
        group.destroy_all(&mut backend);
        backend.clear_calls();

        group.destroy_all(&mut backend);
        assert!(backend.calls().is_empty());
    }

    #[test]
    #[should_panic(expected = "failed to destroy")]
    fn backend_destroy_failure_is_fatal() {
        let mut backend = RecordingBackend::new();
        let mut group = filled_group(&mut backend);
        backend.fail_destroys(true);
        group.destroy_all(&mut backend);
    }
}
