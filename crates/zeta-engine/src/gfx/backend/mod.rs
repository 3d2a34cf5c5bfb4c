//! GPU backend adapter protocol.
//!
//! The renderer core drives a backend through [`GfxBackend`] in a bgfx-like
//! style: state calls (`bind_texture`, `bind_vertex_range`, `set_blend_state`,
//! `set_uniform`) followed by `submit` for a pass. Backends record draws in
//! submission order and execute passes in index order at `end_frame`.
//!
//! Implementations:
//! - [`wgpu_backend::WgpuBackend`]: wgpu device + window surface
//! - [`recording::RecordingBackend`]: records calls; used by tests and headless tools

use std::fmt;

use glam::Mat4;

use crate::coords::{Color, Extent, Rect};

use super::Vertex;

pub mod recording;
pub mod wgpu_backend;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub u32);
    };
}

handle_type!(
    /// Backend vertex buffer.
    VertexBufferHandle
);
handle_type!(
    /// Backend texture (sampled).
    TextureHandle
);
handle_type!(
    /// Backend render target (a texture that passes can draw into).
    RenderTargetHandle
);
handle_type!(
    /// Backend shader program (vertex + fragment stage).
    ShaderProgramHandle
);
handle_type!(
    /// Backend uniform.
    UniformHandle
);

/// Kind of backend object, used in errors and diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    VertexBuffer,
    Texture,
    RenderTarget,
    ShaderProgram,
    Uniform,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::VertexBuffer => "vertex buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::RenderTarget => "render target",
            ResourceKind::ShaderProgram => "shader program",
            ResourceKind::Uniform => "uniform",
        };
        f.write_str(name)
    }
}

/// A backend refused to create or destroy a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: ResourceKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend {} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x4,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: u32,
    pub format: VertexFormat,
}

/// Per-vertex layout of a vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: &'static [VertexAttribute],
}

/// Texel format. Both are 4 bytes per pixel, RGBA order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PixelFormat {
    /// Color textures and render targets.
    #[default]
    Rgba8UnormSrgb,
    /// Coverage data such as font atlases.
    Rgba8Unorm,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        4
    }
}

/// Sampling filter applied whenever the texture is bound.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureDesc {
    pub size: Extent,
    pub format: PixelFormat,
    pub filter: TextureFilter,
}

impl TextureDesc {
    pub fn new(size: Extent) -> Self {
        Self { size, format: PixelFormat::default(), filter: TextureFilter::default() }
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Bytes of pixel data a texture of this description takes.
    pub fn byte_len(&self) -> usize {
        self.size.area() as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Shader program sources (WGSL). The vertex stage entry point is `vs_main`,
/// the fragment stage entry point is `fs_main`.
#[derive(Debug, Copy, Clone)]
pub struct ShaderSource<'a> {
    pub label: &'a str,
    pub vertex: &'a str,
    pub fragment: &'a str,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    /// Texture sampler slot.
    Sampler,
    /// Four floats, captured per draw at `submit`.
    Vec4,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BlendMode {
    /// Straight alpha: `src * a + dst * (1 - a)`.
    #[default]
    Alpha,
    /// Color is already multiplied by alpha.
    Premultiplied,
    Additive,
    /// No blending.
    Opaque,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PassTarget {
    /// The window surface.
    Screen,
    /// An offscreen render target.
    Offscreen(RenderTargetHandle),
}

/// Full configuration of one pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PassConfig {
    pub target: PassTarget,
    /// Viewport in target pixels.
    pub viewport: Rect,
    pub view: Mat4,
    pub proj: Mat4,
    /// Clear color; `None` keeps the target's contents.
    pub clear: Option<Color>,
}

/// Outcome of presenting a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PresentStatus {
    Presented,
    /// Transient surface problem; the frame was dropped.
    Skipped,
    /// The surface or device is gone; rendering cannot continue.
    Lost,
}

/// Primitive operations the renderer core needs from a GPU backend.
///
/// Factory calls may fail; state and draw calls may not. Handles passed back
/// in always come from this backend's own factory calls.
pub trait GfxBackend {
    fn create_vertex_buffer(
        &mut self,
        vertex_capacity: u32,
        layout: &VertexLayout,
    ) -> Result<VertexBufferHandle, BackendError>;

    /// Writes `vertices` starting at vertex index `first_vertex`.
    fn update_vertex_buffer(
        &mut self,
        buffer: VertexBufferHandle,
        first_vertex: u32,
        vertices: &[Vertex],
    );

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<TextureHandle, BackendError>;

    /// Creates a texture that can both be drawn into and sampled.
    fn create_render_target(
        &mut self,
        desc: &TextureDesc,
    ) -> Result<(TextureHandle, RenderTargetHandle), BackendError>;

    fn create_shader_program(
        &mut self,
        source: &ShaderSource<'_>,
    ) -> Result<ShaderProgramHandle, BackendError>;

    fn create_uniform(&mut self, name: &str, ty: UniformType)
        -> Result<UniformHandle, BackendError>;

    fn set_uniform(&mut self, uniform: UniformHandle, value: [f32; 4]);

    /// Configures pass `index` for the current frame.
    fn configure_pass(&mut self, index: u16, config: &PassConfig);

    fn bind_texture(&mut self, slot: u8, sampler: UniformHandle, texture: TextureHandle);

    fn bind_vertex_range(&mut self, buffer: VertexBufferHandle, first_vertex: u32, vertex_count: u32);

    fn set_blend_state(&mut self, blend: BlendMode);

    /// Records one draw of the bound state into pass `pass`.
    fn submit(&mut self, pass: u16, program: ShaderProgramHandle);

    /// Executes all recorded passes and presents.
    fn end_frame(&mut self) -> PresentStatus;

    /// Resizes the swap chain / back buffer.
    fn reset(&mut self, size: Extent);

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferHandle) -> Result<(), BackendError>;
    fn destroy_texture(&mut self, texture: TextureHandle) -> Result<(), BackendError>;
    fn destroy_render_target(&mut self, target: RenderTargetHandle) -> Result<(), BackendError>;
    fn destroy_shader_program(&mut self, program: ShaderProgramHandle) -> Result<(), BackendError>;
    fn destroy_uniform(&mut self, uniform: UniformHandle) -> Result<(), BackendError>;

    /// Called once by `Renderer::shutdown` after the rendering basis is gone.
    fn shutdown(&mut self) {}
}
