//! A backend that records every call instead of talking to a GPU.
//!
//! Handles are allocated from one counter starting at 1. Creation of any
//! resource kind can be made to fail, and destroy calls can be made to fail,
//! to exercise the renderer's error paths.

use std::collections::HashSet;

use crate::coords::Extent;
use crate::gfx::Vertex;

use super::{
    BackendError, BlendMode, GfxBackend, PassConfig, PresentStatus, RenderTargetHandle,
    ResourceKind, ShaderProgramHandle, ShaderSource, TextureDesc, TextureHandle, UniformHandle,
    UniformType, VertexBufferHandle, VertexLayout,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateVertexBuffer { buffer: VertexBufferHandle, vertex_capacity: u32 },
    UpdateVertexBuffer { buffer: VertexBufferHandle, first_vertex: u32, vertices: Vec<Vertex> },
    CreateTexture { texture: TextureHandle, desc: TextureDesc },
    CreateRenderTarget { texture: TextureHandle, target: RenderTargetHandle, desc: TextureDesc },
    CreateShaderProgram { program: ShaderProgramHandle, label: String },
    CreateUniform { uniform: UniformHandle, name: String, ty: UniformType },
    SetUniform { uniform: UniformHandle, value: [f32; 4] },
    ConfigurePass { index: u16, config: PassConfig },
    BindTexture { slot: u8, sampler: UniformHandle, texture: TextureHandle },
    BindVertexRange { buffer: VertexBufferHandle, first_vertex: u32, vertex_count: u32 },
    SetBlendState(BlendMode),
    Submit { pass: u16, program: ShaderProgramHandle },
    EndFrame,
    Reset(Extent),
    DestroyVertexBuffer(VertexBufferHandle),
    DestroyTexture(TextureHandle),
    DestroyRenderTarget(RenderTargetHandle),
    DestroyShaderProgram(ShaderProgramHandle),
    DestroyUniform(UniformHandle),
    Shutdown,
}

/// A draw as seen by the backend: the state bound at the time of `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedDraw {
    pub pass: u16,
    pub program: ShaderProgramHandle,
    pub texture: Option<TextureHandle>,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub blend: BlendMode,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    next_handle: u32,
    live: HashSet<(ResourceKind, u32)>,
    failing_kinds: HashSet<ResourceKind>,
    fail_destroys: bool,
    present_status: Option<PresentStatus>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later creation of `kind` fail.
    pub fn fail_creation_of(&mut self, kind: ResourceKind) {
        self.failing_kinds.insert(kind);
    }

    /// Makes every later destroy call fail.
    pub fn fail_destroys(&mut self, fail: bool) {
        self.fail_destroys = fail;
    }

    /// Overrides what `end_frame` reports (default: `Presented`).
    pub fn set_present_status(&mut self, status: PresentStatus) {
        self.present_status = Some(status);
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    /// `(first_vertex, vertex_count)` of every vertex upload, in order.
    pub fn uploads(&self) -> Vec<(u32, usize)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::UpdateVertexBuffer { first_vertex, vertices, .. } => {
                    Some((*first_vertex, vertices.len()))
                }
                _ => None,
            })
            .collect()
    }

    /// Reconstructs every draw from the state calls preceding each `Submit`.
    pub fn draws(&self) -> Vec<RecordedDraw> {
        let mut out = Vec::new();
        let mut texture = None;
        let mut range = (0, 0);
        let mut blend = BlendMode::default();

        for call in &self.calls {
            match call {
                BackendCall::BindTexture { texture: t, .. } => texture = Some(*t),
                BackendCall::BindVertexRange { first_vertex, vertex_count, .. } => {
                    range = (*first_vertex, *vertex_count);
                }
                BackendCall::SetBlendState(b) => blend = *b,
                BackendCall::Submit { pass, program } => {
                    out.push(RecordedDraw {
                        pass: *pass,
                        program: *program,
                        texture,
                        first_vertex: range.0,
                        vertex_count: range.1,
                        blend,
                    });
                    texture = None;
                }
                _ => {}
            }
        }
        out
    }

    fn create(&mut self, kind: ResourceKind) -> Result<u32, BackendError> {
        if self.failing_kinds.contains(&kind) {
            return Err(BackendError::new(kind, "creation refused by recording backend"));
        }
        self.next_handle += 1;
        self.live.insert((kind, self.next_handle));
        Ok(self.next_handle)
    }

    fn destroy(&mut self, kind: ResourceKind, id: u32) -> Result<(), BackendError> {
        if self.fail_destroys {
            return Err(BackendError::new(kind, "destroy refused by recording backend"));
        }
        if !self.live.remove(&(kind, id)) {
            return Err(BackendError::new(kind, format!("handle {id} is not live")));
        }
        Ok(())
    }
}

impl GfxBackend for RecordingBackend {
    fn create_vertex_buffer(
        &mut self,
        vertex_capacity: u32,
        _layout: &VertexLayout,
    ) -> Result<VertexBufferHandle, BackendError> {
        let buffer = VertexBufferHandle(self.create(ResourceKind::VertexBuffer)?);
        self.calls.push(BackendCall::CreateVertexBuffer { buffer, vertex_capacity });
        Ok(buffer)
    }

    fn update_vertex_buffer(
        &mut self,
        buffer: VertexBufferHandle,
        first_vertex: u32,
        vertices: &[Vertex],
    ) {
        self.calls.push(BackendCall::UpdateVertexBuffer {
            buffer,
            first_vertex,
            vertices: vertices.to_vec(),
        });
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        _pixels: &[u8],
    ) -> Result<TextureHandle, BackendError> {
        let texture = TextureHandle(self.create(ResourceKind::Texture)?);
        self.calls.push(BackendCall::CreateTexture { texture, desc: *desc });
        Ok(texture)
    }

    fn create_render_target(
        &mut self,
        desc: &TextureDesc,
    ) -> Result<(TextureHandle, RenderTargetHandle), BackendError> {
        let target = RenderTargetHandle(self.create(ResourceKind::RenderTarget)?);
        let texture = match self.create(ResourceKind::Texture) {
            Ok(id) => TextureHandle(id),
            Err(e) => {
                self.live.remove(&(ResourceKind::RenderTarget, target.0));
                return Err(e);
            }
        };
        self.calls.push(BackendCall::CreateRenderTarget { texture, target, desc: *desc });
        Ok((texture, target))
    }

    fn create_shader_program(
        &mut self,
        source: &ShaderSource<'_>,
    ) -> Result<ShaderProgramHandle, BackendError> {
        let program = ShaderProgramHandle(self.create(ResourceKind::ShaderProgram)?);
        self.calls.push(BackendCall::CreateShaderProgram {
            program,
            label: source.label.to_string(),
        });
        Ok(program)
    }

    fn create_uniform(
        &mut self,
        name: &str,
        ty: UniformType,
    ) -> Result<UniformHandle, BackendError> {
        let uniform = UniformHandle(self.create(ResourceKind::Uniform)?);
        self.calls.push(BackendCall::CreateUniform { uniform, name: name.to_string(), ty });
        Ok(uniform)
    }

    fn set_uniform(&mut self, uniform: UniformHandle, value: [f32; 4]) {
        self.calls.push(BackendCall::SetUniform { uniform, value });
    }

    fn configure_pass(&mut self, index: u16, config: &PassConfig) {
        self.calls.push(BackendCall::ConfigurePass { index, config: *config });
    }

    fn bind_texture(&mut self, slot: u8, sampler: UniformHandle, texture: TextureHandle) {
        self.calls.push(BackendCall::BindTexture { slot, sampler, texture });
    }

    fn bind_vertex_range(&mut self, buffer: VertexBufferHandle, first_vertex: u32, vertex_count: u32) {
        self.calls.push(BackendCall::BindVertexRange { buffer, first_vertex, vertex_count });
    }

    fn set_blend_state(&mut self, blend: BlendMode) {
        self.calls.push(BackendCall::SetBlendState(blend));
    }

    fn submit(&mut self, pass: u16, program: ShaderProgramHandle) {
        self.calls.push(BackendCall::Submit { pass, program });
    }

    fn end_frame(&mut self) -> PresentStatus {
        self.calls.push(BackendCall::EndFrame);
        self.present_status.unwrap_or(PresentStatus::Presented)
    }

    fn reset(&mut self, size: Extent) {
        self.calls.push(BackendCall::Reset(size));
    }

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferHandle) -> Result<(), BackendError> {
        self.destroy(ResourceKind::VertexBuffer, buffer.0)?;
        self.calls.push(BackendCall::DestroyVertexBuffer(buffer));
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> Result<(), BackendError> {
        self.destroy(ResourceKind::Texture, texture.0)?;
        self.calls.push(BackendCall::DestroyTexture(texture));
        Ok(())
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) -> Result<(), BackendError> {
        self.destroy(ResourceKind::RenderTarget, target.0)?;
        self.calls.push(BackendCall::DestroyRenderTarget(target));
        Ok(())
    }

    fn destroy_shader_program(&mut self, program: ShaderProgramHandle) -> Result<(), BackendError> {
        self.destroy(ResourceKind::ShaderProgram, program.0)?;
        self.calls.push(BackendCall::DestroyShaderProgram(program));
        Ok(())
    }

    fn destroy_uniform(&mut self, uniform: UniformHandle) -> Result<(), BackendError> {
        self.destroy(ResourceKind::Uniform, uniform.0)?;
        self.calls.push(BackendCall::DestroyUniform(uniform));
        Ok(())
    }

    fn shutdown(&mut self) {
        self.calls.push(BackendCall::Shutdown);
    }
}
