use glam::Mat4;

use crate::coords::{Color, Extent, Rect, Vec2};

use super::backend::{
    BlendMode, GfxBackend, PassConfig, PassTarget, PresentStatus, ShaderSource, TextureDesc,
    UniformType,
};
use super::basis::RenderingBasis;
use super::batch::BatchState;
use super::config::{RendererConfig, PASS_LIMIT};
use super::error::GfxError;
use super::fatal;
use super::resource::{
    GfxResource, ResourceGroup, ShaderProgram, Texture, Uniform,
};
use super::Triangle;

/// Lifecycle phase of a [`Renderer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RendererPhase {
    /// Shut down; no further calls are valid.
    Inactive,
    /// Between frames. Resources may be created and destroyed.
    Idle,
    /// Between `frame_begin` and `frame_end`.
    MidFrame,
}

/// Per-frame counters, valid from `frame_end` until the next `frame_begin`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub passes: u32,
    pub draw_calls: u32,
    pub vertex_uploads: u32,
    pub vertices: u32,
}

#[derive(Debug, Default)]
struct FrameState {
    /// Vertices already uploaded to the basis vertex buffer this frame.
    vertex_count: u32,
    pass_active: bool,
    pass_index: u16,
}

/// Batched immediate-mode 2D renderer over a [`GfxBackend`].
///
/// The renderer alternates between an idle phase, where resources are
/// created and destroyed, and frames, where passes are recorded. Calls made
/// in the wrong phase are caller bugs and trip debug assertions.
pub struct Renderer<B: GfxBackend> {
    backend: B,
    config: RendererConfig,
    basis: RenderingBasis,
    phase: RendererPhase,
    frame: FrameState,
    batch: BatchState,
    surface_size: Option<Extent>,
    stats: FrameStats,
}

impl<B: GfxBackend> Renderer<B> {
    /// Takes ownership of an initialized backend and creates the rendering
    /// basis. On failure the backend is shut down and dropped.
    pub fn startup(mut backend: B, config: RendererConfig) -> Result<Self, GfxError> {
        let config = config.validated();

        let basis = match RenderingBasis::create(&mut backend, config.frame_vertex_capacity) {
            Ok(basis) => basis,
            Err(e) => {
                log::error!("renderer startup failed: {e}");
                backend.shutdown();
                return Err(e);
            }
        };

        log::debug!(
            "renderer started: batch {} triangles, frame {} vertices, {} passes max",
            config.batch_triangle_capacity,
            config.frame_vertex_capacity,
            PASS_LIMIT
        );

        Ok(Self {
            backend,
            batch: BatchState::new(config.batch_vertex_capacity()),
            config,
            basis,
            phase: RendererPhase::Idle,
            frame: FrameState::default(),
            surface_size: None,
            stats: FrameStats::default(),
        })
    }

    /// Destroys the rendering basis and shuts the backend down.
    ///
    /// Resource groups owned by the caller must be destroyed first.
    pub fn shutdown(&mut self) {
        if self.phase == RendererPhase::Inactive {
            return;
        }
        debug_assert_eq!(self.phase, RendererPhase::Idle, "shutdown called mid-frame");

        self.basis.destroy(&mut self.backend);
        self.backend.shutdown();
        self.phase = RendererPhase::Inactive;
        log::debug!("renderer shut down");
    }

    // ── frame / pass state machine ─────────────────────────────────────────

    /// Starts a frame for a surface of `surface_size` physical pixels.
    ///
    /// The backend is reset before any pass is configured whenever the size
    /// differs from the previous frame's (including the first frame).
    pub fn frame_begin(&mut self, surface_size: Extent) {
        debug_assert_eq!(self.phase, RendererPhase::Idle, "frame_begin outside the idle phase");

        if self.surface_size != Some(surface_size) {
            log::debug!("surface size -> {}x{}", surface_size.width, surface_size.height);
            self.backend.reset(surface_size);
            self.surface_size = Some(surface_size);
        }

        self.frame = FrameState::default();
        self.batch.reset_pass_state();
        self.stats = FrameStats::default();
        self.phase = RendererPhase::MidFrame;
    }

    /// Begins an on-screen pass covering `size` pixels from the top-left.
    ///
    /// Geometry is submitted in pixel space (+Y down); `view` is applied
    /// before the pass projection.
    pub fn pass_begin(&mut self, size: Vec2, view: Mat4, clear: Option<Color>) {
        self.begin_pass(PassTarget::Screen, size, view, clear);
    }

    /// Begins a pass that draws into `target`, which must be a render target.
    pub fn pass_begin_offscreen(&mut self, target: &Texture, view: Mat4, clear: Option<Color>) {
        let Some(rt) = target.render_target() else {
            fatal!("offscreen pass on texture {:?}, which is not a render target", target.handle());
        };
        self.begin_pass(PassTarget::Offscreen(rt), target.size_f32(), view, clear);
    }

    fn begin_pass(&mut self, target: PassTarget, size: Vec2, view: Mat4, clear: Option<Color>) {
        debug_assert_eq!(self.phase, RendererPhase::MidFrame, "pass_begin outside a frame");
        debug_assert!(!self.frame.pass_active, "pass_begin while a pass is active");

        let index = self.frame.pass_index;
        if index as usize >= PASS_LIMIT {
            fatal!("pass limit exceeded: pass {} of at most {}", index, PASS_LIMIT);
        }

        let config = PassConfig {
            target,
            viewport: Rect::from_size(size),
            view,
            proj: Mat4::orthographic_rh(0.0, size.x, size.y, 0.0, -1.0, 1.0),
            clear,
        };
        self.backend.configure_pass(index, &config);

        self.frame.pass_active = true;
        self.batch.reset_pass_state();
        self.stats.passes += 1;
        log::trace!("pass {index} begin: {target:?} {}x{}", size.x, size.y);
    }

    /// Flushes the pending batch and closes the pass.
    pub fn pass_end(&mut self) {
        debug_assert!(self.frame.pass_active, "pass_end without an active pass");

        self.flush();
        log::trace!("pass {} end", self.frame.pass_index);

        self.frame.pass_active = false;
        self.frame.pass_index += 1;
        self.batch.reset_pass_state();
    }

    /// Ends the frame and presents it.
    pub fn frame_end(&mut self) -> PresentStatus {
        debug_assert_eq!(self.phase, RendererPhase::MidFrame, "frame_end outside a frame");
        debug_assert!(!self.frame.pass_active, "frame_end while a pass is active");

        self.flush();
        let status = self.backend.end_frame();
        self.phase = RendererPhase::Idle;

        log::trace!(
            "frame end: {:?}, {} passes, {} draws, {} vertices",
            status,
            self.stats.passes,
            self.stats.draw_calls,
            self.stats.vertices
        );
        status
    }

    // ── batch state ────────────────────────────────────────────────────────

    /// Selects the shader program for following triangles; `None` selects
    /// the default program. A change flushes the pending batch first.
    pub fn set_shader_program(&mut self, program: Option<&ShaderProgram>) {
        debug_assert!(self.frame.pass_active, "set_shader_program without an active pass");

        let default = self.basis.default_program();
        let next = program.copied().unwrap_or(default);
        if self.batch.shader.unwrap_or(default) != next {
            self.flush();
        }
        self.batch.shader = program.copied();
    }

    /// Selects the blend mode for following triangles. A change flushes the
    /// pending batch first.
    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        debug_assert!(self.frame.pass_active, "set_blend_mode without an active pass");

        if self.batch.blend != blend {
            self.flush();
            self.batch.blend = blend;
        }
    }

    /// Sets a vec4 uniform. Inside a frame, pending triangles are flushed
    /// first so they keep the previous value.
    pub fn set_uniform(&mut self, uniform: &Uniform, value: [f32; 4]) {
        debug_assert_eq!(uniform.uniform_type(), UniformType::Vec4, "set_uniform on a sampler");

        if self.frame.pass_active {
            self.flush();
        }
        self.backend.set_uniform(uniform.handle(), value);
    }

    /// Queues triangles drawn with `texture` (or the white fallback).
    ///
    /// More triangles in one call than a batch holds is fatal.
    pub fn submit_triangles(&mut self, triangles: &[Triangle], texture: Option<&Texture>) {
        debug_assert!(self.frame.pass_active, "submit_triangles without an active pass");

        if triangles.is_empty() {
            return;
        }

        let incoming = triangles.len() * 3;
        if incoming > self.batch.capacity() {
            fatal!(
                "submit of {} triangles exceeds batch capacity of {} triangles",
                triangles.len(),
                self.config.batch_triangle_capacity
            );
        }

        if self.batch.needs_flush(triangles, texture) {
            self.flush();
        }
        self.batch.push_triangles(triangles, texture);
    }

    /// Uploads the pending batch and issues one draw. No-op when empty.
    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let count = self.batch.vertex_count() as u32;
        let first = self.frame.vertex_count;
        let vb = self.basis.vertex_buffer();
        if first + count > vb.vertex_capacity() {
            fatal!(
                "frame vertex capacity exceeded: {} + {} > {}",
                first,
                count,
                vb.vertex_capacity()
            );
        }

        let texture = self.batch.texture.unwrap_or(self.basis.white_texture());
        let program = self.batch.shader.unwrap_or(self.basis.default_program());

        self.backend.update_vertex_buffer(vb.handle(), first, self.batch.vertices());
        self.backend.bind_texture(0, self.basis.sampler().handle(), texture.handle());
        self.backend.bind_vertex_range(vb.handle(), first, count);
        self.backend.set_blend_state(self.batch.blend);
        self.backend.submit(self.frame.pass_index, program.handle());

        log::trace!(
            "flush: pass {} vertices {}..{} texture {:?}",
            self.frame.pass_index,
            first,
            first + count,
            texture.handle()
        );

        self.frame.vertex_count += count;
        self.stats.vertex_uploads += 1;
        self.stats.draw_calls += 1;
        self.stats.vertices += count;
        self.batch.clear();
    }

    // ── resources ──────────────────────────────────────────────────────────

    /// Creates a texture from tightly packed RGBA8 pixels.
    pub fn create_texture(
        &mut self,
        group: &mut ResourceGroup,
        desc: TextureDesc,
        pixels: &[u8],
    ) -> Result<Texture, GfxError> {
        self.assert_idle("create_texture");

        if desc.size.is_empty() || pixels.len() != desc.byte_len() {
            return Err(GfxError::InvalidTexture {
                width: desc.size.width,
                height: desc.size.height,
                expected_bytes: desc.byte_len(),
                actual_bytes: pixels.len(),
            });
        }

        let texture = Texture {
            handle: self.backend.create_texture(&desc, pixels)?,
            size: desc.size,
            render_target: None,
        };
        group.add(GfxResource::Texture(texture));
        Ok(texture)
    }

    /// Creates a texture that offscreen passes can draw into.
    pub fn create_render_target(
        &mut self,
        group: &mut ResourceGroup,
        desc: TextureDesc,
    ) -> Result<Texture, GfxError> {
        self.assert_idle("create_render_target");

        if desc.size.is_empty() {
            return Err(GfxError::InvalidTexture {
                width: desc.size.width,
                height: desc.size.height,
                expected_bytes: 0,
                actual_bytes: 0,
            });
        }

        let (handle, rt) = self.backend.create_render_target(&desc)?;
        let texture = Texture { handle, size: desc.size, render_target: Some(rt) };
        group.add(GfxResource::Texture(texture));
        Ok(texture)
    }

    pub fn create_shader_program(
        &mut self,
        group: &mut ResourceGroup,
        source: &ShaderSource<'_>,
    ) -> Result<ShaderProgram, GfxError> {
        self.assert_idle("create_shader_program");

        let program = ShaderProgram { handle: self.backend.create_shader_program(source)? };
        group.add(GfxResource::ShaderProgram(program));
        Ok(program)
    }

    pub fn create_uniform(
        &mut self,
        group: &mut ResourceGroup,
        name: &str,
        ty: UniformType,
    ) -> Result<Uniform, GfxError> {
        self.assert_idle("create_uniform");

        let uniform = Uniform { handle: self.backend.create_uniform(name, ty)?, ty };
        group.add(GfxResource::Uniform(uniform));
        Ok(uniform)
    }

    /// Destroys every resource in `group` and empties it.
    pub fn destroy_group(&mut self, group: &mut ResourceGroup) {
        self.assert_idle("destroy_group");
        group.destroy_all(&mut self.backend);
    }

    #[inline]
    fn assert_idle(&self, op: &str) {
        debug_assert_eq!(
            self.phase,
            RendererPhase::Idle,
            "{op} is only valid between frames"
        );
    }

    // ── accessors ──────────────────────────────────────────────────────────

    pub fn phase(&self) -> RendererPhase {
        self.phase
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn basis(&self) -> &RenderingBasis {
        &self.basis
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Vertices uploaded so far in the current (or last) frame.
    pub fn frame_vertex_count(&self) -> u32 {
        self.frame.vertex_count
    }

    /// Index the next pass will get (or the active pass's index).
    pub fn pass_index(&self) -> u16 {
        self.frame.pass_index
    }

    pub fn pass_active(&self) -> bool {
        self.frame.pass_active
    }

    /// Vertices waiting in the current batch.
    pub fn pending_vertices(&self) -> usize {
        self.batch.vertex_count()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Size passed to the last `frame_begin`.
    pub fn surface_size(&self) -> Option<Extent> {
        self.surface_size
    }
}

impl<B: GfxBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        if self.phase != RendererPhase::Inactive && !std::thread::panicking() {
            log::warn!("renderer dropped without shutdown; basis resources leaked");
        }
    }
}
