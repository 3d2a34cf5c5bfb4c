//! wgpu implementation of [`GfxBackend`] for one window surface.
//!
//! Draws are recorded during the frame and encoded at `end_frame` into a
//! single command encoder: one render pass per configured pass, in index
//! order. Render pipelines are built lazily per (program, blend mode,
//! target format, vertex layout).

mod device;
mod frame;
mod pipeline;

use std::collections::HashMap;
use std::num::NonZeroU64;

use anyhow::Result;
use winit::window::Window;

use crate::coords::Extent;
use crate::gfx::Vertex;

use self::device::Device;
use self::frame::FrameRecorder;
use self::pipeline::{DrawUniforms, Layouts, PipelineKey, Program, UNIFORM_SLOTS};
use super::{
    BackendError, BlendMode, GfxBackend, PassConfig, PassTarget, PresentStatus,
    RenderTargetHandle, ResourceKind, ShaderProgramHandle, ShaderSource, TextureDesc,
    TextureFilter, TextureHandle, UniformHandle, UniformType, VertexBufferHandle, VertexLayout,
};

pub use self::device::WgpuInit;

struct VertexBufferEntry {
    buffer: wgpu::Buffer,
    layout: VertexLayout,
    vertex_capacity: u32,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    format: wgpu::TextureFormat,
    size: Extent,
}

struct UniformEntry {
    name: String,
    slot: Option<usize>,
}

/// GPU buffer holding every draw's [`DrawUniforms`] for one frame.
struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
}

pub struct WgpuBackend<'w> {
    device: Device<'w>,
    layouts: Layouts,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,

    next_handle: u32,
    vertex_buffers: HashMap<u32, VertexBufferEntry>,
    textures: HashMap<u32, TextureEntry>,
    render_targets: HashMap<u32, TextureHandle>,
    programs: HashMap<u32, Program>,
    uniforms: HashMap<u32, UniformEntry>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    uniform_arena: Option<UniformArena>,
    recorder: FrameRecorder,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the device and a surface bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; callers on the
    /// event-loop thread block on it with `pollster`.
    pub async fn new(window: &'w Window, init: WgpuInit) -> Result<Self> {
        let device = Device::new(window, &init).await?;
        let layouts = Layouts::new(&device.device);
        let linear_sampler = pipeline::create_sampler(&device.device, wgpu::FilterMode::Linear);
        let nearest_sampler = pipeline::create_sampler(&device.device, wgpu::FilterMode::Nearest);

        log::debug!(
            "wgpu backend ready: {:?} {}x{}",
            device.surface_format(),
            device.size().width,
            device.size().height
        );

        Ok(Self {
            device,
            layouts,
            linear_sampler,
            nearest_sampler,
            next_handle: 0,
            vertex_buffers: HashMap::new(),
            textures: HashMap::new(),
            render_targets: HashMap::new(),
            programs: HashMap::new(),
            uniforms: HashMap::new(),
            pipelines: HashMap::new(),
            uniform_arena: None,
            recorder: FrameRecorder::default(),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.device.surface_format()
    }

    pub fn surface_size(&self) -> Extent {
        self.device.size()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.device.queue
    }

    fn next_id(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create_texture_entry(
        &mut self,
        desc: &TextureDesc,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> TextureEntry {
        let format = pipeline::texture_format(desc.format);
        let texture = self.device.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = match desc.filter {
            TextureFilter::Linear => &self.linear_sampler,
            TextureFilter::Nearest => &self.nearest_sampler,
        };
        let bind_group = self.device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        TextureEntry { texture, view, bind_group, format, size: desc.size }
    }

    // ── frame encoding ─────────────────────────────────────────────────────

    /// Grows the uniform arena to hold `draws` blocks and writes them.
    fn upload_draw_uniforms(&mut self) {
        let draws = self.recorder.draws();
        if draws.is_empty() {
            return;
        }

        let align = self.device.device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = DrawUniforms::SIZE.div_ceil(align) * align;

        let needs_growth = match &self.uniform_arena {
            Some(arena) => arena.capacity < draws.len(),
            None => true,
        };
        if needs_growth {
            let capacity = draws.len().next_power_of_two().max(64);
            let buffer = self.device.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("zeta draw uniforms"),
                size: stride * capacity as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("zeta draw uniforms bind group"),
                layout: &self.layouts.draw,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: NonZeroU64::new(DrawUniforms::SIZE),
                    }),
                }],
            });
            log::debug!("draw uniform arena grown to {capacity} blocks");
            self.uniform_arena = Some(UniformArena { buffer, bind_group, stride, capacity });
        }

        let Some(arena) = self.uniform_arena.as_ref() else { return; };
        let mut bytes = vec![0u8; arena.stride as usize * draws.len()];
        for (i, draw) in draws.iter().enumerate() {
            let start = i * arena.stride as usize;
            bytes[start..start + DrawUniforms::SIZE as usize]
                .copy_from_slice(bytemuck::bytes_of(&draw.uniforms));
        }
        self.device.queue.write_buffer(&arena.buffer, 0, &bytes);
    }

    fn target_format(&self, target: PassTarget) -> Option<wgpu::TextureFormat> {
        match target {
            PassTarget::Screen => Some(self.device.surface_format()),
            PassTarget::Offscreen(rt) => self
                .render_targets
                .get(&rt.0)
                .and_then(|tex| self.textures.get(&tex.0))
                .map(|t| t.format),
        }
    }

    /// Builds any pipeline this frame's draws need and does not exist yet.
    fn ensure_pipelines(&mut self) {
        let mut missing = Vec::new();
        for (index, pass) in self.recorder.passes() {
            let Some(format) = self.target_format(pass.target) else { continue; };
            for (_, draw) in self.recorder.draws_in(index) {
                let Some(vb) = self.vertex_buffers.get(&draw.buffer.0) else { continue; };
                let key = PipelineKey {
                    program: draw.program.0,
                    blend: draw.blend,
                    format,
                    layout: vb.layout,
                };
                if !self.pipelines.contains_key(&key) && !missing.contains(&key) {
                    missing.push(key);
                }
            }
        }

        for key in missing {
            let Some(program) = self.programs.get(&key.program) else {
                log::warn!("draw references unknown shader program {}", key.program);
                continue;
            };
            let pipeline =
                pipeline::create_pipeline(&self.device.device, &self.layouts, program, &key);
            self.pipelines.insert(key, pipeline);
        }
    }

    fn encode_passes(&self, encoder: &mut wgpu::CommandEncoder, screen: Option<&wgpu::TextureView>) {
        for (index, pass) in self.recorder.passes() {
            let (view, format, size) = match pass.target {
                PassTarget::Screen => match screen {
                    Some(view) => (view, self.device.surface_format(), self.device.size()),
                    None => continue,
                },
                PassTarget::Offscreen(rt) => {
                    let entry = self
                        .render_targets
                        .get(&rt.0)
                        .and_then(|tex| self.textures.get(&tex.0));
                    match entry {
                        Some(t) => (&t.view, t.format, t.size),
                        None => {
                            log::warn!("pass {index}: render target {} no longer exists", rt.0);
                            continue;
                        }
                    }
                }
            };

            let load = match pass.clear {
                Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: c.r as f64,
                    g: c.g as f64,
                    b: c.b as f64,
                    a: c.a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("zeta pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            // Viewport must stay inside the attachment.
            let vp = pass.viewport.normalized();
            let (tw, th) = (size.width as f32, size.height as f32);
            let x = vp.origin.x.clamp(0.0, tw);
            let y = vp.origin.y.clamp(0.0, th);
            let w = vp.size.x.min(tw - x);
            let h = vp.size.y.min(th - y);
            if w <= 0.0 || h <= 0.0 {
                continue;
            }
            rpass.set_viewport(x, y, w, h, 0.0, 1.0);

            let Some(arena) = self.uniform_arena.as_ref() else { continue; };

            for (i, draw) in self.recorder.draws_in(index) {
                let Some(vb) = self.vertex_buffers.get(&draw.buffer.0) else {
                    log::warn!("draw references unknown vertex buffer {}", draw.buffer.0);
                    continue;
                };
                let Some(tex) = self.textures.get(&draw.texture.0) else {
                    log::warn!("draw references unknown texture {}", draw.texture.0);
                    continue;
                };
                let key = PipelineKey {
                    program: draw.program.0,
                    blend: draw.blend,
                    format,
                    layout: vb.layout,
                };
                let Some(pipeline) = self.pipelines.get(&key) else { continue; };

                let end = draw.first_vertex + draw.vertex_count;
                if end > vb.vertex_capacity {
                    log::warn!("draw range {}..{end} exceeds vertex buffer", draw.first_vertex);
                    continue;
                }

                let offset = (i as u64 * arena.stride) as u32;
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, &arena.bind_group, &[offset]);
                rpass.set_bind_group(1, &tex.bind_group, &[]);
                rpass.set_vertex_buffer(0, vb.buffer.slice(..));
                rpass.draw(draw.first_vertex..end, 0..1);
            }
        }
    }

    fn not_found(kind: ResourceKind, id: u32) -> BackendError {
        BackendError::new(kind, format!("unknown handle {id}"))
    }
}

impl GfxBackend for WgpuBackend<'_> {
    fn create_vertex_buffer(
        &mut self,
        vertex_capacity: u32,
        layout: &VertexLayout,
    ) -> Result<VertexBufferHandle, BackendError> {
        let size = vertex_capacity as u64 * layout.stride as u64;
        let max = self.device.device.limits().max_buffer_size;
        if size == 0 || size > max {
            return Err(BackendError::new(
                ResourceKind::VertexBuffer,
                format!("invalid vertex buffer size {size} (max {max})"),
            ));
        }

        let buffer = self.device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("zeta vertex buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let id = self.next_id();
        self.vertex_buffers.insert(id, VertexBufferEntry { buffer, layout: *layout, vertex_capacity });
        Ok(VertexBufferHandle(id))
    }

    fn update_vertex_buffer(
        &mut self,
        buffer: VertexBufferHandle,
        first_vertex: u32,
        vertices: &[Vertex],
    ) {
        let Some(entry) = self.vertex_buffers.get(&buffer.0) else {
            log::warn!("update of unknown vertex buffer {}", buffer.0);
            return;
        };
        if first_vertex as usize + vertices.len() > entry.vertex_capacity as usize {
            log::warn!("vertex upload past the end of buffer {}; dropped", buffer.0);
            return;
        }

        let offset = first_vertex as u64 * entry.layout.stride as u64;
        self.device.queue.write_buffer(&entry.buffer, offset, bytemuck::cast_slice(vertices));
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<TextureHandle, BackendError> {
        let max = self.device.device.limits().max_texture_dimension_2d;
        if desc.size.is_empty() || desc.size.width > max || desc.size.height > max {
            return Err(BackendError::new(
                ResourceKind::Texture,
                format!("unsupported size {}x{}", desc.size.width, desc.size.height),
            ));
        }
        if pixels.len() != desc.byte_len() {
            return Err(BackendError::new(ResourceKind::Texture, "pixel data size mismatch"));
        }

        let entry = self.create_texture_entry(
            desc,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            "zeta texture",
        );

        let bpp = desc.format.bytes_per_pixel();
        self.device.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.size.width * bpp),
                rows_per_image: Some(desc.size.height),
            },
            wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: 1,
            },
        );

        let id = self.next_id();
        self.textures.insert(id, entry);
        Ok(TextureHandle(id))
    }

    fn create_render_target(
        &mut self,
        desc: &TextureDesc,
    ) -> Result<(TextureHandle, RenderTargetHandle), BackendError> {
        let max = self.device.device.limits().max_texture_dimension_2d;
        if desc.size.is_empty() || desc.size.width > max || desc.size.height > max {
            return Err(BackendError::new(
                ResourceKind::RenderTarget,
                format!("unsupported size {}x{}", desc.size.width, desc.size.height),
            ));
        }

        let entry = self.create_texture_entry(
            desc,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            "zeta render target",
        );

        let texture = TextureHandle(self.next_id());
        self.textures.insert(texture.0, entry);
        let target = RenderTargetHandle(self.next_id());
        self.render_targets.insert(target.0, texture);
        Ok((texture, target))
    }

    fn create_shader_program(
        &mut self,
        source: &ShaderSource<'_>,
    ) -> Result<ShaderProgramHandle, BackendError> {
        if source.vertex.trim().is_empty() || source.fragment.trim().is_empty() {
            return Err(BackendError::new(
                ResourceKind::ShaderProgram,
                format!("'{}': empty shader stage", source.label),
            ));
        }

        let module = |stage: &str, code: &str| {
            self.device.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} {stage}", source.label)),
                source: wgpu::ShaderSource::Wgsl(code.into()),
            })
        };
        let program = Program {
            label: source.label.to_string(),
            vertex: module("vs", source.vertex),
            fragment: module("fs", source.fragment),
        };

        let id = self.next_id();
        self.programs.insert(id, program);
        Ok(ShaderProgramHandle(id))
    }

    fn create_uniform(
        &mut self,
        name: &str,
        ty: UniformType,
    ) -> Result<UniformHandle, BackendError> {
        let slot = match ty {
            UniformType::Sampler => None,
            UniformType::Vec4 => {
                let used: Vec<usize> = self.uniforms.values().filter_map(|u| u.slot).collect();
                let free = (0..UNIFORM_SLOTS).find(|s| !used.contains(s)).ok_or_else(|| {
                    BackendError::new(
                        ResourceKind::Uniform,
                        format!("'{name}': all {UNIFORM_SLOTS} vec4 slots in use"),
                    )
                })?;
                Some(free)
            }
        };

        let id = self.next_id();
        self.uniforms.insert(id, UniformEntry { name: name.to_string(), slot });
        Ok(UniformHandle(id))
    }

    fn set_uniform(&mut self, uniform: UniformHandle, value: [f32; 4]) {
        match self.uniforms.get(&uniform.0) {
            Some(UniformEntry { slot: Some(slot), .. }) => self.recorder.set_slot(*slot, value),
            Some(entry) => log::warn!("set_uniform on sampler '{}'", entry.name),
            None => log::warn!("set_uniform on unknown uniform {}", uniform.0),
        }
    }

    fn configure_pass(&mut self, index: u16, config: &PassConfig) {
        self.recorder.configure_pass(index, *config);
    }

    fn bind_texture(&mut self, slot: u8, _sampler: UniformHandle, texture: TextureHandle) {
        debug_assert_eq!(slot, 0, "batch pipelines sample one texture");
        self.recorder.bind_texture(texture);
    }

    fn bind_vertex_range(&mut self, buffer: VertexBufferHandle, first_vertex: u32, vertex_count: u32) {
        self.recorder.bind_vertex_range(buffer, first_vertex, vertex_count);
    }

    fn set_blend_state(&mut self, blend: BlendMode) {
        self.recorder.set_blend(blend);
    }

    fn submit(&mut self, pass: u16, program: ShaderProgramHandle) {
        self.recorder.submit(pass, program);
    }

    fn end_frame(&mut self) -> PresentStatus {
        let wants_screen = self.recorder.passes().any(|(_, p)| p.target == PassTarget::Screen);

        let surface_texture = if wants_screen && !self.device.size().is_empty() {
            match self.device.acquire() {
                Ok(t) => Some(t),
                Err(e) => {
                    let status = self.device.handle_surface_error(e);
                    self.recorder.finish_frame();
                    return status;
                }
            }
        } else {
            None
        };
        let screen_view = surface_texture
            .as_ref()
            .map(|t| t.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        self.upload_draw_uniforms();
        self.ensure_pipelines();

        let mut encoder = self.device.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("zeta frame encoder"),
        });
        self.encode_passes(&mut encoder, screen_view.as_ref());
        self.device.queue.submit(std::iter::once(encoder.finish()));

        self.recorder.finish_frame();

        match surface_texture {
            Some(t) => {
                drop(screen_view);
                t.present();
                PresentStatus::Presented
            }
            None if wants_screen => PresentStatus::Skipped,
            None => PresentStatus::Presented,
        }
    }

    fn reset(&mut self, size: Extent) {
        self.device.resize(size);
    }

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferHandle) -> Result<(), BackendError> {
        let entry = self
            .vertex_buffers
            .remove(&buffer.0)
            .ok_or_else(|| Self::not_found(ResourceKind::VertexBuffer, buffer.0))?;
        entry.buffer.destroy();
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> Result<(), BackendError> {
        if self.render_targets.values().any(|t| *t == texture) {
            return Err(BackendError::new(
                ResourceKind::Texture,
                format!("texture {} is still bound to a render target", texture.0),
            ));
        }
        let entry = self
            .textures
            .remove(&texture.0)
            .ok_or_else(|| Self::not_found(ResourceKind::Texture, texture.0))?;
        entry.texture.destroy();
        Ok(())
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) -> Result<(), BackendError> {
        self.render_targets
            .remove(&target.0)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(ResourceKind::RenderTarget, target.0))
    }

    fn destroy_shader_program(&mut self, program: ShaderProgramHandle) -> Result<(), BackendError> {
        self.programs
            .remove(&program.0)
            .ok_or_else(|| Self::not_found(ResourceKind::ShaderProgram, program.0))?;
        self.pipelines.retain(|key, _| key.program != program.0);
        Ok(())
    }

    fn destroy_uniform(&mut self, uniform: UniformHandle) -> Result<(), BackendError> {
        self.uniforms
            .remove(&uniform.0)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(ResourceKind::Uniform, uniform.0))
    }

    fn shutdown(&mut self) {
        let leaked = self.vertex_buffers.len()
            + self.textures.len()
            + self.programs.len()
            + self.uniforms.len();
        if leaked > 0 {
            log::warn!("wgpu backend shut down with {leaked} live resources");
        }
        self.pipelines.clear();
        self.uniform_arena = None;
        log::debug!("wgpu backend shut down");
    }
}
