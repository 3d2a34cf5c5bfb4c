use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::gfx::backend::{BlendMode, PixelFormat, VertexFormat, VertexLayout};

/// Vec4 uniform slots available to shader programs.
pub(super) const UNIFORM_SLOTS: usize = 4;

/// Per-draw uniform block (128 bytes), bound at group 0 with a dynamic offset.
///
///  offset  0  view_proj  mat4x4<f32>
///  offset 64  slots      array<vec4<f32>, 4>
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub(super) struct DrawUniforms {
    pub(super) view_proj: [[f32; 4]; 4],
    pub(super) slots: [[f32; 4]; UNIFORM_SLOTS],
}

impl DrawUniforms {
    pub(super) const SIZE: u64 = std::mem::size_of::<DrawUniforms>() as u64;
}

/// Straight-alpha "over": `src * a + dst * (1 - a)`.
fn alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState::ALPHA_BLENDING
}

fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn additive_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Zero,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

pub(super) fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::Alpha => Some(alpha_blend()),
        BlendMode::Premultiplied => Some(premul_alpha_blend()),
        BlendMode::Additive => Some(additive_blend()),
        BlendMode::Opaque => None,
    }
}

pub(super) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn vertex_attributes(layout: &VertexLayout) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: match a.format {
                VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
                VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            },
            offset: a.offset as u64,
            shader_location: a.location,
        })
        .collect()
}

/// Bind group layouts shared by every batch pipeline.
///
/// group 0: per-draw uniforms (dynamic offset)
/// group 1: texture + sampler
pub(super) struct Layouts {
    pub(super) draw: wgpu::BindGroupLayout,
    pub(super) texture: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

impl Layouts {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let draw = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("zeta draw uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(DrawUniforms::SIZE),
                },
                count: None,
            }],
        });

        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("zeta texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("zeta batch pipeline layout"),
            bind_group_layouts: &[&draw, &texture],
            immediate_size: 0,
        });

        Self { draw, texture, pipeline }
    }
}

/// Compiled vertex + fragment stages of one shader program.
pub(super) struct Program {
    pub(super) label: String,
    pub(super) vertex: wgpu::ShaderModule,
    pub(super) fragment: wgpu::ShaderModule,
}

/// Cache key: a pipeline is built per program, blend mode, target format
/// and vertex layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub(super) program: u32,
    pub(super) blend: BlendMode,
    pub(super) format: wgpu::TextureFormat,
    pub(super) layout: VertexLayout,
}

pub(super) fn create_pipeline(
    device: &wgpu::Device,
    layouts: &Layouts,
    program: &Program,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    log::debug!(
        "creating pipeline '{}' ({:?}, {:?})",
        program.label,
        key.blend,
        key.format
    );

    let attributes = vertex_attributes(&key.layout);
    let buffers = [wgpu::VertexBufferLayout {
        array_stride: key.layout.stride as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&program.label),
        layout: Some(&layouts.pipeline),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: blend_state(key.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

pub(super) fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("zeta sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}
