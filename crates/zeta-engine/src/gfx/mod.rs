//! Batched immediate-mode 2D renderer.
//!
//! Control flow for one frame:
//!
//! ```text
//! frame_begin
//!   pass_begin / pass_begin_offscreen
//!     [set_shader_program | set_blend_mode | submit_triangles | draw_*]*
//!   pass_end
//!   ...more passes...
//! frame_end
//! ```
//!
//! Triangles sharing a (shader program, texture, blend mode) triple are
//! accumulated CPU-side and flushed as one vertex upload plus one draw call.
//! GPU resources live in [`ResourceGroup`]s and may only be created or
//! destroyed outside a frame.

pub mod backend;
pub mod font;
pub mod texture_data;

mod basis;
mod batch;
mod config;
mod draw;
mod error;
mod renderer;
mod resource;
mod vertex;

pub use basis::RenderingBasis;
pub use config::{RendererConfig, PASS_LIMIT};
pub use draw::{texture_uvs, TextureDraw};
pub use error::{FontError, GfxError};
pub use font::{Font, FontArrangement, GlyphInfo, PlacedGlyph, StringLayout};
pub use renderer::{FrameStats, Renderer, RendererPhase};
pub use resource::{
    GfxResource, ResourceGroup, ResourceId, ShaderProgram, Texture, Uniform, VertexBuffer,
};
pub use texture_data::{decode_rgba8, ImageRgba8};
pub use vertex::{Triangle, Vertex};

pub(crate) use error::fatal;
