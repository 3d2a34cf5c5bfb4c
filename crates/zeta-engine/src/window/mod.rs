//! Window + runtime loop.
//!
//! Owns the `winit` event loop and the game window, and wires them to a
//! [`Renderer`](crate::gfx::Renderer) over the wgpu backend.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
