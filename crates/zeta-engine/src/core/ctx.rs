use glam::Mat4;

use crate::coords::{Color, Extent, Vec2};
use crate::gfx::Renderer;
use crate::gfx::backend::GfxBackend;
use crate::input::InputState;
use crate::time::TickFrame;

/// Context for one fixed simulation step.
pub struct TickCtx<'a> {
    pub input: &'a InputState,

    /// Fixed step length in seconds.
    pub dt: f32,

    /// Steps run since the runtime started.
    pub tick_index: u64,
}

/// Per-frame context passed to [`Game::render`](super::Game::render).
///
/// The renderer is mid-frame: passes may be opened, filled and closed, but
/// no resources created.
pub struct FrameCtx<'a, B: GfxBackend> {
    pub renderer: &'a mut Renderer<B>,
    pub input: &'a InputState,
    pub time: TickFrame,

    /// Framebuffer size for this frame in physical pixels.
    pub surface_size: Extent,
}

impl<'a, B: GfxBackend> FrameCtx<'a, B> {
    /// Interpolation factor between the last two simulation states.
    pub fn alpha(&self) -> f32 {
        self.time.alpha
    }

    pub fn screen_size(&self) -> Vec2 {
        self.surface_size.to_vec2()
    }

    /// Runs `draw` inside an on-screen pass covering the whole surface.
    pub fn screen_pass<F>(&mut self, clear: Option<Color>, draw: F)
    where
        F: FnOnce(&mut Renderer<B>),
    {
        let size = self.screen_size();
        self.renderer.pass_begin(size, Mat4::IDENTITY, clear);
        draw(&mut *self.renderer);
        self.renderer.pass_end();
    }
}
