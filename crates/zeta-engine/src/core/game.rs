use crate::gfx::Renderer;
use crate::gfx::backend::GfxBackend;

use super::ctx::{FrameCtx, TickCtx};

/// Control directive returned by [`Game::tick`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GameControl {
    Continue,
    Exit,
}

/// Game contract driven by the window runtime.
///
/// Methods are generic over the backend so a game can be exercised against
/// any [`GfxBackend`], not only the window's.
pub trait Game {
    /// Resource creation. Called once, after renderer startup and before the
    /// first frame. An error aborts the runtime.
    fn init<B: GfxBackend>(&mut self, renderer: &mut Renderer<B>) -> anyhow::Result<()>;

    /// One fixed simulation step.
    fn tick(&mut self, ctx: &TickCtx<'_>) -> GameControl;

    /// Draws one frame. Passes must be opened and closed inside this call.
    fn render<B: GfxBackend>(&mut self, ctx: &mut FrameCtx<'_, B>);

    /// Destroys the game's resource groups. Called once, before the renderer
    /// shuts down.
    fn shutdown<B: GfxBackend>(&mut self, renderer: &mut Renderer<B>);
}
