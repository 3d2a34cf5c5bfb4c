use crate::coords::Extent;
use crate::gfx::Renderer;
use crate::gfx::backend::{GfxBackend, PresentStatus};
use crate::input::InputState;
use crate::time::TickFrame;

use super::ctx::{FrameCtx, TickCtx};
use super::game::{Game, GameControl};

/// Platform-independent half of the runtime: runs the ticks a frame owes,
/// then renders it.
#[derive(Debug, Default)]
pub(crate) struct GameLoop {
    tick_index: u64,
    stopped: bool,
}

impl GameLoop {
    pub(crate) fn start<G, B>(&mut self, game: &mut G, renderer: &mut Renderer<B>) -> anyhow::Result<()>
    where
        G: Game,
        B: GfxBackend,
    {
        game.init(renderer)
    }

    /// Runs `time.ticks` simulation steps and renders one frame.
    ///
    /// Rendering is skipped while the surface has zero area (minimised).
    pub(crate) fn frame<G, B>(
        &mut self,
        game: &mut G,
        renderer: &mut Renderer<B>,
        input: &mut InputState,
        time: TickFrame,
        step_secs: f32,
        surface_size: Extent,
    ) -> GameControl
    where
        G: Game,
        B: GfxBackend,
    {
        for _ in 0..time.ticks {
            let ctx = TickCtx {
                input,
                dt: step_secs,
                tick_index: self.tick_index,
            };
            let control = game.tick(&ctx);
            self.tick_index += 1;
            input.end_tick();

            if control == GameControl::Exit {
                log::debug!("game requested exit at tick {}", self.tick_index);
                return GameControl::Exit;
            }
        }

        if surface_size.is_empty() {
            return GameControl::Continue;
        }

        renderer.frame_begin(surface_size);
        {
            let mut ctx = FrameCtx {
                renderer: &mut *renderer,
                input,
                time,
                surface_size,
            };
            game.render(&mut ctx);
        }

        match renderer.frame_end() {
            PresentStatus::Lost => {
                log::error!("surface lost; stopping");
                GameControl::Exit
            }
            PresentStatus::Presented | PresentStatus::Skipped => GameControl::Continue,
        }
    }

    /// Game shutdown followed by renderer shutdown. Runs once.
    pub(crate) fn stop<G, B>(&mut self, game: &mut G, renderer: &mut Renderer<B>)
    where
        G: Game,
        B: GfxBackend,
    {
        if self.stopped {
            return;
        }
        self.stopped = true;

        game.shutdown(renderer);
        renderer.shutdown();
    }

    pub(crate) fn ticks_run(&self) -> u64 {
        self.tick_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, Rect, Vec2};
    use crate::gfx::backend::recording::{BackendCall, RecordingBackend};
    use crate::gfx::backend::TextureDesc;
    use crate::gfx::{RendererConfig, RendererPhase, ResourceGroup, Texture};
    use crate::input::{ButtonState, InputEvent, Key};

    const SCREEN: Extent = Extent::new(320, 240);

    #[derive(Default)]
    struct Probe {
        group: Option<ResourceGroup>,
        texture: Option<Texture>,
        ticks: Vec<(u64, bool)>,
        renders: u32,
        exit_after: Option<u64>,
        shutdowns: u32,
    }

    impl Game for Probe {
        fn init<B: GfxBackend>(&mut self, renderer: &mut Renderer<B>) -> anyhow::Result<()> {
            let mut group = ResourceGroup::new("probe");
            let desc = TextureDesc::new(Extent::new(1, 1));
            self.texture = Some(renderer.create_texture(&mut group, desc, &[0xFF; 4])?);
            self.group = Some(group);
            Ok(())
        }

        fn tick(&mut self, ctx: &TickCtx<'_>) -> GameControl {
            self.ticks.push((ctx.tick_index, ctx.input.key_pressed(Key::Space)));
            match self.exit_after {
                Some(n) if ctx.tick_index + 1 >= n => GameControl::Exit,
                _ => GameControl::Continue,
            }
        }

        fn render<B: GfxBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) {
            self.renders += 1;
            let texture = self.texture;
            ctx.screen_pass(Some(Color::BLACK), |r| {
                r.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE);
                if let Some(t) = texture.as_ref() {
                    r.draw_texture(t, &crate::gfx::TextureDraw::at(Vec2::new(8.0, 8.0)));
                }
            });
        }

        fn shutdown<B: GfxBackend>(&mut self, renderer: &mut Renderer<B>) {
            self.shutdowns += 1;
            if let Some(mut group) = self.group.take() {
                renderer.destroy_group(&mut group);
            }
        }
    }

    fn time(ticks: u32) -> TickFrame {
        TickFrame { ticks, alpha: 0.5, dt: ticks as f32 / 60.0, frame_index: 0 }
    }

    fn setup() -> (GameLoop, Probe, Renderer<RecordingBackend>) {
        let mut renderer = Renderer::startup(RecordingBackend::new(), RendererConfig::default()).unwrap();
        let mut game = Probe::default();
        let mut game_loop = GameLoop::default();
        game_loop.start(&mut game, &mut renderer).unwrap();
        (game_loop, game, renderer)
    }

    #[test]
    fn frame_runs_owed_ticks_then_renders() {
        let (mut gl, mut game, mut r) = setup();
        let mut input = InputState::default();

        let control = gl.frame(&mut game, &mut r, &mut input, time(3), 1.0 / 60.0, SCREEN);

        assert_eq!(control, GameControl::Continue);
        assert_eq!(game.ticks.iter().map(|t| t.0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(game.renders, 1);
        assert_eq!(gl.ticks_run(), 3);
        assert_eq!(r.phase(), RendererPhase::Idle);
        assert!(r.backend().calls().contains(&BackendCall::EndFrame));

        gl.stop(&mut game, &mut r);
    }

    #[test]
    fn press_is_seen_by_exactly_one_tick() {
        let (mut gl, mut game, mut r) = setup();
        let mut input = InputState::default();
        input.apply_event(&InputEvent::Key { key: Key::Space, state: ButtonState::Pressed, repeat: false });

        // No tick this frame: the press must survive to the next one.
        gl.frame(&mut game, &mut r, &mut input, time(0), 1.0 / 60.0, SCREEN);
        gl.frame(&mut game, &mut r, &mut input, time(2), 1.0 / 60.0, SCREEN);

        assert_eq!(game.ticks, vec![(0, true), (1, false)]);
        assert!(input.key_down(Key::Space));

        gl.stop(&mut game, &mut r);
    }

    #[test]
    fn exit_from_tick_skips_rendering() {
        let (mut gl, mut game, mut r) = setup();
        game.exit_after = Some(2);
        let mut input = InputState::default();

        let control = gl.frame(&mut game, &mut r, &mut input, time(5), 1.0 / 60.0, SCREEN);

        assert_eq!(control, GameControl::Exit);
        assert_eq!(game.ticks.len(), 2);
        assert_eq!(game.renders, 0);

        gl.stop(&mut game, &mut r);
    }

    #[test]
    fn empty_surface_skips_the_frame() {
        let (mut gl, mut game, mut r) = setup();
        let mut input = InputState::default();
        r.backend_mut().clear_calls();

        gl.frame(&mut game, &mut r, &mut input, time(1), 1.0 / 60.0, Extent::new(0, 240));

        assert_eq!(game.ticks.len(), 1);
        assert_eq!(game.renders, 0);
        assert!(r.backend().calls().is_empty());

        gl.stop(&mut game, &mut r);
    }

    #[test]
    fn lost_surface_stops_the_loop() {
        let (mut gl, mut game, mut r) = setup();
        let mut input = InputState::default();
        r.backend_mut().set_present_status(PresentStatus::Lost);

        let control = gl.frame(&mut game, &mut r, &mut input, time(1), 1.0 / 60.0, SCREEN);
        assert_eq!(control, GameControl::Exit);

        gl.stop(&mut game, &mut r);
    }

    #[test]
    fn stop_destroys_game_groups_before_renderer_shutdown_once() {
        let (mut gl, mut game, mut r) = setup();
        r.backend_mut().clear_calls();

        gl.stop(&mut game, &mut r);
        gl.stop(&mut game, &mut r);

        let calls = r.backend().calls();
        let texture_destroyed = calls
            .iter()
            .position(|c| matches!(c, BackendCall::DestroyTexture(_)))
            .unwrap();
        let shutdown = calls.iter().position(|c| *c == BackendCall::Shutdown).unwrap();

        assert!(texture_destroyed < shutdown);
        assert_eq!(game.shutdowns, 1);
        assert_eq!(r.backend().live_resources(), 0);
        assert_eq!(r.phase(), RendererPhase::Inactive);
    }
}
