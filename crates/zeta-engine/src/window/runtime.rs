use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::coords::{Extent, Vec2};
use crate::core::{Game, GameControl, GameLoop};
use crate::gfx::backend::wgpu_backend::{WgpuBackend, WgpuInit};
use crate::gfx::{Renderer, RendererConfig};
use crate::input::{ButtonState, InputEvent, InputState, Key, Modifiers, MouseButton};
use crate::time::TickClock;

/// Pixels per wheel "line" when the platform reports line deltas.
const SCROLL_LINE_PX: f32 = 20.0;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,

    /// Initial inner size in logical pixels.
    pub initial_size: Extent,
    pub resizable: bool,

    /// Fixed simulation rate in ticks per second.
    pub tick_rate: u32,

    pub renderer: RendererConfig,
    pub wgpu: WgpuInit,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "zeta".to_string(),
            initial_size: Extent::new(1280, 720),
            resizable: true,
            tick_rate: 60,
            renderer: RendererConfig::default(),
            wgpu: WgpuInit::default(),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window, runs `game` until it exits or the window closes,
    /// and tears everything down.
    ///
    /// Errors from window creation, backend/renderer startup or
    /// [`Game::init`] end the loop and are returned here.
    pub fn run<G>(config: RuntimeConfig, game: G) -> Result<()>
    where
        G: Game + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState::new(config, game);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    renderer: Renderer<WgpuBackend<'this>>,
}

struct RuntimeState<G: Game> {
    config: RuntimeConfig,
    game: G,
    game_loop: GameLoop,
    input: InputState,
    clock: TickClock,

    entry: Option<WindowEntry>,
    started: bool,
    failure: Option<anyhow::Error>,
}

impl<G: Game> RuntimeState<G> {
    fn new(config: RuntimeConfig, game: G) -> Self {
        let clock = TickClock::new(config.tick_rate);
        Self {
            config,
            game,
            game_loop: GameLoop::default(),
            input: InputState::default(),
            clock,
            entry: None,
            started: false,
            failure: None,
        }
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let size = self.config.initial_size;
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(size.width as f64, size.height as f64))
            .with_resizable(self.config.resizable);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let wgpu_init = self.config.wgpu.clone();
        let renderer_config = self.config.renderer;

        WindowEntry::try_new(window, |window| {
            pollster::block_on(WgpuBackend::new(window, wgpu_init)).and_then(|backend| {
                Renderer::startup(backend, renderer_config).context("renderer startup failed")
            })
        })
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut entry = self.create_window_entry(event_loop)?;

        let (game, game_loop) = (&mut self.game, &mut self.game_loop);
        let init = entry.with_renderer_mut(|renderer| game_loop.start(game, renderer));

        if let Err(err) = init {
            // Let the game release whatever it created before failing.
            entry.with_renderer_mut(|renderer| game_loop.stop(game, renderer));
            return Err(err.context("game init failed"));
        }

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.clock.reset();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        self.stop(event_loop);
    }

    /// Game shutdown, then renderer shutdown, then the window goes away.
    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            let (game, game_loop) = (&mut self.game, &mut self.game_loop);
            entry.with_renderer_mut(|renderer| game_loop.stop(game, renderer));
            log::debug!("runtime stopped after {} ticks", self.game_loop.ticks_run());
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let time = self.clock.tick();
        let step_secs = self.clock.step_secs();
        let (game, game_loop, input) = (&mut self.game, &mut self.game_loop, &mut self.input);

        let control = entry.with_mut(|fields| {
            let size = fields.window.inner_size();
            fields.window.pre_present_notify();
            game_loop.frame(
                game,
                fields.renderer,
                input,
                time,
                step_secs,
                Extent::new(size.width, size.height),
            )
        });

        if control == GameControl::Exit {
            self.stop(event_loop);
        }
    }
}

impl<G: Game> ApplicationHandler for RuntimeState<G> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; the tick clock paces the simulation.
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.entry.is_none() {
            return;
        }

        if let Some(ev) = translate_input_event(&event) {
            self.input.apply_event(&ev);
        }

        match event {
            WindowEvent::CloseRequested => self.stop(event_loop),

            // The renderer picks the new size up at the next frame_begin.
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_ref() {
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        self.stop(event_loop);
    }
}

fn translate_input_event(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::ModifiersChanged(m) => Some(InputEvent::ModifiersChanged(map_modifiers(m.state()))),

        WindowEvent::Focused(f) => Some(InputEvent::Focused(*f)),

        WindowEvent::CursorLeft { .. } => Some(InputEvent::CursorLeft),

        // Physical pixels, the same space passes are drawn in.
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::CursorMoved(Vec2::new(
            position.x as f32,
            position.y as f32,
        ))),

        WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::MouseButton {
            button: map_mouse_button(*button),
            state: map_state(*state),
        }),

        WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Scroll(scroll_delta(*delta))),

        WindowEvent::KeyboardInput { event, .. } => Some(InputEvent::Key {
            key: map_key(event.physical_key),
            state: map_state(event.state),
            repeat: event.repeat,
        }),

        _ => None,
    }
}

fn scroll_delta(delta: MouseScrollDelta) -> Vec2 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => Vec2::new(x, y) * SCROLL_LINE_PX,
        MouseScrollDelta::PixelDelta(p) => Vec2::new(p.x as f32, p.y as f32),
    }
}

fn map_state(state: ElementState) -> ButtonState {
    match state {
        ElementState::Pressed => ButtonState::Pressed,
        ElementState::Released => ButtonState::Released,
    }
}

fn map_modifiers(m: ModifiersState) -> Modifiers {
    Modifiers {
        shift: m.shift_key(),
        ctrl: m.control_key(),
        alt: m.alt_key(),
        meta: m.super_key(),
    }
}

fn map_mouse_button(b: WinitMouseButton) -> MouseButton {
    match b {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Back,
        WinitMouseButton::Forward => MouseButton::Forward,
        WinitMouseButton::Other(v) => MouseButton::Other(v),
    }
}

fn map_key(pk: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = pk else {
        return Key::Unknown(0);
    };

    match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter | KeyCode::NumpadEnter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Space => Key::Space,

        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,

        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,

        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,

        KeyCode::Digit0 => Key::Digit0,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::Digit5 => Key::Digit5,
        KeyCode::Digit6 => Key::Digit6,
        KeyCode::Digit7 => Key::Digit7,
        KeyCode::Digit8 => Key::Digit8,
        KeyCode::Digit9 => Key::Digit9,

        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,

        other => Key::Unknown(other as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn line_scroll_converts_to_pixels() {
        assert_eq!(scroll_delta(MouseScrollDelta::LineDelta(0.0, -2.0)), Vec2::new(0.0, -40.0));
        assert_eq!(
            scroll_delta(MouseScrollDelta::PixelDelta(PhysicalPosition::new(3.0, 5.0))),
            Vec2::new(3.0, 5.0)
        );
    }

    #[test]
    fn keys_map_by_physical_position() {
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::KeyW)), Key::W);
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::NumpadEnter)), Key::Enter);
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::ShiftRight)), Key::Shift);
        assert!(matches!(map_key(PhysicalKey::Code(KeyCode::Pause)), Key::Unknown(_)));
    }

    #[test]
    fn buttons_and_edges_map_one_to_one() {
        assert_eq!(map_mouse_button(WinitMouseButton::Right), MouseButton::Right);
        assert_eq!(map_mouse_button(WinitMouseButton::Other(7)), MouseButton::Other(7));
        assert_eq!(map_state(ElementState::Released), ButtonState::Released);
    }

    #[test]
    fn only_input_events_translate() {
        assert_eq!(translate_input_event(&WindowEvent::Focused(false)), Some(InputEvent::Focused(false)));
        assert_eq!(translate_input_event(&WindowEvent::CloseRequested), None);
        assert_eq!(translate_input_event(&WindowEvent::RedrawRequested), None);
    }
}
