use std::collections::HashSet;

use crate::coords::Vec2;

use super::types::{ButtonState, InputEvent, Key, Modifiers, MouseButton};

/// Polled input state for the game window.
///
/// `*_down` reflects the current hardware state. `*_pressed`, `*_released`
/// and the scroll delta accumulate until [`InputState::end_tick`], which the
/// game loop calls after every tick. Frames that run no tick keep the
/// transitions for the next one.
#[derive(Debug, Default)]
pub struct InputState {
    modifiers: Modifiers,
    focused: bool,
    cursor: Option<Vec2>,
    scroll: Vec2,

    keys_down: HashSet<Key>,
    keys_pressed: HashSet<Key>,
    keys_released: HashSet<Key>,

    buttons_down: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,
    buttons_released: HashSet<MouseButton>,
}

impl InputState {
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match *ev {
            InputEvent::Key { key, state, repeat } => match state {
                ButtonState::Pressed => {
                    // Auto-repeat is not a new press.
                    if self.keys_down.insert(key) && !repeat {
                        self.keys_pressed.insert(key);
                    }
                }
                ButtonState::Released => {
                    if self.keys_down.remove(&key) {
                        self.keys_released.insert(key);
                    }
                }
            },

            InputEvent::MouseButton { button, state } => match state {
                ButtonState::Pressed => {
                    if self.buttons_down.insert(button) {
                        self.buttons_pressed.insert(button);
                    }
                }
                ButtonState::Released => {
                    if self.buttons_down.remove(&button) {
                        self.buttons_released.insert(button);
                    }
                }
            },

            InputEvent::CursorMoved(pos) => self.cursor = Some(pos),
            InputEvent::CursorLeft => self.cursor = None,
            InputEvent::Scroll(delta) => self.scroll += delta,
            InputEvent::ModifiersChanged(m) => self.modifiers = m,

            InputEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    // Release events are not delivered to an unfocused window.
                    self.keys_released.extend(self.keys_down.drain());
                    self.buttons_released.extend(self.buttons_down.drain());
                }
            }
        }
    }

    /// Clears the per-tick transitions and the scroll delta.
    pub fn end_tick(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.scroll = Vec2::ZERO;
    }

    // ── keyboard ──

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn key_released(&self, key: Key) -> bool {
        self.keys_released.contains(&key)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// `-1`, `0` or `1` from a pair of opposing keys.
    pub fn axis(&self, negative: Key, positive: Key) -> f32 {
        let mut v = 0.0;
        if self.key_down(negative) {
            v -= 1.0;
        }
        if self.key_down(positive) {
            v += 1.0;
        }
        v
    }

    // ── mouse ──

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    pub fn button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn button_released(&self, button: MouseButton) -> bool {
        self.buttons_released.contains(&button)
    }

    /// Cursor position in window pixels, `None` while outside the window.
    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll
    }

    pub fn focused(&self) -> bool {
        self.focused
    }
}
