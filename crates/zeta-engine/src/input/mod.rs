//! Input subsystem.
//!
//! Games poll [`InputState`] from their fixed-step `tick`. The state keeps
//! what is held down plus the transitions (pressed/released, scroll) seen
//! since the last consumed tick. No winit types leak through this API; the
//! window runtime translates platform events into [`InputEvent`]s.

mod state;
mod types;

pub use state::InputState;
pub use types::{ButtonState, InputEvent, Key, Modifiers, MouseButton};
