//! Game-facing contracts.
//!
//! The window runtime owns the platform loop; games implement [`Game`] and
//! see the world through [`TickCtx`] (fixed-step simulation) and
//! [`FrameCtx`] (rendering between `frame_begin` and `frame_end`).

mod ctx;
mod game;
mod game_loop;

pub use ctx::{FrameCtx, TickCtx};
pub use game::{Game, GameControl};
pub(crate) use game_loop::GameLoop;
