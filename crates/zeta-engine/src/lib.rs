//! Zeta engine crate.
//!
//! The centrepiece is the batched 2D renderer in [`gfx`]: a frame/pass state
//! machine that coalesces triangles into fixed-capacity vertex batches and
//! flushes them into a GPU backend. The remaining modules are the platform
//! pieces a game needs around it (window runtime, polled input, fixed-step
//! timing, logging).

pub mod coords;
pub mod core;
pub mod gfx;
pub mod input;
pub mod logging;
pub mod time;
pub mod window;
