//! Time subsystem.
//!
//! Fixed-timestep game timing without coupling to the runtime:
//! - one `TickClock` per loop
//! - call `tick()` once per rendered frame, run `ticks` simulation steps,
//!   then render with `alpha` as the interpolation factor

mod tick_clock;

pub use tick_clock::{TickClock, TickFrame};
