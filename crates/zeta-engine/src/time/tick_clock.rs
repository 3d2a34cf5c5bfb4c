use std::time::{Duration, Instant};

/// Result of advancing a [`TickClock`] by one rendered frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TickFrame {
    /// Fixed simulation steps to run before rendering.
    pub ticks: u32,

    /// Fraction of a step left in the accumulator, in `[0, 1)`.
    pub alpha: f32,

    /// Clamped wall time since the previous frame, in seconds.
    pub dt: f32,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Fixed-timestep accumulator.
///
/// Wall-clock delta is clamped so a stall (debugger, minimised window) does
/// not trigger a burst of catch-up steps, and at most `max_ticks` steps run
/// per frame; time beyond that is dropped.
#[derive(Debug, Clone)]
pub struct TickClock {
    step: Duration,
    accumulator: Duration,
    last: Instant,
    dt_max: Duration,
    max_ticks: u32,
    frame_index: u64,
}

impl TickClock {
    /// Clock stepping `rate_hz` times per second, clamped to 0.25 s per
    /// frame and 8 steps per frame.
    pub fn new(rate_hz: u32) -> Self {
        Self::with_limits(rate_hz, Duration::from_millis(250), 8)
    }

    pub fn with_limits(rate_hz: u32, dt_max: Duration, max_ticks: u32) -> Self {
        let rate = rate_hz.max(1);
        Self {
            step: Duration::from_secs(1) / rate,
            accumulator: Duration::ZERO,
            last: Instant::now(),
            dt_max,
            max_ticks: max_ticks.max(1),
            frame_index: 0,
        }
    }

    /// Length of one simulation step.
    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn step_secs(&self) -> f32 {
        self.step.as_secs_f32()
    }

    /// Resets the baseline, e.g. after the window was restored.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.accumulator = Duration::ZERO;
    }

    /// Advances by the wall time elapsed since the previous call.
    pub fn tick(&mut self) -> TickFrame {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        self.advance(elapsed)
    }

    /// Advances by `elapsed`.
    pub fn advance(&mut self, elapsed: Duration) -> TickFrame {
        let dt = elapsed.min(self.dt_max);
        self.accumulator += dt;

        let mut ticks = 0;
        while self.accumulator >= self.step && ticks < self.max_ticks {
            self.accumulator -= self.step;
            ticks += 1;
        }
        if ticks == self.max_ticks && self.accumulator >= self.step {
            log::trace!("tick clock behind by {:?}; dropping", self.accumulator);
            self.accumulator = Duration::ZERO;
        }

        let frame = TickFrame {
            ticks,
            alpha: self.accumulator.as_secs_f32() / self.step.as_secs_f32(),
            dt: dt.as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        frame
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn accumulates_partial_steps() {
        let mut c = TickClock::with_limits(100, ms(250), 8);
        let f = c.advance(ms(15));
        assert_eq!(f.ticks, 1);
        assert!((f.alpha - 0.5).abs() < 1e-4);

        let f = c.advance(ms(5));
        assert_eq!(f.ticks, 1);
        assert!(f.alpha.abs() < 1e-4);
    }

    #[test]
    fn long_stalls_are_clamped() {
        let mut c = TickClock::with_limits(100, ms(50), 100);
        let f = c.advance(Duration::from_secs(5));
        assert_eq!(f.ticks, 5);
        assert!((f.dt - 0.05).abs() < 1e-6);
    }

    #[test]
    fn tick_count_is_capped_and_backlog_dropped() {
        let mut c = TickClock::with_limits(1000, ms(250), 8);
        let f = c.advance(ms(100));
        assert_eq!(f.ticks, 8);
        assert_eq!(f.alpha, 0.0);
        assert_eq!(c.advance(Duration::ZERO).ticks, 0);
    }

    #[test]
    fn frame_index_increments() {
        let mut c = TickClock::default();
        assert_eq!(c.advance(ms(1)).frame_index, 0);
        assert_eq!(c.advance(ms(1)).frame_index, 1);
    }
}
