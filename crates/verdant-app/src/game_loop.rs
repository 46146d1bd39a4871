//! Fixed-timestep update loop ("Fix Your Timestep").
//!
//! Streaming decisions run at a fixed rate regardless of how long a frame
//! takes. Frame time is accumulated and drained in whole steps; overly long
//! frames are clamped so a slow build tick cannot snowball into ever more
//! catch-up steps.

use std::time::Instant;

use tracing::warn;

/// Default fixed timestep: 60 Hz.
pub const FIXED_DT: f64 = 1.0 / 60.0;

/// Longest frame time fed into the accumulator, in seconds.
pub const MAX_FRAME_TIME: f64 = 0.25;

pub struct GameLoop {
    fixed_dt: f64,
    previous_time: Instant,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl GameLoop {
    /// A 60 Hz loop starting from the current instant.
    pub fn new() -> Self {
        Self::with_rate(60)
    }

    /// A loop stepping `hz` times per simulated second (at least 1).
    pub fn with_rate(hz: u32) -> Self {
        Self {
            fixed_dt: 1.0 / hz.max(1) as f64,
            previous_time: Instant::now(),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Run one frame against the wall clock.
    ///
    /// - `update_fn(fixed_dt, total_sim_time)` runs zero or more times.
    /// - `frame_fn(alpha)` runs once with the interpolation alpha in `[0, 1)`.
    pub fn tick(&mut self, update_fn: impl FnMut(f64, f64), frame_fn: impl FnMut(f64)) {
        let now = Instant::now();
        let frame_time = now.duration_since(self.previous_time).as_secs_f64();
        self.previous_time = now;
        self.advance(frame_time, update_fn, frame_fn);
    }

    /// Run one frame with an explicit frame time, in seconds.
    pub fn advance(
        &mut self,
        frame_time: f64,
        mut update_fn: impl FnMut(f64, f64),
        mut frame_fn: impl FnMut(f64),
    ) {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }

        self.accumulator += frame_time;
        while self.accumulator >= self.fixed_dt {
            update_fn(self.fixed_dt, self.total_sim_time);
            self.total_sim_time += self.fixed_dt;
            self.accumulator -= self.fixed_dt;
            self.update_count += 1;
        }

        frame_fn(self.alpha());
        self.frame_count += 1;
    }

    /// Fraction of a step left in the accumulator.
    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / self.fixed_dt
        } else {
            0.0
        }
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Fixed steps executed so far.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Simulated seconds elapsed.
    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new()
    }
}
